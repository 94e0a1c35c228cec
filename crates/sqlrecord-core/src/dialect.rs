//! SELECT rendering.
//!
//! The record engine only ever needs plain single-table (or single-join)
//! selects; anything richer belongs to a query builder.

/// Everything needed to render one SELECT.
///
/// `columns` and `table` are expected to be escaped already.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectDefinition {
    pub columns: Vec<String>,
    pub table: String,
    pub joins: Vec<String>,
    pub where_sql: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
}

impl SelectDefinition {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            columns,
            table: table.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn join(mut self, join: impl Into<String>) -> Self {
        self.joins.push(join.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, where_sql: impl Into<String>) -> Self {
        self.where_sql = Some(where_sql.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub trait Dialect: Send + Sync {
    fn select(&self, definition: &SelectDefinition) -> String;
}

/// `SELECT ... FROM ... [JOIN ...] [WHERE ...] [ORDER BY ...] [LIMIT n]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn select(&self, definition: &SelectDefinition) -> String {
        let columns = if definition.columns.is_empty() {
            "*".to_string()
        } else {
            definition.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", definition.table);
        for join in &definition.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if let Some(where_sql) = &definition.where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        if let Some(order) = &definition.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = definition.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}
