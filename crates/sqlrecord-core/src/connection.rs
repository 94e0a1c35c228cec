//! The connection contract consumed by entity records.
//!
//! Drivers implement [`Connection`]. Every call is blocking and runs on the
//! caller's thread; the record engine issues them strictly in sequence.
//! Implementations keep whatever interior state they need (a handle, a
//! transaction depth counter) behind `&self`.

use std::fmt;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::identifiers::quote_ident;
use crate::row::Row;
use crate::types::BindType;
use crate::value::Value;

/// A physical table: optional schema plus source name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    pub schema: Option<String>,
    pub source: String,
}

impl Table {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            schema: None,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.source),
            None => f.write_str(&self.source),
        }
    }
}

/// A WHERE fragment with its parallel bind values and bind types.
///
/// Placeholders are positional `?` markers, one per entry in `params`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundCondition {
    pub sql: String,
    pub params: Vec<Value>,
    pub types: Vec<BindType>,
}

impl BoundCondition {
    pub fn new(sql: impl Into<String>, params: Vec<Value>, types: Vec<BindType>) -> Self {
        Self {
            sql: sql.into(),
            params,
            types,
        }
    }

    /// Append `extra` with `AND`, wrapping it in parentheses.
    pub fn and_raw(&mut self, extra: &str) {
        if extra.trim().is_empty() {
            return;
        }
        if self.sql.is_empty() {
            self.sql = extra.to_string();
        } else {
            self.sql = format!("{} AND ({extra})", self.sql);
        }
    }
}

/// Shape of rows returned by a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Columns addressed by name.
    #[default]
    Assoc,
    /// Columns addressed by position.
    Num,
}

/// A blocking database connection.
pub trait Connection: Send + Sync {
    /// Quote a single identifier for this backend.
    fn escape_identifier(&self, identifier: &str) -> String {
        quote_ident(identifier)
    }

    /// Quote a possibly schema-qualified table.
    fn escape_table(&self, table: &Table) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.escape_identifier(schema),
                self.escape_identifier(&table.source)
            ),
            None => self.escape_identifier(&table.source),
        }
    }

    /// INSERT one row. `values`, `fields` and `bind_types` are parallel.
    fn insert(
        &self,
        table: &Table,
        values: &[Value],
        fields: &[String],
        bind_types: &[BindType],
    ) -> Result<bool>;

    /// UPDATE the rows matched by `conditions`.
    fn update(
        &self,
        table: &Table,
        fields: &[String],
        values: &[Value],
        conditions: &BoundCondition,
        bind_types: &[BindType],
    ) -> Result<bool>;

    /// DELETE the rows matched by `where_sql`.
    fn delete(
        &self,
        table: &Table,
        where_sql: &str,
        values: &[Value],
        bind_types: &[BindType],
    ) -> Result<bool>;

    /// Run a query and return its first row.
    fn fetch_one(
        &self,
        sql: &str,
        mode: FetchMode,
        params: &[Value],
        types: &[BindType],
    ) -> Result<Option<Row>>;

    /// Run a query and return every row.
    fn fetch_all(
        &self,
        sql: &str,
        mode: FetchMode,
        params: &[Value],
        types: &[BindType],
    ) -> Result<Vec<Row>>;

    /// Id generated by the last insert, optionally read from a sequence.
    fn last_insert_id(&self, sequence: Option<&str>) -> Result<Value>;

    /// Whether ids come from named sequences.
    fn supports_sequences(&self) -> bool {
        false
    }

    /// Value bound for an identity column the caller left blank.
    fn default_id_value(&self) -> Value {
        Value::Null
    }

    fn dialect(&self) -> &dyn Dialect;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;
}
