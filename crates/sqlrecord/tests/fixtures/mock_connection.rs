//! Recording connection used in place of a real driver.

use std::sync::Mutex;

use sqlrecord::prelude::*;

/// One call made against [`MockConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin,
    Commit,
    Rollback,
    Insert {
        table: String,
        fields: Vec<String>,
        values: Vec<Value>,
        types: Vec<BindType>,
    },
    Update {
        table: String,
        fields: Vec<String>,
        values: Vec<Value>,
        conditions: BoundCondition,
        types: Vec<BindType>,
    },
    Delete {
        table: String,
        where_sql: String,
        values: Vec<Value>,
        types: Vec<BindType>,
    },
    Fetch {
        sql: String,
        params: Vec<Value>,
        types: Vec<BindType>,
    },
    LastInsertId(Option<String>),
}

/// Logs every call and answers queries from scripted rules.
///
/// COUNT queries return the count of the last rule whose pattern occurs in
/// the SQL (0 when none does). Other queries return the rows of the last
/// matching row rule.
#[derive(Debug, Default)]
pub struct MockConnection {
    calls: Mutex<Vec<Call>>,
    counts: Mutex<Vec<(String, i64)>>,
    rows: Mutex<Vec<(String, Vec<Row>)>>,
    last_id: Mutex<i64>,
    failing_inserts: Mutex<Vec<String>>,
    failing_deletes: Mutex<bool>,
    sequences: bool,
    dialect: AnsiDialect,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that hands out ids from named sequences.
    pub fn with_sequences() -> Self {
        Self {
            sequences: true,
            ..Self::default()
        }
    }

    pub fn set_count(&self, pattern: &str, count: i64) {
        self.counts.lock().unwrap().push((pattern.to_string(), count));
    }

    pub fn set_rows(&self, pattern: &str, rows: Vec<Row>) {
        self.rows.lock().unwrap().push((pattern.to_string(), rows));
    }

    /// Make INSERTs into `table` report failure.
    pub fn fail_inserts_into(&self, table: &str) {
        self.failing_inserts.lock().unwrap().push(table.to_string());
    }

    pub fn fail_deletes(&self) {
        *self.failing_deletes.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count_calls(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    /// SQL of every fetch, in order.
    pub fn queries(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Fetch { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn inserts(&self) -> Vec<Call> {
        self.filtered(|c| matches!(c, Call::Insert { .. }))
    }

    pub fn updates(&self) -> Vec<Call> {
        self.filtered(|c| matches!(c, Call::Update { .. }))
    }

    pub fn deletes(&self) -> Vec<Call> {
        self.filtered(|c| matches!(c, Call::Delete { .. }))
    }

    fn filtered(&self, keep: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| keep(c))
            .cloned()
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn answer(&self, sql: &str) -> Vec<Row> {
        if sql.contains("COUNT(*)") {
            let count = self
                .counts
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(pattern, _)| sql.contains(pattern.as_str()))
                .map_or(0, |(_, count)| *count);
            return vec![Row::from_pairs([("rowcount", Value::BigInt(count))])];
        }
        self.rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }
}

impl Connection for MockConnection {
    fn insert(
        &self,
        table: &Table,
        values: &[Value],
        fields: &[String],
        bind_types: &[BindType],
    ) -> Result<bool> {
        self.record(Call::Insert {
            table: table.to_string(),
            fields: fields.to_vec(),
            values: values.to_vec(),
            types: bind_types.to_vec(),
        });
        Ok(!self.failing_inserts.lock().unwrap().contains(&table.source))
    }

    fn update(
        &self,
        table: &Table,
        fields: &[String],
        values: &[Value],
        conditions: &BoundCondition,
        bind_types: &[BindType],
    ) -> Result<bool> {
        self.record(Call::Update {
            table: table.to_string(),
            fields: fields.to_vec(),
            values: values.to_vec(),
            conditions: conditions.clone(),
            types: bind_types.to_vec(),
        });
        Ok(true)
    }

    fn delete(
        &self,
        table: &Table,
        where_sql: &str,
        values: &[Value],
        bind_types: &[BindType],
    ) -> Result<bool> {
        self.record(Call::Delete {
            table: table.to_string(),
            where_sql: where_sql.to_string(),
            values: values.to_vec(),
            types: bind_types.to_vec(),
        });
        Ok(!*self.failing_deletes.lock().unwrap())
    }

    fn fetch_one(
        &self,
        sql: &str,
        _mode: FetchMode,
        params: &[Value],
        types: &[BindType],
    ) -> Result<Option<Row>> {
        self.record(Call::Fetch {
            sql: sql.to_string(),
            params: params.to_vec(),
            types: types.to_vec(),
        });
        Ok(self.answer(sql).into_iter().next())
    }

    fn fetch_all(
        &self,
        sql: &str,
        _mode: FetchMode,
        params: &[Value],
        types: &[BindType],
    ) -> Result<Vec<Row>> {
        self.record(Call::Fetch {
            sql: sql.to_string(),
            params: params.to_vec(),
            types: types.to_vec(),
        });
        Ok(self.answer(sql))
    }

    fn last_insert_id(&self, sequence: Option<&str>) -> Result<Value> {
        self.record(Call::LastInsertId(sequence.map(str::to_string)));
        let mut last_id = self.last_id.lock().unwrap();
        *last_id += 1;
        Ok(Value::BigInt(*last_id))
    }

    fn supports_sequences(&self) -> bool {
        self.sequences
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn begin(&self) -> Result<()> {
        self.record(Call::Begin);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.record(Call::Commit);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.record(Call::Rollback);
        Ok(())
    }
}
