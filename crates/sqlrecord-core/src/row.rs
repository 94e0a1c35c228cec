//! Rows returned by the connection and the map shapes built from them.

use std::collections::{BTreeMap, HashMap};

use crate::value::Value;

/// Attribute name to value, in a stable order.
pub type Data = BTreeMap<String, Value>;

/// Physical column name to in-object attribute name (or the reverse).
pub type ColumnMap = HashMap<String, String>;

/// A single result row: column names with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column and value lists.
    ///
    /// Extra values beyond the column list are dropped.
    pub fn new(columns: Vec<String>, mut values: Vec<Value>) -> Self {
        values.truncate(columns.len());
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (columns, values) = pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self { columns, values }
    }

    /// Value of a column by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Value by position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Consume the row into a column-keyed map.
    pub fn into_data(self) -> Data {
        self.columns.into_iter().zip(self.values).collect()
    }
}
