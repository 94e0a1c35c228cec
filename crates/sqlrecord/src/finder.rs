//! Registered finders: `findBy<Attr>`, `findFirstBy<Attr>`, `countBy<Attr>`.
//!
//! The table is built once per model when the manager initializes it, so a
//! lookup is an exact map hit on the method name.

use std::collections::HashMap;
use std::sync::Arc;

use sqlrecord_core::{
    BindType, ColumnMap, Error, FetchMode, ModelMetaData, Result, SelectDefinition, Value,
    camelize,
};

use crate::di::Di;
use crate::manager::RecordSet;
use crate::model::Model;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinderKind {
    Find,
    FindFirst,
    Count,
}

/// One registered finder: what it returns and which column it filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finder {
    pub kind: FinderKind,
    pub column: String,
}

/// Finder method name → [`Finder`] for one model.
#[derive(Debug, Clone, Default)]
pub struct FinderTable {
    entries: HashMap<String, Finder>,
}

impl FinderTable {
    /// Register the three finders of every attribute of `meta`.
    ///
    /// Method names use the camelized attribute name (after the column map).
    /// Columns a partial column map leaves out get no finders.
    pub fn build(meta: &ModelMetaData, column_map: Option<&ColumnMap>) -> Self {
        let mut entries = HashMap::with_capacity(meta.attributes().len() * 3);
        for column in meta.attributes() {
            let attribute = match column_map {
                Some(map) => match map.get(column) {
                    Some(attribute) => camelize(attribute),
                    None => continue,
                },
                None => camelize(column),
            };
            for (prefix, kind) in [
                ("findBy", FinderKind::Find),
                ("findFirstBy", FinderKind::FindFirst),
                ("countBy", FinderKind::Count),
            ] {
                entries.insert(
                    format!("{prefix}{attribute}"),
                    Finder {
                        kind,
                        column: column.clone(),
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, method: &str) -> Option<&Finder> {
        self.entries.get(method)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Record {
    /// Run the registered finder `method` of `model` with `value`.
    ///
    /// ```ignore
    /// let robot = Record::find_by(Arc::new(Robots), di, "findFirstByName", "Astro Boy")?;
    /// ```
    #[tracing::instrument(level = "debug", skip(model, di, value), fields(model = %model.name()))]
    pub fn find_by(
        model: Arc<dyn Model>,
        di: Arc<Di>,
        method: &str,
        value: impl Into<Value>,
    ) -> Result<RecordSet> {
        let prototype = Record::new(Arc::clone(&model), Arc::clone(&di))?;
        let finder = prototype
            .manager()
            .finder(prototype.model_name(), method)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "The static method \"{method}\" doesn't exist on model \"{}\"",
                    prototype.model_name()
                ))
            })?;

        let meta = prototype.meta()?;
        let value = value.into();
        let bind_type = meta
            .bind_types()
            .get(&finder.column)
            .copied()
            .unwrap_or_else(|| BindType::for_value(&value));
        let connection = prototype.read_connection()?;
        let table = connection.escape_table(&prototype.table());
        let where_sql = format!("{} = ?", connection.escape_identifier(&finder.column));
        let params = [value];
        let types = [bind_type];

        if finder.kind == FinderKind::Count {
            let definition =
                SelectDefinition::new(table, vec!["COUNT(*) AS rowcount".to_string()])
                    .filter(where_sql);
            let sql = connection.dialect().select(&definition);
            let row = connection.fetch_one(&sql, FetchMode::Assoc, &params, &types)?;
            let count = row
                .as_ref()
                .and_then(|r| r.get("rowcount"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            return Ok(RecordSet::Count(u64::try_from(count).unwrap_or(0)));
        }

        let columns = meta
            .attributes()
            .iter()
            .map(|c| connection.escape_identifier(c))
            .collect();
        let mut definition = SelectDefinition::new(table, columns).filter(where_sql);
        if finder.kind == FinderKind::FindFirst {
            definition = definition.limit(1);
        }
        let sql = connection.dialect().select(&definition);
        tracing::debug!(method = %method, sql = %sql, "Running finder");
        let rows = connection.fetch_all(&sql, FetchMode::Assoc, &params, &types)?;

        let keep = prototype.manager().is_keeping_snapshots(prototype.model_name());
        let records = Record::hydrate_rows(&model, &di, rows, keep)?;
        if finder.kind == FinderKind::FindFirst {
            return Ok(RecordSet::One(records.into_iter().next().map(Box::new)));
        }
        Ok(RecordSet::Many(records))
    }
}
