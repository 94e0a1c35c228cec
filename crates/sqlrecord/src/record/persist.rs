//! Low-level INSERT and UPDATE.
//!
//! The statement contents are planned first as parallel field/value/type
//! lists, then handed to the connection. Attributes that were never set are
//! bound as NULL with [`BindType::Skip`] so drivers can bind them untyped.

use std::collections::HashMap;

use sqlrecord_core::{
    BindType, ColumnMap, Connection, Data, Error, ModelMetaData, Result, Table, Value,
    require_bind_type, resolve_attribute,
};

use super::Record;

/// Parallel column/value/bind-type lists of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct WritePlan {
    pub(crate) fields: Vec<String>,
    pub(crate) values: Vec<Value>,
    pub(crate) types: Vec<BindType>,
}

impl WritePlan {
    fn push(&mut self, field: &str, value: Value, bind_type: BindType) {
        self.fields.push(field.to_string());
        self.values.push(value);
        self.types.push(bind_type);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Plan an INSERT: every non-automatic column, the identity column last.
///
/// A blank identity is bound as `default_id` with the skip type.
pub(crate) fn plan_insert(
    model: &str,
    meta: &ModelMetaData,
    column_map: Option<&ColumnMap>,
    attributes: &HashMap<String, Value>,
    default_id: Value,
) -> Result<WritePlan> {
    let automatic = meta.automatic_create_attributes();
    let identity = meta.identity_field();
    let bind_types = meta.bind_types();
    let mut plan = WritePlan::default();

    for column in meta.attributes() {
        if automatic.contains(column) || identity == Some(column.as_str()) {
            continue;
        }
        let attribute = resolve_attribute(model, column_map, column)?;
        match attributes.get(attribute) {
            Some(value) => {
                let bind_type = require_bind_type(model, bind_types, column)?;
                plan.push(column, value.clone(), bind_type);
            }
            None => plan.push(column, Value::Null, BindType::Skip),
        }
    }

    if let Some(identity) = identity {
        let attribute = resolve_attribute(model, column_map, identity)?;
        match attributes.get(attribute) {
            Some(value) if !value.is_blank() => {
                let bind_type = require_bind_type(model, bind_types, identity)?;
                plan.push(identity, value.clone(), bind_type);
            }
            _ => plan.push(identity, default_id, BindType::Skip),
        }
    }

    Ok(plan)
}

/// Plan an UPDATE over the non-key, non-automatic columns.
///
/// With `snapshot` given (dynamic update) only columns whose value differs
/// from it, or that it lacks, are kept. Unset attributes are always written
/// as untyped NULLs.
pub(crate) fn plan_update(
    model: &str,
    meta: &ModelMetaData,
    column_map: Option<&ColumnMap>,
    attributes: &HashMap<String, Value>,
    snapshot: Option<&Data>,
) -> Result<WritePlan> {
    let automatic = meta.automatic_update_attributes();
    let bind_types = meta.bind_types();
    let mut plan = WritePlan::default();

    for column in meta.non_primary_key_attributes() {
        if automatic.contains(column) {
            continue;
        }
        let bind_type = require_bind_type(model, bind_types, column)?;
        let attribute = resolve_attribute(model, column_map, column)?;
        let Some(value) = attributes.get(attribute) else {
            plan.push(column, Value::Null, BindType::Skip);
            continue;
        };
        let changed = match snapshot {
            None => true,
            Some(snapshot) => snapshot
                .get(attribute)
                .is_none_or(|old| !old.loosely_equals(value)),
        };
        if changed {
            plan.push(column, value.clone(), bind_type);
        }
    }

    Ok(plan)
}

impl Record {
    /// INSERT the record and pull back a generated identity.
    ///
    /// The last insert id is read only when the identity attribute was
    /// missing or empty before the INSERT; an explicit identity is kept as
    /// written and the connection is not asked for one.
    pub(crate) fn do_low_insert(
        &mut self,
        meta: &ModelMetaData,
        connection: &dyn Connection,
        table: &Table,
        identity: Option<&str>,
    ) -> Result<bool> {
        let column_map = self.active_column_map(meta);
        let plan = plan_insert(
            self.model_name(),
            meta,
            column_map,
            &self.attributes,
            connection.default_id_value(),
        )?;

        tracing::debug!(
            model = %self.model_name(),
            table = %table,
            fields = ?plan.fields,
            "Inserting record"
        );
        let success = connection.insert(table, &plan.values, &plan.fields, &plan.types)?;
        if !success {
            return Ok(false);
        }

        let Some(identity) = identity else {
            return Ok(true);
        };
        let attribute = resolve_attribute(self.model_name(), column_map, identity)?.to_string();
        let generated = self.attributes.get(&attribute).is_none_or(Value::is_blank);
        if generated {
            let sequence = connection.supports_sequences().then(|| {
                self.model
                    .sequence_name()
                    .unwrap_or_else(|| format!("{}_{identity}_seq", table.source))
            });
            let id = connection.last_insert_id(sequence.as_deref())?;
            tracing::debug!(model = %self.model_name(), id = ?id, "Assigned generated identity");
            self.attributes.insert(attribute, id);
            self.unique_key = None;
        }
        Ok(true)
    }

    /// UPDATE the record's row through its identity condition.
    ///
    /// Succeeds without touching the connection when nothing changed.
    pub(crate) fn do_low_update(
        &mut self,
        meta: &ModelMetaData,
        connection: &dyn Connection,
        table: &Table,
    ) -> Result<bool> {
        let column_map = self.active_column_map(meta);
        let dynamic = self.manager.is_using_dynamic_update(self.model_name());
        let snapshot = if dynamic {
            self.snapshot.as_ref()
        } else {
            None
        };
        let plan = plan_update(
            self.model_name(),
            meta,
            column_map,
            &self.attributes,
            snapshot,
        )?;

        if plan.is_empty() {
            tracing::debug!(model = %self.model_name(), "No changed columns; update skipped");
            return Ok(true);
        }

        if self.unique_key.is_none() {
            self.unique_key = self.build_unique_key(meta, connection)?;
        }
        let Some(key) = &self.unique_key else {
            return Err(Error::State(format!(
                "a record of model \"{}\" cannot be updated without a primary key value",
                self.model_name()
            )));
        };

        tracing::debug!(
            model = %self.model_name(),
            table = %table,
            fields = ?plan.fields,
            "Updating record"
        );
        connection.update(table, &plan.fields, &plan.values, key, &plan.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrecord_core::{ColumnDef, DataType, TableSchema};

    fn robots() -> ModelMetaData {
        TableSchema::new()
            .column(ColumnDef::new("id", DataType::Integer).primary_key().identity())
            .column(ColumnDef::new("type", DataType::Varchar).not_null())
            .column(ColumnDef::new("name", DataType::Varchar).not_null())
            .column(ColumnDef::new("year", DataType::Integer).not_null())
            .build()
    }

    fn attrs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_insert_puts_identity_last_with_default_sentinel() {
        let attributes = attrs(&[
            ("type", "mechanical".into()),
            ("name", "Astro Boy".into()),
            ("year", Value::Int(1952)),
        ]);
        let plan = plan_insert("Robots", &robots(), None, &attributes, Value::Null).unwrap();
        assert_eq!(plan.fields, ["type", "name", "year", "id"]);
        assert_eq!(plan.values[3], Value::Null);
        assert_eq!(plan.types, [BindType::Str, BindType::Str, BindType::Int, BindType::Skip]);
    }

    #[test]
    fn test_insert_binds_unset_attributes_as_skip() {
        let attributes = attrs(&[("name", "R2".into()), ("id", Value::Int(9))]);
        let plan = plan_insert("Robots", &robots(), None, &attributes, Value::Null).unwrap();
        assert_eq!(plan.values[0], Value::Null);
        assert_eq!(plan.types[0], BindType::Skip);
        assert_eq!(plan.values[3], Value::Int(9));
        assert_eq!(plan.types[3], BindType::Int);
    }

    #[test]
    fn test_insert_requires_bind_types() {
        let meta = TableSchema::new()
            .column(ColumnDef::new("id", DataType::Integer).primary_key())
            .column(ColumnDef::new("name", DataType::Varchar))
            .without_bind_type("name")
            .build();
        let attributes = attrs(&[("name", "x".into())]);
        let err = plan_insert("Robots", &meta, None, &attributes, Value::Null).unwrap_err();
        assert!(matches!(err, Error::ColumnNotInMetadata { .. }));
    }

    #[test]
    fn test_insert_skips_automatic_columns() {
        let meta = robots().with_automatic_create_attributes(["year".to_string()].into());
        let plan = plan_insert("Robots", &meta, None, &HashMap::new(), Value::Null).unwrap();
        assert_eq!(plan.fields, ["type", "name", "id"]);
    }

    #[test]
    fn test_update_without_snapshot_writes_all_candidates() {
        let attributes = attrs(&[
            ("id", Value::Int(1)),
            ("type", "mechanical".into()),
            ("name", "Astro Boy".into()),
            ("year", Value::Int(1952)),
        ]);
        let plan = plan_update("Robots", &robots(), None, &attributes, None).unwrap();
        assert_eq!(plan.fields, ["type", "name", "year"]);
    }

    #[test]
    fn test_dynamic_update_keeps_changed_and_unknown_columns() {
        let attributes = attrs(&[
            ("id", Value::Int(1)),
            ("type", "mechanical".into()),
            ("name", "Astro Boy II".into()),
            ("year", Value::Int(1952)),
        ]);
        let snapshot: Data = [
            ("id".to_string(), Value::Int(1)),
            ("name".to_string(), Value::from("Astro Boy")),
            ("year".to_string(), Value::BigInt(1952)),
        ]
        .into_iter()
        .collect();
        let plan = plan_update("Robots", &robots(), None, &attributes, Some(&snapshot)).unwrap();
        assert_eq!(plan.fields, ["type", "name"]);
    }

    #[test]
    fn test_dynamic_update_with_equal_snapshot_is_empty() {
        let attributes = attrs(&[
            ("id", Value::Int(1)),
            ("type", "mechanical".into()),
            ("name", "Astro Boy".into()),
            ("year", Value::Int(1952)),
        ]);
        let snapshot: Data = attributes.clone().into_iter().collect();
        let plan = plan_update("Robots", &robots(), None, &attributes, Some(&snapshot)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_update_writes_unset_as_skip_even_when_dynamic() {
        let attributes = attrs(&[
            ("id", Value::Int(1)),
            ("type", "t".into()),
            ("name", "n".into()),
        ]);
        let snapshot: Data = attributes.clone().into_iter().collect();
        let plan = plan_update("Robots", &robots(), None, &attributes, Some(&snapshot)).unwrap();
        assert_eq!(plan.fields, ["year"]);
        assert_eq!(plan.types, [BindType::Skip]);
    }

    #[test]
    fn test_update_with_column_map() {
        let meta = TableSchema::new()
            .column(ColumnDef::new("id", DataType::Integer).primary_key())
            .column(ColumnDef::new("robot_name", DataType::Varchar).attribute("name"))
            .build();
        let attributes = attrs(&[("id", Value::Int(1)), ("name", "x".into())]);
        let plan =
            plan_update("Robots", &meta, meta.column_map(), &attributes, None).unwrap();
        assert_eq!(plan.fields, ["robot_name"]);
        assert_eq!(plan.values, [Value::from("x")]);
    }
}
