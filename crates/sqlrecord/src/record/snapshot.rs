//! Snapshots and change detection.
//!
//! A snapshot is the last known database state of a record, keyed by
//! attribute name. Comparisons are numeric-aware, so `1` and `1.0` (or an
//! integer read back as a wider integer) do not count as a change.

use sqlrecord_core::{ColumnMap, Data, Error, ModelMetaData, Result, resolve_attribute};

use super::{DirtyState, Record};

impl Record {
    /// Replace the snapshot with `data`.
    ///
    /// With a column map, keys of `data` are column names and are stored under
    /// their attribute names; a key missing from the map is an error.
    pub fn set_snapshot_data(&mut self, data: &Data, column_map: Option<&ColumnMap>) -> Result<()> {
        let snapshot = match column_map {
            None => data.clone(),
            Some(map) => data
                .iter()
                .map(|(column, value)| {
                    let attribute = resolve_attribute(self.model_name(), Some(map), column)?;
                    Ok((attribute.to_string(), value.clone()))
                })
                .collect::<Result<Data>>()?,
        };
        self.snapshot = Some(snapshot);
        Ok(())
    }

    pub fn has_snapshot_data(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot_data(&self) -> Option<&Data> {
        self.snapshot.as_ref()
    }

    /// Whether `field` (or, with `None`, any attribute) differs from the
    /// snapshot.
    pub fn has_changed(&self, field: Option<&str>) -> Result<bool> {
        let snapshot = self.checked_snapshot()?;
        let meta = self.meta()?;
        let attributes = self.attribute_names(&meta)?;

        let Some(field) = field else {
            return Ok(!self.diff(snapshot, &attributes).is_empty());
        };
        if !attributes.iter().any(|a| a == field) {
            return Err(Error::InvalidArgument(format!(
                "the field '{field}' is not part of the model \"{}\"",
                self.model_name()
            )));
        }
        let Some(value) = self.attributes.get(field) else {
            return Err(Error::InvalidArgument(format!(
                "the field '{field}' is not defined on the record"
            )));
        };
        let Some(old) = snapshot.get(field) else {
            return Err(Error::InvalidArgument(format!(
                "the field '{field}' was not found in the snapshot"
            )));
        };
        Ok(!old.loosely_equals(value))
    }

    /// Attribute names whose value differs from the snapshot, in column
    /// order. An attribute missing on either side counts as changed.
    pub fn changed_fields(&self) -> Result<Vec<String>> {
        let snapshot = self.checked_snapshot()?;
        let meta = self.meta()?;
        let attributes = self.attribute_names(&meta)?;
        Ok(self.diff(snapshot, &attributes))
    }

    fn checked_snapshot(&self) -> Result<&Data> {
        let snapshot = self.snapshot.as_ref().ok_or_else(|| {
            Error::State("the record doesn't have a valid data snapshot".to_string())
        })?;
        if self.dirty_state != DirtyState::Persistent {
            return Err(Error::State(
                "change checking cannot be performed because the record has not been \
                 persisted or is deleted"
                    .to_string(),
            ));
        }
        Ok(snapshot)
    }

    /// The model's attribute names, in column order.
    fn attribute_names(&self, meta: &ModelMetaData) -> Result<Vec<String>> {
        let column_map = self.active_column_map(meta);
        meta.attributes()
            .iter()
            .map(|column| {
                resolve_attribute(self.model_name(), column_map, column).map(str::to_string)
            })
            .collect()
    }

    fn diff(&self, snapshot: &Data, attributes: &[String]) -> Vec<String> {
        attributes
            .iter()
            .filter(|name| {
                match (self.attributes.get(name.as_str()), snapshot.get(name.as_str())) {
                    (Some(value), Some(old)) => !old.loosely_equals(value),
                    _ => true,
                }
            })
            .cloned()
            .collect()
    }
}
