//! Assignment, hydration and serialization.

use std::sync::Arc;

use sqlrecord_core::{
    ColumnMap, Data, Error, ModelMetaData, Result, Row, Value, resolve_attribute,
};

use super::{DirtyState, Record};
use crate::di::Di;
use crate::model::Model;

impl Record {
    /// Write every entry of `data` into the attributes.
    ///
    /// With a column map, keys are column names translated to attribute
    /// names; a key missing from the map is an error.
    pub fn assign(&mut self, data: &Data, column_map: Option<&ColumnMap>) -> Result<()> {
        for (key, value) in data {
            let attribute = resolve_attribute(self.model_name(), column_map, key)?.to_string();
            self.attributes.insert(attribute, value.clone());
        }
        Ok(())
    }

    /// Mass assignment from attribute-keyed `data`.
    ///
    /// Only model attributes are taken, and only those in `whitelist` when
    /// one is given. A model-defined setter wins over a direct write.
    pub(crate) fn assign_data(
        &mut self,
        meta: &ModelMetaData,
        data: &Data,
        whitelist: Option<&[&str]>,
    ) -> Result<()> {
        let column_map = self.active_column_map(meta);
        for column in meta.attributes() {
            let attribute = resolve_attribute(self.model_name(), column_map, column)?;
            let Some(value) = data.get(attribute) else {
                continue;
            };
            if whitelist.is_some_and(|allowed| !allowed.contains(&attribute)) {
                continue;
            }
            match self.model.setter(attribute) {
                Some(setter) => setter(self, value.clone()),
                None => {
                    self.attributes.insert(attribute.to_string(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// Model attributes keyed by attribute name; unset ones are `Null`.
    pub(crate) fn current_data(&self, meta: &ModelMetaData) -> Result<Data> {
        let column_map = self.active_column_map(meta);
        meta.attributes()
            .iter()
            .map(|column| {
                let attribute = resolve_attribute(self.model_name(), column_map, column)?;
                let value = self.attributes.get(attribute).cloned().unwrap_or(Value::Null);
                Ok((attribute.to_string(), value))
            })
            .collect()
    }

    /// The model attributes as a map, unset ones as `Null`.
    pub fn to_array(&self) -> Result<Data> {
        let meta = self.meta()?;
        self.current_data(&meta)
    }

    /// Every attribute currently held, model column or not.
    pub fn dump(&self) -> Data {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// JSON of [`Record::to_array`].
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_array()?)?)
    }

    /// Rebuild a record from [`Record::serialize`] output, bound to the
    /// process default container.
    pub fn unserialize(model: Arc<dyn Model>, json: &str) -> Result<Record> {
        let di = Di::get_default().ok_or_else(|| {
            Error::Configuration(
                "a default service container is required to unserialize records".to_string(),
            )
        })?;
        let data: Data = serde_json::from_str(json)?;
        let mut record = Record::new(model, di)?;
        record.attributes.extend(data);
        Ok(record)
    }

    /// Build a record from a fetched row keyed by column name.
    ///
    /// Columns are renamed through the model's column map when renaming is
    /// enabled. With `keep_snapshot` the assigned values become the
    /// snapshot.
    pub fn hydrate(
        model: Arc<dyn Model>,
        di: Arc<Di>,
        data: Data,
        dirty_state: DirtyState,
        keep_snapshot: bool,
    ) -> Result<Record> {
        let mut record = Record::new(model, di)?;
        let meta = record.meta()?;
        let column_map = record.active_column_map(&meta);

        let mut attributes = Data::new();
        for (column, value) in data {
            let attribute = resolve_attribute(record.model_name(), column_map, &column)?;
            attributes.insert(attribute.to_string(), value);
        }

        if keep_snapshot {
            record.snapshot = Some(attributes.clone());
        }
        record.attributes.extend(attributes);
        record.dirty_state = dirty_state;
        Ok(record)
    }

    /// Build a persistent record from attribute-keyed `data` as is.
    pub fn from_data(model: Arc<dyn Model>, di: Arc<Di>, data: Data) -> Result<Record> {
        let mut record = Record::new(model, di)?;
        record.attributes.extend(data);
        record.dirty_state = DirtyState::Persistent;
        Ok(record)
    }

    /// [`Record::hydrate`] every row as a persistent record.
    pub(crate) fn hydrate_rows(
        model: &Arc<dyn Model>,
        di: &Arc<Di>,
        rows: Vec<Row>,
        keep_snapshot: bool,
    ) -> Result<Vec<Record>> {
        rows.into_iter()
            .map(|row| {
                Record::hydrate(
                    Arc::clone(model),
                    Arc::clone(di),
                    row.into_data(),
                    DirtyState::Persistent,
                    keep_snapshot,
                )
            })
            .collect()
    }
}
