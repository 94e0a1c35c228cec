//! Existence checks and the cached identity condition.

use sqlrecord_core::{
    BoundCondition, Connection, ModelMetaData, Result, Table, Value, require_bind_type,
    resolve_attribute,
};

use super::{DirtyState, Record};

impl Record {
    /// Build the primary-key condition from the current attribute values.
    ///
    /// Returns `None` when the model has no primary key or every key value
    /// is blank; such a record cannot match a row.
    pub(crate) fn build_unique_key(
        &self,
        meta: &ModelMetaData,
        connection: &dyn Connection,
    ) -> Result<Option<BoundCondition>> {
        let primary_keys = meta.primary_key_attributes();
        if primary_keys.is_empty() {
            return Ok(None);
        }

        let column_map = self.active_column_map(meta);
        let model = self.model_name();
        let mut fragments = Vec::with_capacity(primary_keys.len());
        let mut params = Vec::with_capacity(primary_keys.len());
        let mut types = Vec::with_capacity(primary_keys.len());
        let mut blank = 0;

        for column in primary_keys {
            let attribute = resolve_attribute(model, column_map, column)?;
            let value = match self.attributes.get(attribute) {
                Some(value) => {
                    if value.is_blank() {
                        blank += 1;
                    }
                    value.clone()
                }
                None => {
                    blank += 1;
                    Value::Null
                }
            };
            let bind_type = require_bind_type(model, meta.bind_types(), column)?;
            fragments.push(format!("{} = ?", connection.escape_identifier(column)));
            params.push(value);
            types.push(bind_type);
        }

        if blank == primary_keys.len() {
            return Ok(None);
        }
        Ok(Some(BoundCondition::new(fragments.join(" AND "), params, types)))
    }

    /// Whether the record's row exists, using `connection` and `table`.
    ///
    /// A persistent record with a cached identity condition is trusted
    /// without a query. Otherwise the COUNT result decides the new dirty
    /// state.
    pub(crate) fn exists_in(
        &mut self,
        meta: &ModelMetaData,
        connection: &dyn Connection,
        table: &Table,
    ) -> Result<bool> {
        if self.unique_key.is_none() {
            match self.build_unique_key(meta, connection)? {
                Some(key) => self.unique_key = Some(key),
                None => return Ok(false),
            }
        }

        if self.dirty_state == DirtyState::Persistent {
            return Ok(true);
        }

        let Some(key) = &self.unique_key else {
            return Ok(false);
        };
        let sql = format!(
            "SELECT COUNT(*) AS rowcount FROM {} WHERE {}",
            connection.escape_table(table),
            key.sql
        );
        tracing::debug!(
            model = %self.model_name(),
            table = %table,
            sql = %sql,
            "Checking existence"
        );
        let row = connection.fetch_one(
            &sql,
            sqlrecord_core::FetchMode::Assoc,
            &key.params,
            &key.types,
        )?;
        let count = row
            .as_ref()
            .and_then(|r| r.get("rowcount"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let exists = count > 0;
        self.dirty_state = if exists {
            DirtyState::Persistent
        } else {
            DirtyState::Transient
        };
        Ok(exists)
    }

    /// Whether the record's row exists, on the model's read connection.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model_name()))]
    pub fn exists(&mut self) -> Result<bool> {
        let meta = self.meta()?;
        let connection = self.read_connection()?;
        let table = self.table();
        self.exists_in(&meta, connection.as_ref(), &table)
    }
}
