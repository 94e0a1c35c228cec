//! Public persistence entry points: save, create, update, delete, refresh.

use std::sync::Arc;

use sqlrecord_core::{
    BoundCondition, Data, Error, FetchMode, Message, MessageKind, ModelMetaData, Result,
    SelectDefinition, require_bind_type, resolve_attribute,
};

use super::pipeline::PreSave;
use super::{DirtyState, Operation, Record, RelatedBag, Status};
use crate::model::ModelEvent;
use crate::transaction::ImplicitTransaction;

const NOT_REFRESHABLE: &str =
    "the record cannot be refreshed because it does not exist or is deleted";

/// Finish an optional cascade transaction.
fn finish(transaction: Option<ImplicitTransaction>, commit: bool) -> Result<()> {
    match transaction {
        Some(transaction) if commit => transaction.commit(),
        Some(transaction) => transaction.rollback(),
        None => Ok(()),
    }
}

impl Record {
    /// Insert or update the record, whichever its existence calls for.
    ///
    /// Pending related records are written in the same transaction.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model_name()))]
    pub fn save(&mut self) -> Result<Status> {
        self.save_inner(None, None)
    }

    /// Mass-assign `data` (restricted to `whitelist` when given), then save.
    #[tracing::instrument(level = "debug", skip(self, data), fields(model = %self.model_name()))]
    pub fn save_with(&mut self, data: &Data, whitelist: Option<&[&str]>) -> Result<Status> {
        self.save_inner(Some(data), whitelist)
    }

    fn save_inner(&mut self, data: Option<&Data>, whitelist: Option<&[&str]>) -> Result<Status> {
        let meta = self.meta()?;
        if let Some(data) = data {
            self.assign_data(&meta, data, whitelist)?;
        }

        let mut related = std::mem::take(&mut self.related);
        let result = self.save_cycle(&meta, &mut related);
        let attached_meanwhile = std::mem::replace(&mut self.related, related);
        self.related.absorb(attached_meanwhile);
        result
    }

    fn save_cycle(&mut self, meta: &ModelMetaData, related: &mut RelatedBag) -> Result<Status> {
        self.messages.clear();
        let write = self.write_connection()?;

        let transaction = if related.is_empty() {
            None
        } else {
            let transaction = ImplicitTransaction::begin(Arc::clone(&write))?;
            if !self.pre_save_related(related)? {
                transaction.rollback()?;
                return Ok(Status::Failed);
            }
            Some(transaction)
        };

        let table = self.table();
        let read = self.read_connection()?;
        let exists = self.exists_in(meta, read.as_ref(), &table)?;
        self.operation_made = if exists {
            Operation::Update
        } else {
            Operation::Create
        };

        let identity = meta.identity_field();
        match self.pre_save(meta, exists, identity)? {
            PreSave::Abort => {
                finish(transaction, false)?;
                return Ok(Status::Failed);
            }
            PreSave::Skip => {
                finish(transaction, true)?;
                return Ok(Status::Success);
            }
            PreSave::Proceed => {}
        }

        let mut success = if exists {
            self.do_low_update(meta, write.as_ref(), &table)?
        } else {
            self.do_low_insert(meta, write.as_ref(), &table, identity)?
        };
        if success {
            self.dirty_state = DirtyState::Persistent;
            if self.manager.is_keeping_snapshots(self.model_name()) {
                self.snapshot = Some(self.current_data(meta)?);
            }
        }
        if self.config().events {
            success = self.post_save(success, exists);
        }

        let Some(transaction) = transaction else {
            return Ok(success.into());
        };
        if !success || !self.post_save_related(related)? {
            transaction.rollback()?;
            return Ok(Status::Failed);
        }
        transaction.commit()?;
        Ok(Status::Success)
    }

    /// Insert the record; fails with a message when its row already exists.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model_name()))]
    pub fn create(&mut self) -> Result<Status> {
        self.create_inner(None, None)
    }

    /// Mass-assign `data`, then [`Record::create`].
    #[tracing::instrument(level = "debug", skip(self, data), fields(model = %self.model_name()))]
    pub fn create_with(&mut self, data: &Data, whitelist: Option<&[&str]>) -> Result<Status> {
        self.create_inner(Some(data), whitelist)
    }

    fn create_inner(&mut self, data: Option<&Data>, whitelist: Option<&[&str]>) -> Result<Status> {
        let meta = self.meta()?;
        if let Some(data) = data {
            self.assign_data(&meta, data, whitelist)?;
        }

        let read = self.read_connection()?;
        let table = self.table();
        if self.exists_in(&meta, read.as_ref(), &table)? {
            self.messages = vec![
                Message::new("Record cannot be created because it already exists")
                    .kind(MessageKind::InvalidCreateAttempt),
            ];
            return Ok(Status::Failed);
        }
        self.save_inner(None, None)
    }

    /// Update the record; fails with a message when its row does not exist.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model_name()))]
    pub fn update(&mut self) -> Result<Status> {
        self.update_inner(None, None)
    }

    /// Mass-assign `data`, then [`Record::update`].
    #[tracing::instrument(level = "debug", skip(self, data), fields(model = %self.model_name()))]
    pub fn update_with(&mut self, data: &Data, whitelist: Option<&[&str]>) -> Result<Status> {
        self.update_inner(Some(data), whitelist)
    }

    fn update_inner(&mut self, data: Option<&Data>, whitelist: Option<&[&str]>) -> Result<Status> {
        let meta = self.meta()?;
        if let Some(data) = data {
            self.assign_data(&meta, data, whitelist)?;
        }

        if self.dirty_state != DirtyState::Persistent {
            let read = self.read_connection()?;
            let table = self.table();
            if !self.exists_in(&meta, read.as_ref(), &table)? {
                self.messages = vec![
                    Message::new("Record cannot be updated because it does not exist")
                        .kind(MessageKind::InvalidUpdateAttempt),
                ];
                return Ok(Status::Failed);
            }
        }
        self.save_inner(None, None)
    }

    /// Delete the record's row.
    ///
    /// The record is detached once the DELETE has been issued, whatever its
    /// outcome.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model_name()))]
    pub fn delete(&mut self) -> Result<Status> {
        let meta = self.meta()?;
        let write = self.write_connection()?;
        let config = self.config();

        self.operation_made = Operation::Delete;
        self.messages.clear();

        if config.virtual_foreign_keys && !self.check_foreign_keys_reverse()? {
            return Ok(Status::Failed);
        }

        let primary_keys = meta.primary_key_attributes();
        if primary_keys.is_empty() {
            return Err(Error::State(format!(
                "a primary key must be defined in model \"{}\" in order to perform the operation",
                self.model_name()
            )));
        }

        let column_map = self.active_column_map(&meta);
        let mut condition = BoundCondition::default();
        let mut fragments = Vec::with_capacity(primary_keys.len());
        for column in primary_keys {
            let bind_type = require_bind_type(self.model_name(), meta.bind_types(), column)?;
            let attribute = resolve_attribute(self.model_name(), column_map, column)?;
            let value = self.attributes.get(attribute).cloned().ok_or_else(|| {
                Error::State(
                    "cannot delete the record because one of the primary key attributes isn't set"
                        .to_string(),
                )
            })?;
            fragments.push(format!("{} = ?", write.escape_identifier(column)));
            condition.params.push(value);
            condition.types.push(bind_type);
        }
        condition.sql = fragments.join(" AND ");

        if config.events {
            self.skipped = false;
            if self.fire_event_cancel(ModelEvent::BeforeDelete).is_cancel() {
                return Ok(Status::Failed);
            }
            if self.skipped {
                tracing::debug!(model = %self.model_name(), "Delete skipped by hook");
                return Ok(Status::Success);
            }
        }

        let table = self.table();
        tracing::debug!(model = %self.model_name(), table = %table, "Deleting record");
        let outcome = write.delete(&table, &condition.sql, &condition.params, &condition.types);
        self.dirty_state = DirtyState::Detached;
        let success = outcome?;

        if success && config.events {
            self.fire_event(ModelEvent::AfterDelete);
        }
        Ok(success.into())
    }

    /// Re-read every column of the record's row into its attributes.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.model_name()))]
    pub fn refresh(&mut self) -> Result<()> {
        if self.dirty_state != DirtyState::Persistent {
            return Err(Error::State(NOT_REFRESHABLE.to_string()));
        }

        let meta = self.meta()?;
        let read = self.read_connection()?;
        let table = self.table();
        if self.unique_key.is_none() && !self.exists_in(&meta, read.as_ref(), &table)? {
            return Err(Error::State(NOT_REFRESHABLE.to_string()));
        }
        let Some(key) = self.unique_key.clone() else {
            return Err(Error::State(NOT_REFRESHABLE.to_string()));
        };

        let columns = meta
            .attributes()
            .iter()
            .map(|column| read.escape_identifier(column))
            .collect();
        let sql = read
            .dialect()
            .select(&SelectDefinition::new(read.escape_table(&table), columns).filter(key.sql));
        let Some(row) = read.fetch_one(&sql, FetchMode::Assoc, &key.params, &key.types)? else {
            return Err(Error::State(NOT_REFRESHABLE.to_string()));
        };

        let column_map = self.active_column_map(&meta);
        self.assign(&row.into_data(), column_map)?;
        if self.manager.is_keeping_snapshots(self.model_name()) {
            self.snapshot = Some(self.current_data(&meta)?);
        }
        Ok(())
    }
}
