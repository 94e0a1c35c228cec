//! Event firing and the pre/post-save gates.

use std::sync::Arc;

use sqlrecord_core::{Message, MessageKind, ModelMetaData, Result, resolve_attribute};

use super::{Operation, Record};
use crate::model::{EventOutcome, ModelEvent};

/// Verdict of the pre-save gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreSave {
    Proceed,
    /// A hook asked for a no-op success.
    Skip,
    Abort,
}

impl Record {
    /// Fire `event` on the model hook, then the manager. Cannot be cancelled.
    pub(crate) fn fire_event(&mut self, event: ModelEvent) {
        let model = Arc::clone(&self.model);
        let _ = model.on_event(event, self);
        let manager = Arc::clone(&self.manager);
        let _ = manager.notify_event(event, self);
    }

    /// Fire `event`, stopping at the first hook that cancels.
    pub(crate) fn fire_event_cancel(&mut self, event: ModelEvent) -> EventOutcome {
        let model = Arc::clone(&self.model);
        if model.on_event(event, self).is_cancel() {
            tracing::debug!(
                model = %self.model_name(),
                event = %event,
                "Operation cancelled by model hook"
            );
            return EventOutcome::Cancel;
        }
        let manager = Arc::clone(&self.manager);
        let outcome = manager.notify_event(event, self);
        if outcome.is_cancel() {
            tracing::debug!(
                model = %self.model_name(),
                event = %event,
                "Operation cancelled by manager"
            );
        }
        outcome
    }

    /// Tell listeners the current save or delete did not happen.
    pub(crate) fn cancel_operation(&mut self) {
        let event = if self.operation_made == Operation::Delete {
            ModelEvent::NotDeleted
        } else {
            ModelEvent::NotSaved
        };
        self.fire_event(event);
    }

    /// Run every gate between the existence check and the write.
    pub(crate) fn pre_save(
        &mut self,
        meta: &ModelMetaData,
        exists: bool,
        identity: Option<&str>,
    ) -> Result<PreSave> {
        let config = self.config();

        if config.events {
            if self.fire_event_cancel(ModelEvent::BeforeValidation).is_cancel() {
                return Ok(PreSave::Abort);
            }
            let event = if exists {
                ModelEvent::BeforeValidationOnUpdate
            } else {
                ModelEvent::BeforeValidationOnCreate
            };
            if self.fire_event_cancel(event).is_cancel() {
                return Ok(PreSave::Abort);
            }
        }

        if config.virtual_foreign_keys && !self.check_foreign_keys()? {
            return Ok(PreSave::Abort);
        }

        if config.not_null_validations && !self.check_not_null(meta, exists, identity)? {
            if config.events {
                self.fire_event(ModelEvent::OnValidationFails);
                self.cancel_operation();
            }
            return Ok(PreSave::Abort);
        }

        if !config.events {
            return Ok(PreSave::Proceed);
        }

        if self.fire_event_cancel(ModelEvent::Validation).is_cancel()
            || self.validation_has_failed()
        {
            self.fire_event(ModelEvent::OnValidationFails);
            return Ok(PreSave::Abort);
        }

        let after_validation = if exists {
            ModelEvent::AfterValidationOnUpdate
        } else {
            ModelEvent::AfterValidationOnCreate
        };
        for event in [after_validation, ModelEvent::AfterValidation, ModelEvent::BeforeSave] {
            if self.fire_event_cancel(event).is_cancel() {
                return Ok(PreSave::Abort);
            }
        }

        self.skipped = false;
        let before = if exists {
            ModelEvent::BeforeUpdate
        } else {
            ModelEvent::BeforeCreate
        };
        if self.fire_event_cancel(before).is_cancel() {
            return Ok(PreSave::Abort);
        }
        if self.skipped {
            tracing::debug!(model = %self.model_name(), "Save skipped by hook");
            return Ok(PreSave::Skip);
        }
        Ok(PreSave::Proceed)
    }

    /// Append a `PresenceOf` message for every required attribute that is
    /// missing. Returns `false` when any was found.
    ///
    /// Automatic columns are not checked. The identity column is exempt
    /// while creating, since the backend fills it in.
    fn check_not_null(
        &mut self,
        meta: &ModelMetaData,
        exists: bool,
        identity: Option<&str>,
    ) -> Result<bool> {
        let column_map = self.active_column_map(meta);
        let automatic = if exists {
            meta.automatic_update_attributes()
        } else {
            meta.automatic_create_attributes()
        };
        let numeric = meta.data_types_numeric();
        let model = self.model_name().to_string();
        let mut failed = false;

        for column in meta.not_null_attributes() {
            if automatic.contains(column) {
                continue;
            }
            let attribute = resolve_attribute(&model, column_map, column)?;
            let is_null = match self.attributes.get(attribute) {
                None => true,
                Some(value) if numeric.contains(column) => !value.is_numeric(),
                Some(value) => value.is_blank(),
            };
            if !is_null {
                continue;
            }
            if !exists && identity == Some(column.as_str()) {
                continue;
            }
            self.messages.push(
                Message::new(format!("{attribute} is required"))
                    .field(attribute)
                    .kind(MessageKind::PresenceOf),
            );
            failed = true;
        }

        Ok(!failed)
    }

    /// Fire the after-write events. Returns the (unchanged) success flag.
    pub(crate) fn post_save(&mut self, success: bool, exists: bool) -> bool {
        if success {
            let event = if exists {
                ModelEvent::AfterUpdate
            } else {
                ModelEvent::AfterCreate
            };
            self.fire_event(event);
            self.fire_event(ModelEvent::AfterSave);
        } else {
            self.fire_event(ModelEvent::NotSave);
            self.cancel_operation();
        }
        success
    }
}
