//! The per-table extension point and the lifecycle events it hooks into.
//!
//! A [`Model`] says which table-level behavior a record has: its name (the
//! key for metadata, relations and manager settings), a one-time
//! `initialize` hook for registering relations and options, and a per-record
//! event hook that runs before any behavior or listener the manager holds.
//!
//! ```ignore
//! struct Robots;
//!
//! impl Model for Robots {
//!     fn name(&self) -> &str {
//!         "Robots"
//!     }
//!
//!     fn initialize(&self, record: &mut Record) -> Result<()> {
//!         record.has_many("id", "RobotsParts", "robots_id", RelationOptions::default());
//!         Ok(())
//!     }
//!
//!     fn on_event(&self, event: ModelEvent, record: &mut Record) -> EventOutcome {
//!         let classic = record.read_attribute("year") == Some(&Value::Int(1952));
//!         if event == ModelEvent::BeforeDelete && classic {
//!             return EventOutcome::Cancel;
//!         }
//!         EventOutcome::Continue
//!     }
//! }
//! ```

use std::fmt;

use sqlrecord_core::{Result, Value};

use crate::record::Record;

/// Custom attribute setter preferred over a direct write during mass assignment.
pub type Setter = fn(&mut Record, Value);

/// Lifecycle events, in the order a save fires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    BeforeValidation,
    BeforeValidationOnCreate,
    BeforeValidationOnUpdate,
    Validation,
    OnValidationFails,
    AfterValidationOnCreate,
    AfterValidationOnUpdate,
    AfterValidation,
    BeforeSave,
    BeforeCreate,
    BeforeUpdate,
    AfterCreate,
    AfterUpdate,
    AfterSave,
    NotSave,
    NotSaved,
    NotDeleted,
    BeforeDelete,
    AfterDelete,
}

impl ModelEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeValidation => "beforeValidation",
            Self::BeforeValidationOnCreate => "beforeValidationOnCreate",
            Self::BeforeValidationOnUpdate => "beforeValidationOnUpdate",
            Self::Validation => "validation",
            Self::OnValidationFails => "onValidationFails",
            Self::AfterValidationOnCreate => "afterValidationOnCreate",
            Self::AfterValidationOnUpdate => "afterValidationOnUpdate",
            Self::AfterValidation => "afterValidation",
            Self::BeforeSave => "beforeSave",
            Self::BeforeCreate => "beforeCreate",
            Self::BeforeUpdate => "beforeUpdate",
            Self::AfterCreate => "afterCreate",
            Self::AfterUpdate => "afterUpdate",
            Self::AfterSave => "afterSave",
            Self::NotSave => "notSave",
            Self::NotSaved => "notSaved",
            Self::NotDeleted => "notDeleted",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook wants to happen next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventOutcome {
    #[default]
    Continue,
    /// Stop the operation. Only honored by cancelable events.
    Cancel,
}

impl EventOutcome {
    pub const fn is_cancel(self) -> bool {
        matches!(self, Self::Cancel)
    }
}

impl From<bool> for EventOutcome {
    fn from(proceed: bool) -> Self {
        if proceed { Self::Continue } else { Self::Cancel }
    }
}

/// Table-level behavior of a family of records.
pub trait Model: Send + Sync {
    /// Model name; the key used for metadata, relations and manager settings.
    fn name(&self) -> &str;

    /// Runs once per model name, the first time a record of it is built.
    fn initialize(&self, record: &mut Record) -> Result<()> {
        let _ = record;
        Ok(())
    }

    /// Per-record hook, called before the manager dispatches `event`.
    fn on_event(&self, event: ModelEvent, record: &mut Record) -> EventOutcome {
        let _ = (event, record);
        EventOutcome::Continue
    }

    /// Setter used for `attribute` during mass assignment.
    fn setter(&self, attribute: &str) -> Option<Setter> {
        let _ = attribute;
        None
    }

    /// Sequence holding the identity values, for backends that use sequences.
    fn sequence_name(&self) -> Option<String> {
        None
    }
}
