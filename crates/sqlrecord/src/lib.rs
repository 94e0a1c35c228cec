//! ActiveRecord-style entity records for SQLRecord.
//!
//! `sqlrecord` is the **engine layer**: it turns one row of one model into a
//! [`Record`] that knows how to insert, update, delete and refresh itself.
//!
//! # Role In The Architecture
//!
//! - **Entity record**: [`Record`] carries the attribute bag, dirty state,
//!   cached identity condition, messages, snapshot and pending related
//!   records, and runs the save pipeline (existence check, validation
//!   events, virtual foreign keys, low-level write, related cascades).
//! - **Extension points**: [`Model`] is implemented per table; [`Behavior`]
//!   handlers and [`Validator`]s hook into the event pipeline.
//! - **Shared services**: [`Manager`] (default [`ModelsManager`]) holds the
//!   relation graph and per-model options; [`Di`] wires the manager, the
//!   metadata service and the named connections together.
//! - **Transactions**: [`ImplicitTransaction`] scopes related-record cascades
//!   to a single `save`.
//!
//! Collaborator contracts (`Connection`, `MetaData`, `Dialect`) and the data
//! types live in `sqlrecord-core` and are re-exported from [`prelude`].

pub mod di;
pub mod finder;
pub mod manager;
pub mod model;
pub mod record;
pub mod transaction;
pub mod validation;

pub use di::{DEFAULT_CONNECTION_SERVICE, Di, DiBuilder};
pub use finder::{Finder, FinderKind, FinderTable};
pub use manager::{Behavior, Manager, ModelsManager, QueryMethod, RecordSet};
pub use model::{EventOutcome, Model, ModelEvent, Setter};
pub use record::{DirtyState, Operation, Record, Related, Status};
pub use transaction::ImplicitTransaction;
pub use validation::{InclusionIn, PresenceOf, RegexValidator, Validator, matches_pattern};

/// Everything an application usually needs, core types included.
pub mod prelude {
    pub use crate::{
        Behavior, Di, DirtyState, EventOutcome, InclusionIn, Manager, Model, ModelEvent,
        ModelsManager, Operation, PresenceOf, Record, RecordSet, RegexValidator, Related, Status,
        Validator,
    };
    pub use sqlrecord_core::{
        AnsiDialect, BindType, BoundCondition, ColumnDef, ColumnMap, Connection, Data, DataType,
        Dialect, Error, ErrorKind, FetchMode, Fields, ForeignKeyOptions, Intermediate,
        MemoryMetaData, Message, MessageKind, MetaData, ModelMetaData, OrmConfig, Relation,
        RelationKind, RelationOptions, RelationQuery, Result, Row, SelectDefinition, SetupOptions,
        Table, TableSchema, Value,
    };
}
