//! Core types and collaborator traits for SQLRecord.
//!
//! `sqlrecord-core` is the **contract layer** the entity-record engine is
//! written against. It owns no persistence logic of its own.
//!
//! # Role In The Architecture
//!
//! - **Collaborator traits**: [`Connection`], [`Dialect`] and [`MetaData`] are
//!   implemented by drivers and metadata services.
//! - **Data model**: [`Value`], [`Row`], [`BindType`] and [`DataType`] are the
//!   shapes exchanged with those collaborators.
//! - **Outcomes**: [`Error`] is the fatal channel; [`Message`] is what
//!   recoverable validation and constraint failures leave behind.
//! - **Configuration**: [`OrmConfig`] holds the ORM-wide switches.
//!
//! Most applications use the `sqlrecord` crate, which re-exports everything
//! here through its prelude.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod identifiers;
pub mod message;
pub mod metadata;
pub mod relationship;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

pub use config::{OrmConfig, SetupOptions};
pub use connection::{BoundCondition, Connection, FetchMode, Table};
pub use dialect::{AnsiDialect, Dialect, SelectDefinition};
pub use error::{Error, ErrorKind, Result, require_bind_type, resolve_attribute};
pub use identifiers::{camelize, quote_ident, uncamelize};
pub use message::{Message, MessageKind};
pub use metadata::{MemoryMetaData, MetaData, ModelMetaData};
pub use relationship::{
    Fields, ForeignKeyOptions, Intermediate, Relation, RelationKind, RelationOptions,
    RelationQuery,
};
pub use row::{ColumnMap, Data, Row};
pub use schema::{ColumnDef, TableSchema};
pub use types::{BindType, DataType};
pub use value::Value;
