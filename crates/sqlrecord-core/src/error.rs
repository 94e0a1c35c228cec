//! Fatal error channel.
//!
//! Everything here aborts the current call. Recoverable outcomes (failed
//! validation, virtual foreign-key violations, rejected hooks) never become an
//! [`Error`]; they are appended to the record as [`Message`](crate::Message)s
//! and the operation reports a failed status instead.

use thiserror::Error;

/// Result alias used throughout SQLRecord.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Services missing from the container or unusable.
    Configuration,
    /// Column maps or bind-type tables do not match the model.
    ColumnMapping,
    /// The operation does not make sense in the record's current state.
    State,
    /// A path that is recognised but unsupported.
    NotImplemented,
    /// Relation registry misuse.
    Relation,
    /// Failures reported by the connection or the (de)serializer.
    Storage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A column is absent from the active column map.
    #[error("column \"{column}\" isn't part of the column map of model \"{model}\"")]
    InvalidColumnMap {
        /// Model whose map was consulted.
        model: String,
        /// The unmapped column.
        column: String,
    },

    /// A column has no declared bind type.
    #[error("column \"{column}\" isn't part of the table columns of model \"{model}\"")]
    ColumnNotInMetadata {
        /// Model whose metadata was consulted.
        model: String,
        /// The column without a bind type.
        column: String,
    },

    #[error("metadata error: {0}")]
    MetaData(String),

    #[error("{0}")]
    State(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("relation error: {0}")]
    Relation(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::MetaData(_) => ErrorKind::Configuration,
            Self::InvalidColumnMap { .. } | Self::ColumnNotInMetadata { .. } => {
                ErrorKind::ColumnMapping
            }
            Self::State(_) | Self::InvalidArgument(_) => ErrorKind::State,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::Relation(_) => ErrorKind::Relation,
            Self::Connection(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn unmapped(model: &str, column: &str) -> Self {
        Self::InvalidColumnMap {
            model: model.to_string(),
            column: column.to_string(),
        }
    }

    pub(crate) fn missing_bind_type(model: &str, column: &str) -> Self {
        Self::ColumnNotInMetadata {
            model: model.to_string(),
            column: column.to_string(),
        }
    }
}

/// Look a column up in an optional column map.
///
/// With no active map the column name is the attribute name.
pub fn resolve_attribute<'a>(
    model: &str,
    column_map: Option<&'a crate::ColumnMap>,
    column: &'a str,
) -> Result<&'a str> {
    match column_map {
        Some(map) => map
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| Error::unmapped(model, column)),
        None => Ok(column),
    }
}

/// Bind type of a column, failing when the metadata does not declare one.
pub fn require_bind_type(
    model: &str,
    bind_types: &std::collections::HashMap<String, crate::BindType>,
    column: &str,
) -> Result<crate::BindType> {
    bind_types
        .get(column)
        .copied()
        .ok_or_else(|| Error::missing_bind_type(model, column))
}
