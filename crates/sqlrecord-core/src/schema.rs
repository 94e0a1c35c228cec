//! Builder for [`ModelMetaData`].
//!
//! Describes a table column by column and derives every list the metadata
//! service exposes (primary keys, not-null columns, bind types, column maps).
//!
//! # Example
//!
//! ```
//! use sqlrecord_core::schema::{ColumnDef, TableSchema};
//! use sqlrecord_core::types::{BindType, DataType};
//!
//! let meta = TableSchema::new()
//!     .column(ColumnDef::new("id", DataType::Integer).primary_key().identity())
//!     .column(ColumnDef::new("robot_name", DataType::Varchar).not_null().attribute("name"))
//!     .build();
//!
//! assert_eq!(meta.identity_field(), Some("id"));
//! assert_eq!(meta.bind_types()["id"], BindType::Int);
//! assert_eq!(meta.column_map().unwrap()["robot_name"], "name");
//! ```

use std::collections::{HashMap, HashSet};

use crate::metadata::ModelMetaData;
use crate::row::ColumnMap;
use crate::types::{BindType, DataType};

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name in the database.
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Whether the database generates the value.
    pub identity: bool,
    /// Bind type override; derived from `data_type` when `None`.
    pub bind_type: Option<BindType>,
    /// In-object attribute name when it differs from the column name.
    pub attribute: Option<String>,
}

impl ColumnDef {
    /// Nullable, non-key column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            identity: false,
            bind_type: None,
            attribute: None,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Primary key columns are implicitly NOT NULL.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    #[must_use]
    pub fn bind_type(mut self, bind_type: BindType) -> Self {
        self.bind_type = Some(bind_type);
        self
    }

    /// Expose the column under another attribute name.
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

/// Table description that builds a [`ModelMetaData`].
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    column_map: Option<ColumnMap>,
    skip_bind_types: HashSet<String>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Use `map` verbatim as the column map instead of deriving it from the
    /// columns' attribute names. Columns missing from `map` stay unmapped.
    #[must_use]
    pub fn column_map<I, K, V>(mut self, map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.column_map = Some(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Leave `column` out of the bind-type table.
    #[must_use]
    pub fn without_bind_type(mut self, column: impl Into<String>) -> Self {
        self.skip_bind_types.insert(column.into());
        self
    }

    pub fn build(self) -> ModelMetaData {
        let mut meta = ModelMetaData::default();
        let mut renamed = false;

        for column in &self.columns {
            meta.attributes.push(column.name.clone());
            if column.primary_key {
                meta.primary_keys.push(column.name.clone());
            } else {
                meta.non_primary_keys.push(column.name.clone());
            }
            if !column.nullable {
                meta.not_null.push(column.name.clone());
            }
            if column.identity && meta.identity.is_none() {
                meta.identity = Some(column.name.clone());
            }
            meta.data_types
                .insert(column.name.clone(), column.data_type);
            if column.data_type.is_numeric() {
                meta.numeric.insert(column.name.clone());
            }
            if !self.skip_bind_types.contains(&column.name) {
                let bind = column
                    .bind_type
                    .unwrap_or_else(|| BindType::for_data_type(column.data_type));
                meta.bind_types.insert(column.name.clone(), bind);
            }
            renamed |= column.attribute.is_some();
        }

        let column_map = self.column_map.or_else(|| {
            renamed.then(|| {
                self.columns
                    .iter()
                    .map(|c| {
                        let attribute = c.attribute.clone().unwrap_or_else(|| c.name.clone());
                        (c.name.clone(), attribute)
                    })
                    .collect::<HashMap<_, _>>()
            })
        });
        meta.reverse_column_map = column_map
            .as_ref()
            .map(|map| map.iter().map(|(c, a)| (a.clone(), c.clone())).collect());
        meta.column_map = column_map;
        meta
    }
}
