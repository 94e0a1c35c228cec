//! Per-model metadata and the service that caches it.
//!
//! A record never knows its own columns: it asks the [`MetaData`] service for
//! the [`ModelMetaData`] of its model and works from the lists there. The
//! descriptor is shared (`Arc`) between every record of the same model.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::row::ColumnMap;
use crate::types::{BindType, DataType};

/// Everything the engine needs to know about one model's table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelMetaData {
    pub(crate) attributes: Vec<String>,
    pub(crate) primary_keys: Vec<String>,
    pub(crate) non_primary_keys: Vec<String>,
    pub(crate) not_null: Vec<String>,
    pub(crate) data_types: HashMap<String, DataType>,
    pub(crate) numeric: HashSet<String>,
    pub(crate) bind_types: HashMap<String, BindType>,
    pub(crate) identity: Option<String>,
    pub(crate) automatic_create: HashSet<String>,
    pub(crate) automatic_update: HashSet<String>,
    pub(crate) column_map: Option<ColumnMap>,
    pub(crate) reverse_column_map: Option<ColumnMap>,
}

impl ModelMetaData {
    /// All columns, in table order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn primary_key_attributes(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn non_primary_key_attributes(&self) -> &[String] {
        &self.non_primary_keys
    }

    pub fn not_null_attributes(&self) -> &[String] {
        &self.not_null
    }

    pub fn data_types(&self) -> &HashMap<String, DataType> {
        &self.data_types
    }

    /// Columns whose data type is numeric.
    pub fn data_types_numeric(&self) -> &HashSet<String> {
        &self.numeric
    }

    pub fn bind_types(&self) -> &HashMap<String, BindType> {
        &self.bind_types
    }

    /// Column → attribute, when the model renames columns.
    pub fn column_map(&self) -> Option<&ColumnMap> {
        self.column_map.as_ref()
    }

    /// Attribute → column, when the model renames columns.
    pub fn reverse_column_map(&self) -> Option<&ColumnMap> {
        self.reverse_column_map.as_ref()
    }

    /// The auto-generated column, if any.
    pub fn identity_field(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Columns left out of INSERT statements.
    pub fn automatic_create_attributes(&self) -> &HashSet<String> {
        &self.automatic_create
    }

    /// Columns left out of UPDATE statements.
    pub fn automatic_update_attributes(&self) -> &HashSet<String> {
        &self.automatic_update
    }

    pub fn has_attribute(&self, column: &str) -> bool {
        self.attributes.iter().any(|a| a == column)
    }

    /// Copy with the create-time automatic columns replaced.
    #[must_use]
    pub fn with_automatic_create_attributes(mut self, attributes: HashSet<String>) -> Self {
        self.automatic_create = attributes;
        self
    }

    /// Copy with the update-time automatic columns replaced.
    #[must_use]
    pub fn with_automatic_update_attributes(mut self, attributes: HashSet<String>) -> Self {
        self.automatic_update = attributes;
        self
    }
}

/// The metadata service.
///
/// Implementations cache descriptors for the life of the process. Reads are
/// concurrent; the automatic-attribute setters are meant for model
/// initialization.
pub trait MetaData: Send + Sync {
    /// Descriptor of `model`.
    fn read(&self, model: &str) -> Result<Arc<ModelMetaData>>;

    fn set_automatic_create_attributes(
        &self,
        model: &str,
        attributes: HashSet<String>,
    ) -> Result<()>;

    fn set_automatic_update_attributes(
        &self,
        model: &str,
        attributes: HashSet<String>,
    ) -> Result<()>;
}

/// Metadata registered up front and kept in memory.
#[derive(Debug, Default)]
pub struct MemoryMetaData {
    models: RwLock<HashMap<String, Arc<ModelMetaData>>>,
}

impl MemoryMetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the descriptor of `model`.
    pub fn register(&self, model: impl Into<String>, metadata: ModelMetaData) {
        let model = model.into();
        tracing::debug!(
            model = %model,
            columns = metadata.attributes.len(),
            "Registering model metadata"
        );
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model, Arc::new(metadata));
    }

    /// Builder-style [`MemoryMetaData::register`].
    #[must_use]
    pub fn with(self, model: impl Into<String>, metadata: ModelMetaData) -> Self {
        self.register(model, metadata);
        self
    }

    fn update(&self, model: &str, apply: impl FnOnce(&mut ModelMetaData)) -> Result<()> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        let entry = models.get_mut(model).ok_or_else(|| {
            Error::MetaData(format!("no metadata registered for model \"{model}\""))
        })?;
        apply(Arc::make_mut(entry));
        Ok(())
    }
}

impl MetaData for MemoryMetaData {
    fn read(&self, model: &str) -> Result<Arc<ModelMetaData>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .cloned()
            .ok_or_else(|| Error::MetaData(format!("no metadata registered for model \"{model}\"")))
    }

    fn set_automatic_create_attributes(
        &self,
        model: &str,
        attributes: HashSet<String>,
    ) -> Result<()> {
        self.update(model, |meta| meta.automatic_create = attributes)
    }

    fn set_automatic_update_attributes(
        &self,
        model: &str,
        attributes: HashSet<String>,
    ) -> Result<()> {
        self.update(model, |meta| meta.automatic_update = attributes)
    }
}
