//! The entity record.
//!
//! A [`Record`] is one row of one model: an attribute bag keyed by attribute
//! name whose shape comes from the metadata service, plus the bookkeeping the
//! persistence pipeline needs (dirty state, cached identity condition,
//! messages, snapshot, pending related records).
//!
//! # Example
//!
//! ```ignore
//! let mut robot = Record::new(Arc::new(Robots), Arc::clone(&di))?;
//! robot.write_attribute("type", "mechanical");
//! robot.write_attribute("name", "Astro Boy");
//! robot.write_attribute("year", 1952);
//!
//! if robot.create()?.is_failed() {
//!     for message in robot.messages() {
//!         eprintln!("{message}");
//!     }
//! }
//! assert_eq!(robot.operation_made(), Operation::Create);
//! ```
//!
//! Lifecycle operations live in submodules: existence checks and the
//! identity condition (`exists`), the event pipeline (`pipeline`), low-level
//! writes (`persist`), related-record cascades and virtual foreign keys
//! (`cascade`), the public save/create/update/delete/refresh entry points
//! (`lifecycle`), snapshots and change detection (`snapshot`), and
//! assignment/serialization helpers (`assign`).

mod assign;
mod cascade;
mod exists;
mod lifecycle;
mod persist;
mod pipeline;
mod snapshot;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlrecord_core::{
    BoundCondition, ColumnMap, Connection, Data, Error, Fields, Intermediate, Message, MetaData,
    ModelMetaData, OrmConfig, Relation, RelationKind, RelationOptions, RelationQuery, Result,
    Table, Value,
};

use crate::di::Di;
use crate::manager::{Behavior, Manager, QueryMethod, RecordSet};
use crate::model::Model;
use crate::validation::Validator;

// ============================================================================
// State enums
// ============================================================================

/// What the record knows about its row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirtyState {
    /// Known to exist as of the last check.
    Persistent,
    /// Existence not verified yet.
    #[default]
    Transient,
    /// Deleted, or identity invalidated.
    Detached,
}

impl DirtyState {
    pub const fn code(self) -> u8 {
        match self {
            Self::Persistent => 0,
            Self::Transient => 1,
            Self::Detached => 2,
        }
    }
}

/// Last persistence action taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[default]
    None,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Create => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }
}

/// Result of a save, create, update or delete.
///
/// `Failed` means the attempt was rejected by validation, a constraint or a
/// hook; the reasons are in [`Record::messages`]. Fatal problems are reported
/// as `Err` instead.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl From<bool> for Status {
    fn from(success: bool) -> Self {
        if success { Self::Success } else { Self::Failed }
    }
}

/// A pending related write attached under an alias.
#[derive(Debug, Clone)]
pub enum Related {
    One(Box<Record>),
    Many(Vec<Record>),
    /// Raw rows. Only meaningful for aliases without a registered relation,
    /// where they are carried along and ignored by the cascade.
    Data(Vec<Data>),
}

impl From<Record> for Related {
    fn from(record: Record) -> Self {
        Self::One(Box::new(record))
    }
}

impl From<Vec<Record>> for Related {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records)
    }
}

/// Related writes keyed by lower-cased alias, in insertion order.
#[derive(Debug, Clone, Default)]
pub(crate) struct RelatedBag {
    entries: Vec<(String, Related)>,
}

impl RelatedBag {
    fn insert(&mut self, alias: String, related: Related) {
        match self.entries.iter_mut().find(|(a, _)| *a == alias) {
            Some(entry) => entry.1 = related,
            None => self.entries.push((alias, related)),
        }
    }

    fn get(&self, alias: &str) -> Option<&Related> {
        self.entries.iter().find(|(a, _)| a == alias).map(|(_, r)| r)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `newer` in, letting its entries win.
    fn absorb(&mut self, newer: RelatedBag) {
        for (alias, related) in newer.entries {
            self.insert(alias, related);
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// One live row of a model.
#[derive(Clone)]
pub struct Record {
    model: Arc<dyn Model>,
    di: Arc<Di>,
    manager: Arc<dyn Manager>,
    metadata: Arc<dyn MetaData>,
    attributes: HashMap<String, Value>,
    dirty_state: DirtyState,
    operation_made: Operation,
    unique_key: Option<BoundCondition>,
    messages: Vec<Message>,
    snapshot: Option<Data>,
    related: RelatedBag,
    skipped: bool,
    transaction: Option<Arc<dyn Connection>>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model.name())
            .field("attributes", &self.attributes)
            .field("dirty_state", &self.dirty_state)
            .field("operation_made", &self.operation_made)
            .field("unique_key", &self.unique_key)
            .field("messages", &self.messages)
            .field("snapshot", &self.snapshot)
            .field("related", &self.related)
            .field("in_transaction", &self.transaction.is_some())
            .finish_non_exhaustive()
    }
}

impl Record {
    /// Build a transient record bound to the services in `di`.
    ///
    /// Runs the manager's one-time `initialize` for the model.
    pub fn new(model: Arc<dyn Model>, di: Arc<Di>) -> Result<Self> {
        let mut record = Self::bind(model, di)?;
        let manager = Arc::clone(&record.manager);
        manager.initialize(&mut record)?;
        Ok(record)
    }

    /// [`Record::new`] against the process default container.
    pub fn with_default_di(model: Arc<dyn Model>) -> Result<Self> {
        let di = Di::get_default().ok_or_else(|| {
            Error::Configuration("a default service container has not been installed".to_string())
        })?;
        Self::new(model, di)
    }

    fn bind(model: Arc<dyn Model>, di: Arc<Di>) -> Result<Self> {
        let manager = di.manager()?;
        let metadata = di.metadata()?;
        Ok(Self {
            model,
            di,
            manager,
            metadata,
            attributes: HashMap::new(),
            dirty_state: DirtyState::Transient,
            operation_made: Operation::None,
            unique_key: None,
            messages: Vec::new(),
            snapshot: None,
            related: RelatedBag::default(),
            skipped: false,
            transaction: None,
        })
    }

    // ------------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------------

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn di(&self) -> &Arc<Di> {
        &self.di
    }

    pub fn manager(&self) -> &Arc<dyn Manager> {
        &self.manager
    }

    pub fn metadata(&self) -> &Arc<dyn MetaData> {
        &self.metadata
    }

    pub(crate) fn config(&self) -> OrmConfig {
        *self.di.config()
    }

    pub(crate) fn meta(&self) -> Result<Arc<ModelMetaData>> {
        self.metadata.read(self.model.name())
    }

    /// The model's column map, when column renaming is enabled.
    pub(crate) fn active_column_map<'m>(&self, meta: &'m ModelMetaData) -> Option<&'m ColumnMap> {
        if self.config().column_renaming {
            meta.column_map()
        } else {
            None
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty_state
    }

    pub fn set_dirty_state(&mut self, state: DirtyState) {
        self.dirty_state = state;
    }

    pub fn operation_made(&self) -> Operation {
        self.operation_made
    }

    /// The cached identity condition, once an existence check built it.
    pub fn unique_key(&self) -> Option<&BoundCondition> {
        self.unique_key.as_ref()
    }

    /// Make the current save or delete a no-op success. Meant for
    /// `beforeCreate`, `beforeUpdate` and `beforeDelete` hooks.
    pub fn skip_operation(&mut self, skip: bool) {
        self.skipped = skip;
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    pub fn read_attribute(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    pub fn write_attribute(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(attribute.into(), value.into());
    }

    /// Forget an attribute; it counts as unset afterwards.
    pub fn unset_attribute(&mut self, attribute: &str) -> Option<Value> {
        self.attributes.remove(attribute)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn validation_has_failed(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Run `validator`, appending its messages on failure.
    pub fn validate(&mut self, validator: &dyn Validator) -> bool {
        match validator.validate(self) {
            Ok(()) => true,
            Err(messages) => {
                self.messages.extend(messages);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Table identity and connections
    // ------------------------------------------------------------------------

    pub fn source(&self) -> String {
        self.manager.model_source(self.model.name())
    }

    pub fn set_source(&self, source: &str) {
        self.manager.set_model_source(self.model.name(), source);
    }

    pub fn schema(&self) -> Option<String> {
        self.manager.model_schema(self.model.name())
    }

    pub fn set_schema(&self, schema: &str) {
        self.manager.set_model_schema(self.model.name(), schema);
    }

    /// Schema-qualified table of the model.
    pub fn table(&self) -> Table {
        let table = Table::new(self.source());
        match self.schema() {
            Some(schema) => table.with_schema(schema),
            None => table,
        }
    }

    /// Use `service` for both reads and writes.
    pub fn set_connection_service(&self, service: &str) {
        self.manager.set_connection_service(self.model.name(), service);
    }

    pub fn set_read_connection_service(&self, service: &str) {
        self.manager
            .set_read_connection_service(self.model.name(), service);
    }

    pub fn set_write_connection_service(&self, service: &str) {
        self.manager
            .set_write_connection_service(self.model.name(), service);
    }

    pub fn read_connection(&self) -> Result<Arc<dyn Connection>> {
        self.di
            .connection(&self.manager.read_connection_service(self.model.name()))
    }

    /// The connection writes go through: the attached transaction when there
    /// is one, the model's write service otherwise.
    pub fn write_connection(&self) -> Result<Arc<dyn Connection>> {
        if let Some(connection) = &self.transaction {
            return Ok(Arc::clone(connection));
        }
        self.di
            .connection(&self.manager.write_connection_service(self.model.name()))
    }

    /// Route every write of this record through `connection`, typically one
    /// with a transaction already open on it.
    pub fn set_transaction(&mut self, connection: Arc<dyn Connection>) {
        self.transaction = Some(connection);
    }

    /// Detach the connection installed by [`Record::set_transaction`].
    pub fn clear_transaction(&mut self) -> Option<Arc<dyn Connection>> {
        self.transaction.take()
    }

    pub fn transaction(&self) -> Option<&Arc<dyn Connection>> {
        self.transaction.as_ref()
    }

    // ------------------------------------------------------------------------
    // Model configuration
    // ------------------------------------------------------------------------

    /// Leave `columns` out of both INSERT and UPDATE statements.
    pub fn skip_attributes(&self, columns: &[&str]) -> Result<()> {
        let set = to_set(columns);
        self.metadata
            .set_automatic_create_attributes(self.model.name(), set.clone())?;
        self.metadata
            .set_automatic_update_attributes(self.model.name(), set)
    }

    pub fn skip_attributes_on_create(&self, columns: &[&str]) -> Result<()> {
        self.metadata
            .set_automatic_create_attributes(self.model.name(), to_set(columns))
    }

    pub fn skip_attributes_on_update(&self, columns: &[&str]) -> Result<()> {
        self.metadata
            .set_automatic_update_attributes(self.model.name(), to_set(columns))
    }

    /// Only write changed columns on update (needs snapshots).
    pub fn use_dynamic_update(&self, enabled: bool) {
        self.manager.use_dynamic_update(self.model.name(), enabled);
    }

    pub fn keep_snapshots(&self, enabled: bool) {
        self.manager.keep_snapshots(self.model.name(), enabled);
    }

    pub fn add_behavior(&self, behavior: Arc<dyn Behavior>) {
        self.manager.add_behavior(self.model.name(), behavior);
    }

    // ------------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------------

    pub fn belongs_to(
        &self,
        fields: impl Into<Fields>,
        referenced_model: &str,
        referenced_fields: impl Into<Fields>,
        options: RelationOptions,
    ) -> Relation {
        self.manager.add_relation(
            Relation::new(
                RelationKind::BelongsTo,
                self.model.name(),
                fields,
                referenced_model,
                referenced_fields,
            )
            .options(options),
        )
    }

    pub fn has_one(
        &self,
        fields: impl Into<Fields>,
        referenced_model: &str,
        referenced_fields: impl Into<Fields>,
        options: RelationOptions,
    ) -> Relation {
        self.manager.add_relation(
            Relation::new(
                RelationKind::HasOne,
                self.model.name(),
                fields,
                referenced_model,
                referenced_fields,
            )
            .options(options),
        )
    }

    pub fn has_many(
        &self,
        fields: impl Into<Fields>,
        referenced_model: &str,
        referenced_fields: impl Into<Fields>,
        options: RelationOptions,
    ) -> Relation {
        self.manager.add_relation(
            Relation::new(
                RelationKind::HasMany,
                self.model.name(),
                fields,
                referenced_model,
                referenced_fields,
            )
            .options(options),
        )
    }

    pub fn has_many_through(
        &self,
        fields: impl Into<Fields>,
        intermediate: Intermediate,
        referenced_model: &str,
        referenced_fields: impl Into<Fields>,
        options: RelationOptions,
    ) -> Relation {
        self.manager.add_relation(
            Relation::new(
                RelationKind::HasManyThrough,
                self.model.name(),
                fields,
                referenced_model,
                referenced_fields,
            )
            .through(intermediate)
            .options(options),
        )
    }

    /// Attach records to be written with the next save.
    ///
    /// The record becomes transient: its existence is re-checked on save.
    pub fn set_related(&mut self, alias: &str, related: impl Into<Related>) {
        self.related.insert(alias.to_lowercase(), related.into());
        self.dirty_state = DirtyState::Transient;
    }

    /// Pending related write under `alias`.
    pub fn related(&self, alias: &str) -> Option<&Related> {
        self.related.get(&alias.to_lowercase())
    }

    fn relation(&self, alias: &str) -> Result<Relation> {
        self.manager
            .relation_by_alias(self.model.name(), alias)
            .ok_or_else(|| {
                Error::Relation(format!(
                    "there is no defined relations for the model \"{}\" using alias \"{alias}\"",
                    self.model.name()
                ))
            })
    }

    /// Load the records related through `alias`.
    pub fn get_related(&self, alias: &str, query: Option<&RelationQuery>) -> Result<RecordSet> {
        let relation = self.relation(alias)?;
        self.manager
            .relation_records(&relation, QueryMethod::Find, self, query)
    }

    /// Count the records related through `alias`.
    pub fn count_related(&self, alias: &str, query: Option<&RelationQuery>) -> Result<u64> {
        let relation = self.relation(alias)?;
        let set = self
            .manager
            .relation_records(&relation, QueryMethod::Count, self, query)?;
        Ok(set.count())
    }
}

fn to_set(columns: &[&str]) -> HashSet<String> {
    columns.iter().map(|c| (*c).to_string()).collect()
}
