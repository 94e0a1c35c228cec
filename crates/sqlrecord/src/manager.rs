//! The models manager.
//!
//! One [`Manager`] is shared by every record of every model. It owns the
//! cross-record state: which models are initialized, the relation graph,
//! behaviors and listeners, per-model options (source, schema, connection
//! services, dynamic update, snapshots) and the registered-finder tables.
//!
//! [`ModelsManager`] is the default implementation. Its state sits behind
//! `RwLock`s and a poisoned lock is recovered, not propagated.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sqlrecord_core::{
    BindType, BoundCondition, Connection, Error, FetchMode, Fields, Intermediate, ModelMetaData,
    OrmConfig, Relation, RelationKind, RelationOptions, RelationQuery, Result, SelectDefinition,
    Table, Value, uncamelize,
};

use crate::di::DEFAULT_CONNECTION_SERVICE;
use crate::finder::{Finder, FinderTable};
use crate::model::{EventOutcome, Model, ModelEvent};
use crate::record::Record;

/// What a relation query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Find,
    Count,
}

/// Result of loading related records or running a finder.
#[derive(Debug, Clone)]
pub enum RecordSet {
    /// Single-valued relation (belongs-to, has-one) or `findFirstBy`.
    One(Option<Box<Record>>),
    Many(Vec<Record>),
    Count(u64),
}

impl RecordSet {
    /// Number of records held, or the counted total.
    pub fn count(&self) -> u64 {
        match self {
            Self::One(record) => u64::from(record.is_some()),
            Self::Many(records) => records.len() as u64,
            Self::Count(count) => *count,
        }
    }

    pub fn first(&self) -> Option<&Record> {
        match self {
            Self::One(record) => record.as_deref(),
            Self::Many(records) => records.first(),
            Self::Count(_) => None,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::One(record) => record.map(|r| vec![*r]).unwrap_or_default(),
            Self::Many(records) => records,
            Self::Count(_) => Vec::new(),
        }
    }
}

/// A reusable event handler attached to one model, or to all of them as a
/// listener.
pub trait Behavior: Send + Sync {
    fn notify(&self, event: ModelEvent, record: &mut Record) -> EventOutcome;
}

impl<F> Behavior for F
where
    F: Fn(ModelEvent, &mut Record) -> EventOutcome + Send + Sync,
{
    fn notify(&self, event: ModelEvent, record: &mut Record) -> EventOutcome {
        self(event, record)
    }
}

/// Cross-record services shared by all models.
pub trait Manager: Send + Sync {
    /// Run the model's one-time initialization for `record`'s model.
    fn initialize(&self, record: &mut Record) -> Result<()>;

    fn is_initialized(&self, model: &str) -> bool;

    /// Make `model` loadable by name.
    fn register(&self, model: Arc<dyn Model>);

    fn load(&self, model: &str) -> Result<Arc<dyn Model>>;

    // ------------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------------

    /// Register `relation`, replacing any relation of the same model and alias.
    fn add_relation(&self, relation: Relation) -> Relation;

    fn add_belongs_to(
        &self,
        model: &str,
        fields: Fields,
        referenced_model: &str,
        referenced_fields: Fields,
        options: RelationOptions,
    ) -> Relation {
        self.add_relation(
            Relation::new(
                RelationKind::BelongsTo,
                model,
                fields,
                referenced_model,
                referenced_fields,
            )
            .options(options),
        )
    }

    fn add_has_one(
        &self,
        model: &str,
        fields: Fields,
        referenced_model: &str,
        referenced_fields: Fields,
        options: RelationOptions,
    ) -> Relation {
        self.add_relation(
            Relation::new(
                RelationKind::HasOne,
                model,
                fields,
                referenced_model,
                referenced_fields,
            )
            .options(options),
        )
    }

    fn add_has_many(
        &self,
        model: &str,
        fields: Fields,
        referenced_model: &str,
        referenced_fields: Fields,
        options: RelationOptions,
    ) -> Relation {
        self.add_relation(
            Relation::new(
                RelationKind::HasMany,
                model,
                fields,
                referenced_model,
                referenced_fields,
            )
            .options(options),
        )
    }

    fn add_has_many_through(
        &self,
        model: &str,
        fields: Fields,
        intermediate: Intermediate,
        referenced_model: &str,
        referenced_fields: Fields,
        options: RelationOptions,
    ) -> Relation {
        self.add_relation(
            Relation::new(
                RelationKind::HasManyThrough,
                model,
                fields,
                referenced_model,
                referenced_fields,
            )
            .through(intermediate)
            .options(options),
        )
    }

    /// Every relation of `model`, in registration order.
    fn relations(&self, model: &str) -> Vec<Relation>;

    fn belongs_to(&self, model: &str) -> Vec<Relation> {
        self.relations(model)
            .into_iter()
            .filter(|r| r.kind == RelationKind::BelongsTo)
            .collect()
    }

    fn has_one_and_has_many(&self, model: &str) -> Vec<Relation> {
        self.relations(model)
            .into_iter()
            .filter(|r| matches!(r.kind, RelationKind::HasOne | RelationKind::HasMany))
            .collect()
    }

    fn relation_by_alias(&self, model: &str, alias: &str) -> Option<Relation> {
        let alias = alias.to_lowercase();
        self.relations(model).into_iter().find(|r| r.alias() == alias)
    }

    /// Load (or count) the records `caller` reaches through `relation`.
    fn relation_records(
        &self,
        relation: &Relation,
        method: QueryMethod,
        caller: &Record,
        query: Option<&RelationQuery>,
    ) -> Result<RecordSet>;

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Notify the model's behaviors, then the global listeners. The first
    /// `Cancel` stops the notification.
    fn notify_event(&self, event: ModelEvent, record: &mut Record) -> EventOutcome;

    fn add_behavior(&self, model: &str, behavior: Arc<dyn Behavior>);

    fn attach_listener(&self, listener: Arc<dyn Behavior>);

    // ------------------------------------------------------------------------
    // Per-model options
    // ------------------------------------------------------------------------

    fn use_dynamic_update(&self, model: &str, enabled: bool);

    fn is_using_dynamic_update(&self, model: &str) -> bool;

    fn keep_snapshots(&self, model: &str, enabled: bool);

    fn is_keeping_snapshots(&self, model: &str) -> bool;

    fn set_model_source(&self, model: &str, source: &str);

    /// Table name of `model`; `uncamelize(model)` unless set.
    fn model_source(&self, model: &str) -> String;

    fn set_model_schema(&self, model: &str, schema: &str);

    fn model_schema(&self, model: &str) -> Option<String>;

    /// Schema-qualified table of `model`.
    fn model_table(&self, model: &str) -> Table {
        let table = Table::new(self.model_source(model));
        match self.model_schema(model) {
            Some(schema) => table.with_schema(schema),
            None => table,
        }
    }

    fn set_connection_service(&self, model: &str, service: &str) {
        self.set_read_connection_service(model, service);
        self.set_write_connection_service(model, service);
    }

    fn set_read_connection_service(&self, model: &str, service: &str);

    fn set_write_connection_service(&self, model: &str, service: &str);

    fn read_connection_service(&self, model: &str) -> String;

    fn write_connection_service(&self, model: &str) -> String;

    /// Registered finder `method` of `model`, e.g. `findFirstByName`.
    fn finder(&self, model: &str, method: &str) -> Option<Finder>;
}

// ============================================================================
// ModelsManager
// ============================================================================

#[derive(Debug, Clone, Default)]
struct ModelOptions {
    dynamic_update: bool,
    keep_snapshots: bool,
    source: Option<String>,
    schema: Option<String>,
    read_service: Option<String>,
    write_service: Option<String>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn key(model: &str) -> String {
    model.to_lowercase()
}

/// The default [`Manager`].
#[derive(Default)]
pub struct ModelsManager {
    models: RwLock<HashMap<String, Arc<dyn Model>>>,
    initialized: RwLock<HashSet<String>>,
    relations: RwLock<HashMap<String, Vec<Relation>>>,
    behaviors: RwLock<HashMap<String, Vec<Arc<dyn Behavior>>>>,
    listeners: RwLock<Vec<Arc<dyn Behavior>>>,
    options: RwLock<HashMap<String, ModelOptions>>,
    finders: RwLock<HashMap<String, FinderTable>>,
}

impl fmt::Debug for ModelsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<String> = read(&self.models).keys().cloned().collect();
        models.sort();
        f.debug_struct("ModelsManager")
            .field("models", &models)
            .field("relations", &*read(&self.relations))
            .field("options", &*read(&self.options))
            .field("listeners", &read(&self.listeners).len())
            .finish_non_exhaustive()
    }
}

impl ModelsManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn option<T>(&self, model: &str, get: impl FnOnce(&ModelOptions) -> T) -> Option<T> {
        read(&self.options).get(&key(model)).map(get)
    }

    fn set_option(&self, model: &str, set: impl FnOnce(&mut ModelOptions)) {
        set(write(&self.options).entry(key(model)).or_default());
    }
}

impl Manager for ModelsManager {
    fn initialize(&self, record: &mut Record) -> Result<()> {
        let name = key(record.model_name());
        if !write(&self.initialized).insert(name.clone()) {
            return Ok(());
        }
        self.register(Arc::clone(record.model()));

        let model = Arc::clone(record.model());
        let result = model.initialize(record).and_then(|()| {
            let meta = record.metadata().read(record.model_name())?;
            let column_map = if record.di().config().column_renaming {
                meta.column_map()
            } else {
                None
            };
            write(&self.finders).insert(name.clone(), FinderTable::build(&meta, column_map));
            Ok(())
        });

        if let Err(e) = result {
            write(&self.initialized).remove(&name);
            return Err(e);
        }
        tracing::debug!(model = %record.model_name(), "Initialized model");
        Ok(())
    }

    fn is_initialized(&self, model: &str) -> bool {
        read(&self.initialized).contains(&key(model))
    }

    fn register(&self, model: Arc<dyn Model>) {
        write(&self.models).insert(key(model.name()), model);
    }

    fn load(&self, model: &str) -> Result<Arc<dyn Model>> {
        read(&self.models).get(&key(model)).cloned().ok_or_else(|| {
            Error::Configuration(format!("model \"{model}\" could not be loaded"))
        })
    }

    fn add_relation(&self, relation: Relation) -> Relation {
        let alias = relation.alias();
        let mut relations = write(&self.relations);
        let list = relations.entry(key(&relation.model)).or_default();
        match list.iter_mut().find(|r| r.alias() == alias) {
            Some(existing) => *existing = relation.clone(),
            None => list.push(relation.clone()),
        }
        relation
    }

    fn relations(&self, model: &str) -> Vec<Relation> {
        read(&self.relations)
            .get(&key(model))
            .cloned()
            .unwrap_or_default()
    }

    fn relation_records(
        &self,
        relation: &Relation,
        method: QueryMethod,
        caller: &Record,
        query: Option<&RelationQuery>,
    ) -> Result<RecordSet> {
        let referenced = relation.referenced_model.as_str();
        let di = caller.di();
        let connection = di.connection(&self.read_connection_service(referenced))?;
        let referenced_meta = caller.metadata().read(referenced)?;
        let config = *di.config();
        let table = connection.escape_table(&self.model_table(referenced));

        let mut condition = BoundCondition::default();
        let mut definition = match &relation.intermediate {
            Some(intermediate) => {
                let through = connection.escape_table(&self.model_table(&intermediate.model));
                let intermediate_meta = caller.metadata().read(&intermediate.model)?;
                let on = pair_columns(
                    &intermediate.referenced_fields,
                    &relation.referenced_fields,
                    relation,
                )?
                .into_iter()
                .map(|(link, target)| {
                    format!(
                        "{through}.{} = {table}.{}",
                        connection
                            .escape_identifier(&column_of(&config, &intermediate_meta, &link)),
                        connection
                            .escape_identifier(&column_of(&config, &referenced_meta, &target)),
                    )
                })
                .collect::<Vec<_>>()
                .join(" AND ");
                bind_caller_values(
                    &mut condition,
                    caller,
                    &relation.fields,
                    &intermediate.fields,
                    relation,
                    &intermediate_meta,
                    &config,
                    connection.as_ref(),
                    Some(&through),
                )?;
                let columns = select_columns(&referenced_meta, connection.as_ref(), Some(&table));
                SelectDefinition::new(table.clone(), columns)
                    .join(format!("INNER JOIN {through} ON {on}"))
            }
            None => {
                bind_caller_values(
                    &mut condition,
                    caller,
                    &relation.fields,
                    &relation.referenced_fields,
                    relation,
                    &referenced_meta,
                    &config,
                    connection.as_ref(),
                    None,
                )?;
                let columns = select_columns(&referenced_meta, connection.as_ref(), None);
                SelectDefinition::new(table.clone(), columns)
            }
        };

        let query = query.or(relation.options.params.as_ref());
        if let Some(query) = query {
            if let Some(extra) = &query.conditions {
                condition.and_raw(extra);
                for value in &query.bind {
                    condition.types.push(BindType::for_value(value));
                    condition.params.push(value.clone());
                }
            }
        }
        definition = definition.filter(condition.sql.clone());

        if method == QueryMethod::Count {
            definition.columns = vec!["COUNT(*) AS rowcount".to_string()];
            let sql = connection.dialect().select(&definition);
            tracing::debug!(relation = %relation.alias(), sql = %sql, "Counting related records");
            let row =
                connection.fetch_one(&sql, FetchMode::Assoc, &condition.params, &condition.types)?;
            let count = row
                .as_ref()
                .and_then(|r| r.get("rowcount"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            return Ok(RecordSet::Count(u64::try_from(count).unwrap_or(0)));
        }

        if let Some(order) = query.and_then(|q| q.order.as_ref()) {
            definition = definition.order_by(order.clone());
        }
        match query.and_then(|q| q.limit) {
            Some(limit) => definition = definition.limit(limit),
            None if relation.is_single() => definition = definition.limit(1),
            None => {}
        }

        let sql = connection.dialect().select(&definition);
        tracing::debug!(relation = %relation.alias(), sql = %sql, "Loading related records");
        let rows =
            connection.fetch_all(&sql, FetchMode::Assoc, &condition.params, &condition.types)?;

        let model = self.load(referenced)?;
        let records =
            Record::hydrate_rows(&model, di, rows, self.is_keeping_snapshots(referenced))?;
        if relation.is_single() {
            return Ok(RecordSet::One(records.into_iter().next().map(Box::new)));
        }
        Ok(RecordSet::Many(records))
    }

    fn notify_event(&self, event: ModelEvent, record: &mut Record) -> EventOutcome {
        let behaviors = read(&self.behaviors)
            .get(&key(record.model_name()))
            .cloned()
            .unwrap_or_default();
        let listeners = read(&self.listeners).clone();

        for handler in behaviors.iter().chain(listeners.iter()) {
            if handler.notify(event, record).is_cancel() {
                return EventOutcome::Cancel;
            }
        }
        EventOutcome::Continue
    }

    fn add_behavior(&self, model: &str, behavior: Arc<dyn Behavior>) {
        write(&self.behaviors)
            .entry(key(model))
            .or_default()
            .push(behavior);
    }

    fn attach_listener(&self, listener: Arc<dyn Behavior>) {
        write(&self.listeners).push(listener);
    }

    fn use_dynamic_update(&self, model: &str, enabled: bool) {
        self.set_option(model, |o| o.dynamic_update = enabled);
    }

    fn is_using_dynamic_update(&self, model: &str) -> bool {
        self.option(model, |o| o.dynamic_update).unwrap_or(false)
    }

    fn keep_snapshots(&self, model: &str, enabled: bool) {
        self.set_option(model, |o| o.keep_snapshots = enabled);
    }

    fn is_keeping_snapshots(&self, model: &str) -> bool {
        self.option(model, |o| o.keep_snapshots).unwrap_or(false)
    }

    fn set_model_source(&self, model: &str, source: &str) {
        self.set_option(model, |o| o.source = Some(source.to_string()));
    }

    fn model_source(&self, model: &str) -> String {
        self.option(model, |o| o.source.clone())
            .flatten()
            .unwrap_or_else(|| uncamelize(model))
    }

    fn set_model_schema(&self, model: &str, schema: &str) {
        self.set_option(model, |o| o.schema = Some(schema.to_string()));
    }

    fn model_schema(&self, model: &str) -> Option<String> {
        self.option(model, |o| o.schema.clone()).flatten()
    }

    fn set_read_connection_service(&self, model: &str, service: &str) {
        self.set_option(model, |o| o.read_service = Some(service.to_string()));
    }

    fn set_write_connection_service(&self, model: &str, service: &str) {
        self.set_option(model, |o| o.write_service = Some(service.to_string()));
    }

    fn read_connection_service(&self, model: &str) -> String {
        self.option(model, |o| o.read_service.clone())
            .flatten()
            .unwrap_or_else(|| DEFAULT_CONNECTION_SERVICE.to_string())
    }

    fn write_connection_service(&self, model: &str) -> String {
        self.option(model, |o| o.write_service.clone())
            .flatten()
            .unwrap_or_else(|| DEFAULT_CONNECTION_SERVICE.to_string())
    }

    fn finder(&self, model: &str, method: &str) -> Option<Finder> {
        read(&self.finders)
            .get(&key(model))
            .and_then(|table| table.get(method).cloned())
    }
}

// ============================================================================
// Relation query helpers
// ============================================================================

/// Column name of `attribute` on a model, through its reverse column map.
fn column_of(config: &OrmConfig, meta: &ModelMetaData, attribute: &str) -> String {
    config
        .column_renaming
        .then(|| meta.reverse_column_map())
        .flatten()
        .and_then(|map| map.get(attribute))
        .cloned()
        .unwrap_or_else(|| attribute.to_string())
}

fn pair_columns(
    left: &Fields,
    right: &Fields,
    relation: &Relation,
) -> Result<Vec<(String, String)>> {
    let (left, right) = (left.to_vec(), right.to_vec());
    if left.len() != right.len() {
        return Err(Error::Relation(format!(
            "relation \"{}\" of model \"{}\" pairs {} fields with {}",
            relation.alias(),
            relation.model,
            left.len(),
            right.len()
        )));
    }
    Ok(left.into_iter().zip(right).collect())
}

fn select_columns(
    meta: &ModelMetaData,
    connection: &dyn Connection,
    qualifier: Option<&str>,
) -> Vec<String> {
    meta.attributes()
        .iter()
        .map(|column| {
            let escaped = connection.escape_identifier(column);
            match qualifier {
                Some(table) => format!("{table}.{escaped}"),
                None => escaped,
            }
        })
        .collect()
}

/// AND one `column = ?` per field pair, bound to the caller's values.
fn bind_caller_values(
    condition: &mut BoundCondition,
    caller: &Record,
    caller_fields: &Fields,
    target_fields: &Fields,
    relation: &Relation,
    target_meta: &ModelMetaData,
    config: &OrmConfig,
    connection: &dyn Connection,
    qualifier: Option<&str>,
) -> Result<()> {
    let mut fragments = Vec::new();
    for (field, target) in pair_columns(caller_fields, target_fields, relation)? {
        let column = column_of(config, target_meta, &target);
        let value = caller.read_attribute(&field).cloned().unwrap_or(Value::Null);
        let bind_type = target_meta
            .bind_types()
            .get(&column)
            .copied()
            .unwrap_or_else(|| BindType::for_value(&value));
        let escaped = connection.escape_identifier(&column);
        fragments.push(match qualifier {
            Some(table) => format!("{table}.{escaped} = ?"),
            None => format!("{escaped} = ?"),
        });
        condition.params.push(value);
        condition.types.push(bind_type);
    }
    condition.sql = fragments.join(" AND ");
    Ok(())
}
