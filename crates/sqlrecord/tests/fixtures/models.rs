//! Sample models and a wired service container.

use std::sync::{Arc, Mutex};

use sqlrecord::prelude::*;
use sqlrecord::Setter;

use super::mock_connection::MockConnection;

pub type InitFn = fn(&mut Record) -> Result<()>;
pub type HookFn = fn(ModelEvent, &mut Record) -> EventOutcome;

/// A model assembled from plain functions.
pub struct TestModel {
    name: &'static str,
    init: Option<InitFn>,
    hook: Option<HookFn>,
    setters: Vec<(&'static str, Setter)>,
    sequence: Option<&'static str>,
}

impl TestModel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            init: None,
            hook: None,
            setters: Vec::new(),
            sequence: None,
        }
    }

    pub fn init(mut self, init: InitFn) -> Self {
        self.init = Some(init);
        self
    }

    pub fn hook(mut self, hook: HookFn) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn setter(mut self, attribute: &'static str, setter: Setter) -> Self {
        self.setters.push((attribute, setter));
        self
    }

    pub fn sequence(mut self, sequence: &'static str) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn shared(self) -> Arc<dyn Model> {
        Arc::new(self)
    }
}

impl Model for TestModel {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&self, record: &mut Record) -> Result<()> {
        match self.init {
            Some(init) => init(record),
            None => Ok(()),
        }
    }

    fn on_event(&self, event: ModelEvent, record: &mut Record) -> EventOutcome {
        match self.hook {
            Some(hook) => hook(event, record),
            None => EventOutcome::Continue,
        }
    }

    fn setter(&self, attribute: &str) -> Option<Setter> {
        self.setters
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, setter)| *setter)
    }

    fn sequence_name(&self) -> Option<String> {
        self.sequence.map(str::to_string)
    }
}

// ============================================================================
// Sample schema
// ============================================================================

pub fn robots_meta() -> ModelMetaData {
    TableSchema::new()
        .column(ColumnDef::new("id", DataType::Integer).primary_key().identity())
        .column(ColumnDef::new("type", DataType::Varchar).not_null())
        .column(ColumnDef::new("name", DataType::Varchar).not_null())
        .column(ColumnDef::new("year", DataType::Integer).not_null())
        .build()
}

pub fn robots_parts_meta() -> ModelMetaData {
    TableSchema::new()
        .column(ColumnDef::new("id", DataType::Integer).primary_key().identity())
        .column(ColumnDef::new("robots_id", DataType::Integer).not_null())
        .column(ColumnDef::new("parts_id", DataType::Integer).not_null())
        .build()
}

pub fn parts_meta() -> ModelMetaData {
    TableSchema::new()
        .column(ColumnDef::new("id", DataType::Integer).primary_key().identity())
        .column(ColumnDef::new("name", DataType::Varchar).not_null())
        .build()
}

/// Robots has many RobotsParts (`robotsParts`) and many Parts through them.
pub fn robots_model() -> Arc<dyn Model> {
    TestModel::new("Robots")
        .init(|record| {
            record.has_many(
                "id",
                "RobotsParts",
                "robots_id",
                RelationOptions::default().alias("robotsParts"),
            );
            record.has_many_through(
                "id",
                Intermediate {
                    model: "RobotsParts".to_string(),
                    fields: "robots_id".into(),
                    referenced_fields: "parts_id".into(),
                },
                "Parts",
                "id",
                RelationOptions::default(),
            );
            Ok(())
        })
        .shared()
}

/// RobotsParts belongs to a Robot (virtual foreign key) and a Part.
pub fn robots_parts_model() -> Arc<dyn Model> {
    TestModel::new("RobotsParts")
        .init(|record| {
            record.belongs_to(
                "robots_id",
                "Robots",
                "id",
                RelationOptions::default()
                    .alias("robot")
                    .foreign_key(ForeignKeyOptions::default().message("The robot does not exist")),
            );
            record.belongs_to(
                "parts_id",
                "Parts",
                "id",
                RelationOptions::default().alias("part"),
            );
            Ok(())
        })
        .shared()
}

/// Parts cannot be deleted while RobotsParts reference them.
pub fn parts_model() -> Arc<dyn Model> {
    TestModel::new("Parts")
        .init(|record| {
            record.has_many(
                "id",
                "RobotsParts",
                "parts_id",
                RelationOptions::default()
                    .alias("robotsParts")
                    .foreign_key(ForeignKeyOptions::default()),
            );
            Ok(())
        })
        .shared()
}

// ============================================================================
// Fixture
// ============================================================================

/// A container wired to a [`MockConnection`] with the sample models.
pub struct Fixture {
    pub di: Arc<Di>,
    pub connection: Arc<MockConnection>,
    pub metadata: Arc<MemoryMetaData>,
    pub manager: Arc<ModelsManager>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(OrmConfig::default(), MockConnection::new())
    }

    pub fn with_config(config: OrmConfig) -> Self {
        Self::build(config, MockConnection::new())
    }

    pub fn build(config: OrmConfig, connection: MockConnection) -> Self {
        let connection = Arc::new(connection);
        let metadata = Arc::new(
            MemoryMetaData::new()
                .with("Robots", robots_meta())
                .with("RobotsParts", robots_parts_meta())
                .with("Parts", parts_meta()),
        );
        let manager = Arc::new(ModelsManager::new());
        let di = Di::builder()
            .config(config)
            .manager(manager.clone())
            .metadata(metadata.clone())
            .connection("db", connection.clone())
            .build();

        for model in [robots_model(), robots_parts_model(), parts_model()] {
            manager.register(model);
        }

        Self {
            di,
            connection,
            metadata,
            manager,
        }
    }

    pub fn record(&self, model: Arc<dyn Model>) -> Record {
        Record::new(model, Arc::clone(&self.di)).unwrap()
    }

    /// An unsaved robot.
    pub fn robot(&self, kind: &str, name: &str, year: i32) -> Record {
        let mut robot = self.record(robots_model());
        robot.write_attribute("type", kind);
        robot.write_attribute("name", name);
        robot.write_attribute("year", year);
        robot
    }

    /// A robot known to exist, as a finder would return it.
    pub fn stored_robot(&self, id: i32) -> Record {
        let data: Data = [
            ("id".to_string(), Value::Int(id)),
            ("type".to_string(), Value::from("mechanical")),
            ("name".to_string(), Value::from("Astro Boy")),
            ("year".to_string(), Value::Int(1952)),
        ]
        .into_iter()
        .collect();
        Record::hydrate(
            robots_model(),
            Arc::clone(&self.di),
            data,
            DirtyState::Persistent,
            false,
        )
        .unwrap()
    }

    /// Log every event seen by the global listeners.
    pub fn record_events(&self) -> Arc<Mutex<Vec<ModelEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        self.manager
            .attach_listener(Arc::new(move |event: ModelEvent, _record: &mut Record| {
                sink.lock().unwrap().push(event);
                EventOutcome::Continue
            }));
        events
    }
}

pub fn data(pairs: &[(&str, Value)]) -> Data {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
