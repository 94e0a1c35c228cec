//! Service container.
//!
//! Records obtain their manager, metadata service, connections and ORM
//! configuration from a [`Di`]. One container is usually built at startup
//! and also installed as the process default, which is where
//! [`Record::unserialize`](crate::Record::unserialize) re-binds from.
//!
//! ```ignore
//! let di = Di::builder()
//!     .manager(Arc::new(ModelsManager::new()))
//!     .metadata(Arc::new(metadata))
//!     .connection("db", Arc::new(connection))
//!     .config(OrmConfig::default().not_null_validations(false))
//!     .build();
//! Di::set_default(Arc::clone(&di));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use sqlrecord_core::{Connection, Error, MetaData, OrmConfig, Result};

use crate::manager::Manager;

/// Name of the connection service used when a model does not pick one.
pub const DEFAULT_CONNECTION_SERVICE: &str = "db";

/// Holds the services entity records depend on.
pub struct Di {
    config: OrmConfig,
    manager: Option<Arc<dyn Manager>>,
    metadata: Option<Arc<dyn MetaData>>,
    connections: HashMap<String, Arc<dyn Connection>>,
}

impl fmt::Debug for Di {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut connections: Vec<&String> = self.connections.keys().collect();
        connections.sort();
        f.debug_struct("Di")
            .field("config", &self.config)
            .field("manager", &self.manager.is_some())
            .field("metadata", &self.metadata.is_some())
            .field("connections", &connections)
            .finish()
    }
}

fn default_slot() -> &'static RwLock<Option<Arc<Di>>> {
    static DEFAULT: OnceLock<RwLock<Option<Arc<Di>>>> = OnceLock::new();
    DEFAULT.get_or_init(|| RwLock::new(None))
}

impl Di {
    pub fn builder() -> DiBuilder {
        DiBuilder::default()
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// The models manager.
    pub fn manager(&self) -> Result<Arc<dyn Manager>> {
        self.manager.clone().ok_or_else(|| {
            Error::Configuration(
                "the services related to the ORM require a 'modelsManager' service".to_string(),
            )
        })
    }

    /// The metadata service.
    pub fn metadata(&self) -> Result<Arc<dyn MetaData>> {
        self.metadata.clone().ok_or_else(|| {
            Error::Configuration(
                "the services related to the ORM require a 'modelsMetadata' service".to_string(),
            )
        })
    }

    /// A connection service by name.
    pub fn connection(&self, name: &str) -> Result<Arc<dyn Connection>> {
        self.connections.get(name).cloned().ok_or_else(|| {
            Error::Configuration(format!("connection service \"{name}\" is not registered"))
        })
    }

    /// Install `di` as the process default container.
    pub fn set_default(di: Arc<Di>) {
        *default_slot().write().unwrap_or_else(PoisonError::into_inner) = Some(di);
    }

    /// The process default container, if one was installed.
    pub fn get_default() -> Option<Arc<Di>> {
        default_slot()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Builder for [`Di`].
#[derive(Default)]
pub struct DiBuilder {
    config: OrmConfig,
    manager: Option<Arc<dyn Manager>>,
    metadata: Option<Arc<dyn MetaData>>,
    connections: HashMap<String, Arc<dyn Connection>>,
}

impl DiBuilder {
    #[must_use]
    pub fn config(mut self, config: OrmConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn manager(mut self, manager: Arc<dyn Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Arc<dyn MetaData>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn connection(mut self, name: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        self.connections.insert(name.into(), connection);
        self
    }

    pub fn build(self) -> Arc<Di> {
        Arc::new(Di {
            config: self.config,
            manager: self.manager,
            metadata: self.metadata,
            connections: self.connections,
        })
    }
}
