//! ORM-wide switches.
//!
//! The configuration is built once when the service container is assembled
//! and is read-only afterwards; every record consults the copy held by its
//! container.
//!
//! ```ignore
//! let config = OrmConfig::from_json(r#"{"events": false, "notNullValidations": true}"#)?;
//! assert!(!config.events);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration read by every entity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrmConfig {
    /// Fire lifecycle events (hooks, behaviors, listeners, validation).
    pub events: bool,
    /// Check belongs-to targets on save and dependents on delete.
    pub virtual_foreign_keys: bool,
    /// Apply model column maps.
    pub column_renaming: bool,
    /// Reject null/empty values in not-null columns before writing.
    pub not_null_validations: bool,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            events: true,
            virtual_foreign_keys: true,
            column_renaming: true,
            not_null_validations: true,
        }
    }
}

/// Partial overlay applied with [`OrmConfig::setup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupOptions {
    pub events: Option<bool>,
    pub virtual_foreign_keys: Option<bool>,
    pub column_renaming: Option<bool>,
    pub not_null_validations: Option<bool>,
}

impl OrmConfig {
    /// Return a copy with the given options applied.
    #[must_use]
    pub fn setup(self, options: &SetupOptions) -> Self {
        Self {
            events: options.events.unwrap_or(self.events),
            virtual_foreign_keys: options
                .virtual_foreign_keys
                .unwrap_or(self.virtual_foreign_keys),
            column_renaming: options.column_renaming.unwrap_or(self.column_renaming),
            not_null_validations: options
                .not_null_validations
                .unwrap_or(self.not_null_validations),
        }
    }

    /// Parse setup options from JSON and apply them over the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: SetupOptions = serde_json::from_str(json)?;
        Ok(Self::default().setup(&options))
    }

    #[must_use]
    pub const fn events(mut self, enabled: bool) -> Self {
        self.events = enabled;
        self
    }

    #[must_use]
    pub const fn virtual_foreign_keys(mut self, enabled: bool) -> Self {
        self.virtual_foreign_keys = enabled;
        self
    }

    #[must_use]
    pub const fn column_renaming(mut self, enabled: bool) -> Self {
        self.column_renaming = enabled;
        self
    }

    #[must_use]
    pub const fn not_null_validations(mut self, enabled: bool) -> Self {
        self.not_null_validations = enabled;
        self
    }
}
