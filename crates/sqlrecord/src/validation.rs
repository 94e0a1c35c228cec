//! Field validators for the `validation` event.
//!
//! ```ignore
//! fn on_event(&self, event: ModelEvent, record: &mut Record) -> EventOutcome {
//!     if event == ModelEvent::Validation {
//!         let ok = record.validate(&InclusionIn::new("type", ["droid", "mechanical", "virtual"]));
//!         return ok.into();
//!     }
//!     EventOutcome::Continue
//! }
//! ```

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::Regex;
use sqlrecord_core::{Message, MessageKind, Value};

use crate::record::Record;

/// Checks one aspect of a record.
pub trait Validator {
    /// `Err` carries the messages to append to the record.
    fn validate(&self, record: &Record) -> Result<(), Vec<Message>>;
}

fn failure(text: String, field: &str, kind: MessageKind) -> Vec<Message> {
    vec![Message::new(text).field(field).kind(kind)]
}

/// The field must hold a non-blank value.
#[derive(Debug, Clone)]
pub struct PresenceOf {
    field: String,
    message: Option<String>,
}

impl PresenceOf {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: None,
        }
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for PresenceOf {
    fn validate(&self, record: &Record) -> Result<(), Vec<Message>> {
        if record.read_attribute(&self.field).is_some_and(|v| !v.is_blank()) {
            return Ok(());
        }
        let text = self
            .message
            .clone()
            .unwrap_or_else(|| format!("{} is required", self.field));
        Err(failure(text, &self.field, MessageKind::PresenceOf))
    }
}

/// The field must equal one of a fixed set of values.
#[derive(Debug, Clone)]
pub struct InclusionIn {
    field: String,
    domain: Vec<Value>,
    message: Option<String>,
}

impl InclusionIn {
    pub fn new<I, V>(field: impl Into<String>, domain: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            field: field.into(),
            domain: domain.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for InclusionIn {
    fn validate(&self, record: &Record) -> Result<(), Vec<Message>> {
        let value = record.read_attribute(&self.field).unwrap_or(&Value::Null);
        if self.domain.iter().any(|allowed| allowed.loosely_equals(value)) {
            return Ok(());
        }
        let text = self.message.clone().unwrap_or_else(|| {
            let domain: Vec<String> = self
                .domain
                .iter()
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => format!("{v:?}"),
                })
                .collect();
            format!(
                "Value of field '{}' must be part of list: {}",
                self.field,
                domain.join(", ")
            )
        });
        Err(failure(text, &self.field, MessageKind::InclusionIn))
    }
}

/// The field's text must match a pattern.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    field: String,
    pattern: String,
    message: Option<String>,
}

impl RegexValidator {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
            message: None,
        }
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for RegexValidator {
    fn validate(&self, record: &Record) -> Result<(), Vec<Message>> {
        let matched = record
            .read_attribute(&self.field)
            .and_then(Value::as_str)
            .is_some_and(|text| matches_pattern(text, &self.pattern));
        if matched {
            return Ok(());
        }
        let text = self.message.clone().unwrap_or_else(|| {
            format!("Value of field '{}' doesn't match regular expression", self.field)
        });
        Err(failure(text, &self.field, MessageKind::Regex))
    }
}

/// Compiled patterns, shared for the life of the process.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        if let Some(regex) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
        {
            return Ok(regex.clone());
        }

        let regex = Regex::new(pattern)?;
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(|| RegexCache {
        cache: RwLock::new(HashMap::new()),
    })
}

/// Whether `value` matches `pattern`. An invalid pattern never matches.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}
