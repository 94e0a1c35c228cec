//! Validation and constraint messages collected on a record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A required attribute is null or empty.
    PresenceOf,
    /// A virtual foreign key is violated.
    ConstraintViolation,
    /// `create` was called on a record that already exists.
    InvalidCreateAttempt,
    /// `update` was called on a record that does not exist.
    InvalidUpdateAttempt,
    /// Value outside an allowed set.
    InclusionIn,
    /// Value does not match a pattern.
    Regex,
    /// Application-defined category.
    Custom(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PresenceOf => "PresenceOf",
            Self::ConstraintViolation => "ConstraintViolation",
            Self::InvalidCreateAttempt => "InvalidCreateAttempt",
            Self::InvalidUpdateAttempt => "InvalidUpdateAttempt",
            Self::InclusionIn => "InclusionIn",
            Self::Regex => "Regex",
            Self::Custom(kind) => kind,
        }
    }
}

/// A recoverable failure reported by save, create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    fields: Vec<String>,
    kind: MessageKind,
    model: Option<String>,
}

impl Message {
    /// New message of kind `Custom("Message")` with no fields.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: Vec::new(),
            kind: MessageKind::Custom("Message".to_string()),
            model: None,
        }
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields = vec![field.into()];
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Tag the message with the model that produced it.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// First field the message refers to, if any.
    pub fn first_field(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }

    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn message_kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = Message::new("name is required")
            .field("name")
            .kind(MessageKind::PresenceOf)
            .model("Robots");
        assert_eq!(msg.text(), "name is required");
        assert_eq!(msg.first_field(), Some("name"));
        assert_eq!(msg.message_kind(), &MessageKind::PresenceOf);
        assert_eq!(msg.model_name(), Some("Robots"));
        assert_eq!(msg.to_string(), "name is required");
    }

    #[test]
    fn test_composite_fields() {
        let msg = Message::new("x").fields(["a", "b"]);
        assert_eq!(msg.field_names(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(MessageKind::ConstraintViolation.as_str(), "ConstraintViolation");
        assert_eq!(MessageKind::Custom("Unique".into()).as_str(), "Unique");
    }
}
