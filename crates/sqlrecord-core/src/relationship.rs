//! Relation descriptors.
//!
//! Relations are registered at runtime (usually from a model's `initialize`
//! hook) and kept by the models manager. They drive lazy loading, the
//! save-time cascade of related records and the virtual foreign-key checks.

use crate::value::Value;

/// The type of relation between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Many-to-one: `RobotsParts` belongs to one `Robots`.
    BelongsTo,
    /// One-to-one: `Robots` has one `RobotsDetails`.
    HasOne,
    /// One-to-many: `Robots` has many `RobotsParts`.
    HasMany,
    /// Many-to-many: `Robots` has many `Parts` through `RobotsParts`.
    HasManyThrough,
}

/// One or several columns taking part in a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields {
    Single(String),
    Composite(Vec<String>),
}

impl Fields {
    /// The column when the relation is not composite.
    pub fn single(&self) -> Option<&str> {
        match self {
            Self::Single(field) => Some(field),
            Self::Composite(_) => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    /// All columns, in order.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(field) => vec![field.clone()],
            Self::Composite(fields) => fields.clone(),
        }
    }
}

impl From<&str> for Fields {
    fn from(field: &str) -> Self {
        Self::Single(field.to_string())
    }
}

impl From<String> for Fields {
    fn from(field: String) -> Self {
        Self::Single(field)
    }
}

impl From<Vec<&str>> for Fields {
    fn from(fields: Vec<&str>) -> Self {
        Self::Composite(fields.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(fields: [&str; N]) -> Self {
        Self::Composite(fields.iter().map(|f| (*f).to_string()).collect())
    }
}

/// Virtual foreign-key settings of a relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyOptions {
    /// Replaces the default violation message.
    pub message: Option<String>,
    /// Extra SQL ANDed into the existence check.
    pub conditions: Option<String>,
}

impl ForeignKeyOptions {
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }
}

/// Options given when a relation is registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationOptions {
    /// Name the relation is reached by; the lower-cased referenced model by default.
    pub alias: Option<String>,
    /// Enables the virtual foreign-key check for this relation.
    pub foreign_key: Option<ForeignKeyOptions>,
    /// Default query arguments used when loading related records.
    pub params: Option<RelationQuery>,
}

impl RelationOptions {
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn foreign_key(mut self, options: ForeignKeyOptions) -> Self {
        self.foreign_key = Some(options);
        self
    }

    #[must_use]
    pub fn params(mut self, params: RelationQuery) -> Self {
        self.params = Some(params);
        self
    }
}

/// The link model of a has-many-through relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intermediate {
    pub model: String,
    /// Columns on the link model matching the owner's `fields`.
    pub fields: Fields,
    /// Columns on the link model matching the target's `referenced_fields`.
    pub referenced_fields: Fields,
}

/// Extra arguments when loading related records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationQuery {
    /// Extra SQL ANDed into the relation condition.
    pub conditions: Option<String>,
    /// Values for `?` placeholders in `conditions`.
    pub bind: Vec<Value>,
    pub order: Option<String>,
    pub limit: Option<u64>,
}

impl RelationQuery {
    #[must_use]
    pub fn conditions(mut self, conditions: impl Into<String>, bind: Vec<Value>) -> Self {
        self.conditions = Some(conditions.into());
        self.bind = bind;
        self
    }

    #[must_use]
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A registered relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub kind: RelationKind,
    /// Owning model.
    pub model: String,
    /// Columns on the owning model.
    pub fields: Fields,
    pub referenced_model: String,
    /// Columns on the referenced model.
    pub referenced_fields: Fields,
    pub intermediate: Option<Intermediate>,
    pub options: RelationOptions,
}

impl Relation {
    pub fn new(
        kind: RelationKind,
        model: impl Into<String>,
        fields: impl Into<Fields>,
        referenced_model: impl Into<String>,
        referenced_fields: impl Into<Fields>,
    ) -> Self {
        Self {
            kind,
            model: model.into(),
            fields: fields.into(),
            referenced_model: referenced_model.into(),
            referenced_fields: referenced_fields.into(),
            intermediate: None,
            options: RelationOptions::default(),
        }
    }

    #[must_use]
    pub fn options(mut self, options: RelationOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn through(mut self, intermediate: Intermediate) -> Self {
        self.intermediate = Some(intermediate);
        self
    }

    /// Lower-cased alias the relation is keyed by.
    pub fn alias(&self) -> String {
        self.options
            .alias
            .as_deref()
            .unwrap_or(&self.referenced_model)
            .to_lowercase()
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyOptions> {
        self.options.foreign_key.as_ref()
    }

    /// Whether loading yields at most one record.
    pub fn is_single(&self) -> bool {
        matches!(self.kind, RelationKind::BelongsTo | RelationKind::HasOne)
    }
}
