//! Dynamic SQL values carried by entity records.
//!
//! A record's attribute bag maps attribute names to [`Value`]s. The variants
//! mirror what drivers hand back from a row; the helper predicates encode the
//! "empty" and "numeric" notions the persistence pipeline relies on.

use serde::{Deserialize, Serialize};

/// A dynamically-typed SQL value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 8-bit signed integer.
    TinyInt(i8),
    /// 16-bit signed integer.
    SmallInt(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Arbitrary-precision decimal kept as its textual form.
    Decimal(String),
    /// Text value.
    Text(String),
    /// Binary value.
    Bytes(Vec<u8>),
    /// JSON document.
    Json(serde_json::Value),
    /// Array of values.
    Array(Vec<Value>),
}

impl Value {
    /// Returns `true` for SQL NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The "empty" predicate used for key, identity and not-null checks.
    ///
    /// NULL, `false`, any zero number, the strings `""` and `"0"`, and
    /// zero-length binary/array payloads are blank.
    #[allow(clippy::float_cmp)]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::TinyInt(v) => *v == 0,
            Self::SmallInt(v) => *v == 0,
            Self::Int(v) => *v == 0,
            Self::BigInt(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
            Self::Double(v) => *v == 0.0,
            Self::Text(s) | Self::Decimal(s) => s.is_empty() || s == "0",
            Self::Bytes(b) => b.is_empty(),
            Self::Array(a) => a.is_empty(),
            Self::Json(j) => match j {
                serde_json::Value::Null => true,
                serde_json::Value::Bool(b) => !b,
                serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
                serde_json::Value::String(s) => s.is_empty() || s == "0",
                serde_json::Value::Array(a) => a.is_empty(),
                serde_json::Value::Object(o) => o.is_empty(),
            },
        }
    }

    /// Whether the value is a number or a string holding one.
    pub fn is_numeric(&self) -> bool {
        match self {
            Self::TinyInt(_)
            | Self::SmallInt(_)
            | Self::Int(_)
            | Self::BigInt(_)
            | Self::Float(_)
            | Self::Double(_) => true,
            Self::Decimal(s) | Self::Text(s) => {
                let s = s.trim();
                !s.is_empty() && s.parse::<f64>().is_ok()
            }
            _ => false,
        }
    }

    /// Integer view of the value, when it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::TinyInt(v) => Some(i64::from(*v)),
            Self::SmallInt(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::BigInt(v) => Some(*v),
            Self::Decimal(s) | Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating-point view of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::Decimal(s) | Self::Text(s) => s.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Borrow the textual payload of `Text`/`Decimal` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Equality used for change detection.
    ///
    /// Numeric values compare by magnitude regardless of variant, so an
    /// `Int(5)` read back as `BigInt(5)` is not reported as a change.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        if self == other {
            return true;
        }
        if self.is_numeric() && other.is_numeric() {
            if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                return (a - b).abs() < f64::EPSILON;
            }
        }
        false
    }

    /// Short name of the variant, for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::TinyInt(_) => "TINYINT",
            Self::SmallInt(_) => "SMALLINT",
            Self::Int(_) => "INTEGER",
            Self::BigInt(_) => "BIGINT",
            Self::Float(_) => "REAL",
            Self::Double(_) => "DOUBLE",
            Self::Decimal(_) => "DECIMAL",
            Self::Text(_) => "TEXT",
            Self::Bytes(_) => "BLOB",
            Self::Json(_) => "JSON",
            Self::Array(_) => "ARRAY",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
