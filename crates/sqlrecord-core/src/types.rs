//! Column data types and bind-type codes.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Declared data type of a column, as reported by the metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    BigInteger,
    Decimal,
    Float,
    Double,
    Boolean,
    Char,
    Varchar,
    Text,
    Date,
    DateTime,
    Blob,
    Json,
}

impl DataType {
    /// Whether values of this type must be numeric.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Integer | Self::BigInteger | Self::Decimal | Self::Float | Self::Double
        )
    }
}

/// How a parameter is bound when handed to the connection.
///
/// The numeric codes are the ones drivers switch on; [`BindType::Skip`] marks
/// an attribute that was never set so the driver can bind it as an untyped
/// NULL (or let the column default apply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindType {
    Null,
    Int,
    Str,
    Blob,
    Bool,
    Decimal,
    Skip,
}

impl BindType {
    /// Wire code of the bind type.
    pub const fn code(self) -> u16 {
        match self {
            Self::Null => 0,
            Self::Int => 1,
            Self::Str => 2,
            Self::Blob => 3,
            Self::Bool => 5,
            Self::Decimal => 32,
            Self::Skip => 1024,
        }
    }

    /// Inverse of [`BindType::code`].
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Null),
            1 => Some(Self::Int),
            2 => Some(Self::Str),
            3 => Some(Self::Blob),
            5 => Some(Self::Bool),
            32 => Some(Self::Decimal),
            1024 => Some(Self::Skip),
            _ => None,
        }
    }

    /// Default bind type for a declared data type.
    pub const fn for_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Integer | DataType::BigInteger => Self::Int,
            DataType::Decimal | DataType::Float | DataType::Double => Self::Decimal,
            DataType::Boolean => Self::Bool,
            DataType::Blob => Self::Blob,
            DataType::Char
            | DataType::Varchar
            | DataType::Text
            | DataType::Date
            | DataType::DateTime
            | DataType::Json => Self::Str,
        }
    }

    /// Bind type inferred from a value with no declared column behind it.
    pub const fn for_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => Self::Int,
            Value::Float(_) | Value::Double(_) | Value::Decimal(_) => Self::Decimal,
            Value::Bytes(_) => Self::Blob,
            Value::Text(_) | Value::Json(_) | Value::Array(_) => Self::Str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_code_is_1024() {
        assert_eq!(BindType::Skip.code(), 1024);
        assert_eq!(BindType::from_code(1024), Some(BindType::Skip));
        assert_eq!(BindType::from_code(4), None);
    }

    #[test]
    fn test_bind_type_for_data_type() {
        assert_eq!(BindType::for_data_type(DataType::Integer), BindType::Int);
        assert_eq!(BindType::for_data_type(DataType::Double), BindType::Decimal);
        assert_eq!(BindType::for_data_type(DataType::Varchar), BindType::Str);
        assert_eq!(BindType::for_data_type(DataType::Boolean), BindType::Bool);
    }

    #[test]
    fn test_bind_type_for_value() {
        assert_eq!(BindType::for_value(&Value::BigInt(1)), BindType::Int);
        assert_eq!(BindType::for_value(&Value::from("x")), BindType::Str);
        assert_eq!(BindType::for_value(&Value::Null), BindType::Null);
    }

    #[test]
    fn test_numeric_types() {
        assert!(DataType::Integer.is_numeric());
        assert!(DataType::Decimal.is_numeric());
        assert!(!DataType::Varchar.is_numeric());
        assert!(!DataType::Boolean.is_numeric());
    }
}
