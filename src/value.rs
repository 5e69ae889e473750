//! Scalar values carried by typed instances.
//!
//! Structured data (objects, collections) is modelled by
//! [`TypedInstance`](crate::instance::TypedInstance); this enum only covers the
//! leaf values.

use serde::{Deserialize, Serialize};

/// A scalar value wrapped by `TypedInstance::Value`.
///
/// # Examples
///
/// ```
/// use weftql::ScalarValue;
///
/// let int_val = ScalarValue::Int(42);
/// let string_val = ScalarValue::from("SHIPPED");
///
/// assert_eq!(int_val.as_int(), Some(42));
/// assert_eq!(string_val.as_string(), Some("SHIPPED"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScalarValue {
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int(i64),
    /// A decimal, stored as `f64`.
    Float(f64),
    /// A string.
    String(String),
}

impl ScalarValue {
    /// True for booleans.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// True for integers.
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// True for decimals.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// True for strings.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// The boolean, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The decimal; integers widen.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// True for the empty string.
    #[must_use]
    pub fn is_empty_string(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Converts back into a plain JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_int() {
        let val = ScalarValue::Int(42);
        assert!(val.is_int());
        assert_eq!(val.as_int(), Some(42));
        assert_eq!(val.as_float(), Some(42.0)); // Int can be read as float
        assert_eq!(val.type_name(), "int");
    }

    #[test]
    fn test_value_string() {
        let val = ScalarValue::from("hello");
        assert!(val.is_string());
        assert_eq!(val.as_string(), Some("hello"));
        assert!(!val.is_empty_string());
        assert!(ScalarValue::from("").is_empty_string());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", ScalarValue::Bool(true)), "true");
        assert_eq!(format!("{}", ScalarValue::Int(42)), "42");
        assert_eq!(format!("{}", ScalarValue::from("hi")), "\"hi\"");
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(ScalarValue::Int(7).to_json(), serde_json::json!(7));
        assert_eq!(ScalarValue::from("x").to_json(), serde_json::json!("x"));
        assert_eq!(ScalarValue::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_value_type_mismatch() {
        let val = ScalarValue::Bool(true);
        assert!(val.as_int().is_none());
        assert!(val.as_float().is_none());
        assert!(val.as_string().is_none());
    }
}
