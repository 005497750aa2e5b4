//! Runtime values and data-type tags
//!
//! Sockets carry a tag from a closed, extensible type set. Values are a
//! single enum so procedures can move them through a flat namespace. The
//! serialize/deserialize round trip over serde_json replaces the original
//! textual `eval(repr(value))` contract: any value used as a vectorization
//! default must reconstruct exactly from its representation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base data-type tag of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Float,
    Integer,
    Boolean,
    Vector,
    Color,
    Text,
    /// Opaque host handle (scene object, material, ...). Not copyable,
    /// not representable.
    Object,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float => "Float",
            DataType::Integer => "Integer",
            DataType::Boolean => "Boolean",
            DataType::Vector => "Vector",
            DataType::Color => "Color",
            DataType::Text => "Text",
            DataType::Object => "Object",
        };
        write!(f, "{name}")
    }
}

/// Full socket type: a base value or a list of base values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    Base(DataType),
    List(DataType),
}

impl SocketType {
    /// The base data type (element type for lists)
    pub fn base(&self) -> DataType {
        match self {
            SocketType::Base(dt) | SocketType::List(dt) => *dt,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, SocketType::List(_))
    }

    /// The list type pairing with this base type
    pub fn list_of(dt: DataType) -> Self {
        SocketType::List(dt)
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketType::Base(dt) => write!(f, "{dt}"),
            SocketType::List(dt) => write!(f, "{dt} List"),
        }
    }
}

/// Error from the value representation round trip
#[derive(Debug, Clone, Error)]
pub enum ReprError {
    #[error("this type has no value representation: {0}")]
    NotRepresentable(DataType),
    #[error("invalid value representation: {0}")]
    Invalid(String),
}

/// A runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Vector([f64; 3]),
    Color([f64; 4]),
    Text(String),
    Object(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view with integer promotion
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness used by generated conditions. Only scalar-ish values
    /// have one; anything else is a type error at the call site.
    pub fn as_condition(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Integer(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    /// Short tag name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Float(_) => "Float",
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::Vector(_) => "Vector",
            Value::Color(_) => "Color",
            Value::Text(_) => "Text",
            Value::Object(_) => "Object",
            Value::List(_) => "List",
        }
    }

    /// Whether a source-independent copy can be produced
    pub fn is_copyable(&self) -> bool {
        match self {
            Value::Object(_) => false,
            Value::List(items) => items.iter().all(Value::is_copyable),
            _ => true,
        }
    }

    /// Produce a value independent of the source. Deep for lists.
    /// Callers must check [`Value::is_copyable`] first; object handles
    /// come back as the same reference.
    pub fn copied(&self) -> Value {
        self.clone()
    }

    /// Whether the representation round trip is supported
    pub fn supports_repr(&self) -> bool {
        match self {
            Value::Object(_) => false,
            Value::List(items) => items.iter().all(Value::supports_repr),
            _ => true,
        }
    }

    /// Serialize into the canonical textual representation
    pub fn to_repr(&self) -> Result<String, ReprError> {
        if !self.supports_repr() {
            return Err(ReprError::NotRepresentable(DataType::Object));
        }
        serde_json::to_string(self).map_err(|e| ReprError::Invalid(e.to_string()))
    }

    /// Reconstruct a value from its textual representation
    pub fn from_repr(repr: &str) -> Result<Value, ReprError> {
        serde_json::from_str(repr).map_err(|e| ReprError::Invalid(e.to_string()))
    }

    /// Check the strict round-trip contract: reconstructing the value
    /// from its representation must equal the original.
    pub fn round_trips(&self) -> bool {
        match self.to_repr() {
            Ok(repr) => Value::from_repr(&repr).map(|v| v == *self).unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Vector([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Value::Color([r, g, b, a]) => write!(f, "({r}, {g}, {b}, {a})"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Object(v) => write!(f, "<object {v}>"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
