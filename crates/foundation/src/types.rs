//! Socket type registry
//!
//! Maps each data type to its default value, copyability, and value
//! correction. This is an explicit registry object: hosts extending the
//! socket-type set rebuild it through [`SocketTypeRegistry::insert`]
//! rather than mutating ambient module state.

use indexmap::IndexMap;

use crate::value::{DataType, SocketType, Value};

/// Outcome of pushing a value through a socket type's correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionKind {
    /// The value already had the expected type
    Unchanged,
    /// The value was coerced into the expected type
    Coerced,
    /// The value could not be coerced and was replaced with the default
    ReplacedWithDefault,
}

/// Correction function: coerce a value towards the type, given the
/// type's default as a fallback.
pub type Corrector = fn(Value, &Value) -> (Value, CorrectionKind);

/// Per-type registry entry
#[derive(Clone)]
pub struct TypeInfo {
    /// Default value for base sockets of this type
    pub default: Value,
    /// Whether values of this type support source-independent copies
    pub copyable: bool,
    pub corrector: Corrector,
}

/// Registry of socket data types
#[derive(Clone)]
pub struct SocketTypeRegistry {
    entries: IndexMap<DataType, TypeInfo>,
}

impl SocketTypeRegistry {
    /// Registry with the built-in type set
    pub fn builtin() -> Self {
        let mut registry = Self {
            entries: IndexMap::new(),
        };
        registry.insert(
            DataType::Float,
            TypeInfo {
                default: Value::Float(0.0),
                copyable: true,
                corrector: correct_float,
            },
        );
        registry.insert(
            DataType::Integer,
            TypeInfo {
                default: Value::Integer(0),
                copyable: true,
                corrector: correct_integer,
            },
        );
        registry.insert(
            DataType::Boolean,
            TypeInfo {
                default: Value::Boolean(false),
                copyable: true,
                corrector: correct_boolean,
            },
        );
        registry.insert(
            DataType::Vector,
            TypeInfo {
                default: Value::Vector([0.0; 3]),
                copyable: true,
                corrector: correct_exact,
            },
        );
        registry.insert(
            DataType::Color,
            TypeInfo {
                default: Value::Color([0.0, 0.0, 0.0, 1.0]),
                copyable: true,
                corrector: correct_exact,
            },
        );
        registry.insert(
            DataType::Text,
            TypeInfo {
                default: Value::Text(String::new()),
                copyable: true,
                corrector: correct_exact,
            },
        );
        registry.insert(
            DataType::Object,
            TypeInfo {
                default: Value::Object(String::new()),
                copyable: false,
                corrector: correct_exact,
            },
        );
        registry
    }

    /// Add or replace a type entry. This is the rebuild entry point for
    /// hosts whose socket-type set changes.
    pub fn insert(&mut self, data_type: DataType, info: TypeInfo) {
        self.entries.insert(data_type, info);
    }

    pub fn info(&self, data_type: DataType) -> Option<&TypeInfo> {
        self.entries.get(&data_type)
    }

    /// Default value for a socket type. Lists default to empty.
    pub fn default_value(&self, ty: &SocketType) -> Value {
        match ty {
            SocketType::Base(dt) => self
                .info(*dt)
                .map(|info| info.default.clone())
                .unwrap_or(Value::Float(0.0)),
            SocketType::List(_) => Value::List(Vec::new()),
        }
    }

    /// Whether a socket type supports source-independent copies
    pub fn copyable(&self, ty: &SocketType) -> bool {
        self.info(ty.base()).map(|info| info.copyable).unwrap_or(false)
    }

    /// Correct a value towards a socket type, reporting whether
    /// coercion changed it. List sockets correct element-wise.
    pub fn correct(&self, ty: &SocketType, value: Value) -> (Value, CorrectionKind) {
        match ty {
            SocketType::Base(dt) => match self.info(*dt) {
                Some(info) => (info.corrector)(value, &info.default),
                None => (value, CorrectionKind::Unchanged),
            },
            SocketType::List(dt) => match value {
                Value::List(items) => {
                    let mut corrected = Vec::with_capacity(items.len());
                    let mut kind = CorrectionKind::Unchanged;
                    for item in items {
                        let (item, item_kind) = self.correct(&SocketType::Base(*dt), item);
                        if item_kind != CorrectionKind::Unchanged {
                            kind = CorrectionKind::Coerced;
                        }
                        corrected.push(item);
                    }
                    (Value::List(corrected), kind)
                }
                _ => (Value::List(Vec::new()), CorrectionKind::ReplacedWithDefault),
            },
        }
    }
}

fn correct_exact(value: Value, default: &Value) -> (Value, CorrectionKind) {
    if value.type_name() == default.type_name() {
        (value, CorrectionKind::Unchanged)
    } else {
        (default.clone(), CorrectionKind::ReplacedWithDefault)
    }
}

fn correct_float(value: Value, default: &Value) -> (Value, CorrectionKind) {
    match value {
        Value::Float(_) => (value, CorrectionKind::Unchanged),
        Value::Integer(v) => (Value::Float(v as f64), CorrectionKind::Coerced),
        Value::Boolean(v) => (Value::Float(if v { 1.0 } else { 0.0 }), CorrectionKind::Coerced),
        _ => (default.clone(), CorrectionKind::ReplacedWithDefault),
    }
}

fn correct_integer(value: Value, default: &Value) -> (Value, CorrectionKind) {
    match value {
        Value::Integer(_) => (value, CorrectionKind::Unchanged),
        Value::Float(v) => (Value::Integer(v as i64), CorrectionKind::Coerced),
        Value::Boolean(v) => (Value::Integer(v as i64), CorrectionKind::Coerced),
        _ => (default.clone(), CorrectionKind::ReplacedWithDefault),
    }
}

fn correct_boolean(value: Value, default: &Value) -> (Value, CorrectionKind) {
    match value {
        Value::Boolean(_) => (value, CorrectionKind::Unchanged),
        Value::Integer(v) => (Value::Boolean(v != 0), CorrectionKind::Coerced),
        _ => (default.clone(), CorrectionKind::ReplacedWithDefault),
    }
}
