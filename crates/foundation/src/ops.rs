//! Operation registry
//!
//! Named operations callable from generated procedures and script code.
//! The registry is an explicit immutable object: [`OpRegistry::builtin`]
//! builds the standard set and [`OpRegistry::register`] is the update
//! entry point for hosts contributing more operations. Names are
//! namespaced (`math.add`, `vector.combine`, ...).

use indexmap::IndexMap;
use thiserror::Error;

use crate::value::Value;

/// Signature for operation implementations
pub type OpFn = fn(&[Value]) -> Result<Value, OpError>;

/// Arity specification for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Arity {
    fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => *n == count,
            Arity::Variadic => true,
        }
    }
}

/// Errors raised while dispatching or evaluating an operation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OpError {
    #[error("unknown operation: {0}")]
    Unknown(String),

    #[error("{op} expects {expected} arguments, got {got}")]
    WrongArity {
        op: String,
        expected: usize,
        got: usize,
    },

    #[error("{op}: expected {expected}, got {got}")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{op}: division by zero")]
    DivisionByZero { op: String },
}

/// Descriptor for a registered operation
#[derive(Clone)]
pub struct OpDescriptor {
    /// Namespaced name (e.g. "math.add")
    pub name: String,
    /// Signature string for diagnostics (e.g. "add(a, b) -> Float")
    pub signature: String,
    pub doc: String,
    pub arity: Arity,
    pub implementation: OpFn,
}

/// Registry of named operations
#[derive(Clone, Default)]
pub struct OpRegistry {
    ops: IndexMap<String, OpDescriptor>,
}

impl OpRegistry {
    /// Registry with the built-in operation set
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for descriptor in builtin_descriptors() {
            registry.register(descriptor);
        }
        registry
    }

    /// Add or replace an operation. Update entry point for hosts.
    pub fn register(&mut self, descriptor: OpDescriptor) {
        self.ops.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&OpDescriptor> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// All operation names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    /// Whether a namespace (the part before the dot) has any operations
    pub fn namespace_exists(&self, namespace: &str) -> bool {
        let prefix = format!("{namespace}.");
        self.ops.keys().any(|name| name.starts_with(&prefix))
    }

    /// Dispatch an operation by name
    pub fn eval(&self, name: &str, args: &[Value]) -> Result<Value, OpError> {
        let descriptor = self
            .ops
            .get(name)
            .ok_or_else(|| OpError::Unknown(name.to_string()))?;
        if !descriptor.arity.accepts(args.len()) {
            let expected = match descriptor.arity {
                Arity::Fixed(n) => n,
                Arity::Variadic => args.len(),
            };
            return Err(OpError::WrongArity {
                op: name.to_string(),
                expected,
                got: args.len(),
            });
        }
        (descriptor.implementation)(args)
    }
}

fn number(op: &str, value: &Value) -> Result<f64, OpError> {
    value.as_number().ok_or_else(|| OpError::TypeMismatch {
        op: op.to_string(),
        expected: "number",
        got: value.type_name(),
    })
}

fn vector(op: &str, value: &Value) -> Result<[f64; 3], OpError> {
    value.as_vector().ok_or_else(|| OpError::TypeMismatch {
        op: op.to_string(),
        expected: "Vector",
        got: value.type_name(),
    })
}

fn text<'a>(op: &str, value: &'a Value) -> Result<&'a str, OpError> {
    value.as_text().ok_or_else(|| OpError::TypeMismatch {
        op: op.to_string(),
        expected: "Text",
        got: value.type_name(),
    })
}

fn descriptor(
    name: &str,
    signature: &str,
    doc: &str,
    arity: Arity,
    implementation: OpFn,
) -> OpDescriptor {
    OpDescriptor {
        name: name.to_string(),
        signature: signature.to_string(),
        doc: doc.to_string(),
        arity,
        implementation,
    }
}

fn builtin_descriptors() -> Vec<OpDescriptor> {
    vec![
        descriptor("math.add", "add(a, b) -> Float", "Sum of two numbers", Arity::Fixed(2), |args| {
            Ok(Value::Float(number("math.add", &args[0])? + number("math.add", &args[1])?))
        }),
        descriptor("math.subtract", "subtract(a, b) -> Float", "Difference of two numbers", Arity::Fixed(2), |args| {
            Ok(Value::Float(number("math.subtract", &args[0])? - number("math.subtract", &args[1])?))
        }),
        descriptor("math.multiply", "multiply(a, b) -> Float", "Product of two numbers", Arity::Fixed(2), |args| {
            Ok(Value::Float(number("math.multiply", &args[0])? * number("math.multiply", &args[1])?))
        }),
        descriptor("math.divide", "divide(a, b) -> Float", "Quotient of two numbers", Arity::Fixed(2), |args| {
            let denominator = number("math.divide", &args[1])?;
            if denominator == 0.0 {
                return Err(OpError::DivisionByZero { op: "math.divide".to_string() });
            }
            Ok(Value::Float(number("math.divide", &args[0])? / denominator))
        }),
        descriptor("math.power", "power(base, exponent) -> Float", "Base raised to exponent", Arity::Fixed(2), |args| {
            Ok(Value::Float(number("math.power", &args[0])?.powf(number("math.power", &args[1])?)))
        }),
        descriptor("math.abs", "abs(a) -> Float", "Absolute value", Arity::Fixed(1), |args| {
            Ok(Value::Float(number("math.abs", &args[0])?.abs()))
        }),
        descriptor("math.floor", "floor(a) -> Integer", "Largest integer not above a", Arity::Fixed(1), |args| {
            Ok(Value::Integer(number("math.floor", &args[0])?.floor() as i64))
        }),
        descriptor("math.sin", "sin(a) -> Float", "Sine (radians)", Arity::Fixed(1), |args| {
            Ok(Value::Float(number("math.sin", &args[0])?.sin()))
        }),
        descriptor("math.cos", "cos(a) -> Float", "Cosine (radians)", Arity::Fixed(1), |args| {
            Ok(Value::Float(number("math.cos", &args[0])?.cos()))
        }),
        descriptor("math.min", "min(values...) -> Float", "Smallest argument", Arity::Variadic, |args| {
            let mut smallest = f64::INFINITY;
            for arg in args {
                smallest = smallest.min(number("math.min", arg)?);
            }
            Ok(Value::Float(smallest))
        }),
        descriptor("math.max", "max(values...) -> Float", "Largest argument", Arity::Variadic, |args| {
            let mut largest = f64::NEG_INFINITY;
            for arg in args {
                largest = largest.max(number("math.max", arg)?);
            }
            Ok(Value::Float(largest))
        }),
        descriptor("vector.combine", "combine(x, y, z) -> Vector", "Vector from components", Arity::Fixed(3), |args| {
            Ok(Value::Vector([
                number("vector.combine", &args[0])?,
                number("vector.combine", &args[1])?,
                number("vector.combine", &args[2])?,
            ]))
        }),
        descriptor("vector.scale", "scale(v, factor) -> Vector", "Scaled vector", Arity::Fixed(2), |args| {
            let v = vector("vector.scale", &args[0])?;
            let factor = number("vector.scale", &args[1])?;
            Ok(Value::Vector([v[0] * factor, v[1] * factor, v[2] * factor]))
        }),
        descriptor("vector.length", "length(v) -> Float", "Euclidean length", Arity::Fixed(1), |args| {
            let v = vector("vector.length", &args[0])?;
            Ok(Value::Float((v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()))
        }),
        descriptor("vector.dot", "dot(a, b) -> Float", "Dot product", Arity::Fixed(2), |args| {
            let a = vector("vector.dot", &args[0])?;
            let b = vector("vector.dot", &args[1])?;
            Ok(Value::Float(a[0] * b[0] + a[1] * b[1] + a[2] * b[2]))
        }),
        descriptor("text.join", "join(parts...) -> Text", "Concatenated text", Arity::Variadic, |args| {
            let mut joined = String::new();
            for arg in args {
                joined.push_str(text("text.join", arg)?);
            }
            Ok(Value::Text(joined))
        }),
        descriptor("text.length", "length(t) -> Integer", "Character count", Arity::Fixed(1), |args| {
            Ok(Value::Integer(text("text.length", &args[0])?.chars().count() as i64))
        }),
        descriptor("text.repeat", "repeat(t, count) -> Text", "Text repeated count times", Arity::Fixed(2), |args| {
            let t = text("text.repeat", &args[0])?;
            let count = number("text.repeat", &args[1])?.max(0.0) as usize;
            Ok(Value::Text(t.repeat(count)))
        }),
        descriptor("list.length", "length(l) -> Integer", "Element count", Arity::Fixed(1), |args| {
            let items = args[0].as_list().ok_or(OpError::TypeMismatch {
                op: "list.length".to_string(),
                expected: "List",
                got: args[0].type_name(),
            })?;
            Ok(Value::Integer(items.len() as i64))
        }),
        descriptor("list.reverse", "reverse(l) -> List", "Reversed list", Arity::Fixed(1), |args| {
            let items = args[0].as_list().ok_or(OpError::TypeMismatch {
                op: "list.reverse".to_string(),
                expected: "List",
                got: args[0].type_name(),
            })?;
            Ok(Value::List(items.iter().rev().cloned().collect()))
        }),
    ]
}
