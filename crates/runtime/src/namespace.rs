//! Execution namespaces
//!
//! A namespace is the flat name → value/callable mapping a unit owns
//! while it is set up. Subprogram linking merges callee entries in;
//! `finish` clears everything.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use trellis_foundation::Value;

use crate::error::EvalError;
use crate::lower::ExecEnv;

/// A compiled procedure entry point bound into a namespace. Invoked
/// with the *caller's* environment so nested subprogram calls resolve
/// through the caller's namespace.
pub type ProcedureFn =
    Arc<dyn Fn(&mut ExecEnv<'_>, &[Value]) -> Result<Vec<Value>, EvalError> + Send + Sync>;

/// One namespace entry
#[derive(Clone)]
pub enum NamespaceEntry {
    Value(Value),
    Function(ProcedureFn),
}

impl fmt::Debug for NamespaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceEntry::Value(value) => write!(f, "Value({value})"),
            NamespaceEntry::Function(_) => write!(f, "Function(<procedure>)"),
        }
    }
}

/// Flat name → entry mapping, exclusively owned by one execution unit
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: IndexMap<String, NamespaceEntry>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: NamespaceEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.insert(name, NamespaceEntry::Value(value));
    }

    pub fn insert_function(&mut self, name: impl Into<String>, function: ProcedureFn) {
        self.insert(name, NamespaceEntry::Function(function));
    }

    pub fn get(&self, name: &str) -> Option<&NamespaceEntry> {
        self.entries.get(name)
    }

    /// Look up a callable entry
    pub fn function(&self, name: &str) -> Option<ProcedureFn> {
        match self.entries.get(name) {
            Some(NamespaceEntry::Function(function)) => Some(Arc::clone(function)),
            _ => None,
        }
    }

    /// Merge entries in, overwriting existing names (subprogram linking)
    pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, NamespaceEntry)>) {
        for (name, entry) in entries {
            self.entries.insert(name, entry);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
