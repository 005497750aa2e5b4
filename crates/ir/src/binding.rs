//! Variable binding table
//!
//! Assigns each socket a collision-free generated variable for one
//! compilation pass. Sockets never required downstream are never bound,
//! which is the source-level dead-code elimination: no binding, no
//! generated statement.

use indexmap::IndexMap;
use trellis_foundation::NodeId;

use crate::expr::{PortRef, VarId};

/// Socket-to-variable mapping for one compiled procedure
#[derive(Debug, Default)]
pub struct BindingTable {
    ports: IndexMap<PortRef, VarId>,
    node_vars: IndexMap<NodeId, VarId>,
    names: Vec<String>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable. The hint only feeds the debug name;
    /// uniqueness comes from the monotone counter.
    pub fn fresh(&mut self, hint: &str) -> VarId {
        let id = VarId(self.names.len() as u32);
        self.names.push(format!("_{}_{}", sanitize(hint), id.0));
        id
    }

    /// Bind a socket, reusing the existing variable when already bound
    pub fn bind_port(&mut self, port: PortRef, hint: &str) -> VarId {
        if let Some(var) = self.ports.get(&port) {
            return *var;
        }
        let var = self.fresh(hint);
        self.ports.insert(port, var);
        var
    }

    /// Make `port` share the variable already bound to `existing`
    pub fn alias_port(&mut self, port: PortRef, existing: &PortRef) -> Option<VarId> {
        let var = *self.ports.get(existing)?;
        self.ports.insert(port, var);
        Some(var)
    }

    pub fn port(&self, port: &PortRef) -> Option<VarId> {
        self.ports.get(port).copied()
    }

    /// Bind a node-level variable (e.g. a generator accumulator)
    pub fn bind_node(&mut self, node: NodeId, hint: &str) -> VarId {
        if let Some(var) = self.node_vars.get(&node) {
            return *var;
        }
        let var = self.fresh(hint);
        self.node_vars.insert(node, var);
        var
    }

    pub fn node_var(&self, node: &NodeId) -> Option<VarId> {
        self.node_vars.get(node).copied()
    }

    pub fn var_count(&self) -> u32 {
        self.names.len() as u32
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.0 as usize]
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

fn sanitize(hint: &str) -> String {
    hint.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
