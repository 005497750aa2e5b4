//! Networks and programs
//!
//! A network is one evaluation context: the main graph or a subprogram.
//! A program is the full set of networks, with the stale-subprogram
//! pre-pass run before compilation.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use tracing::warn;
use trellis_foundation::{NetworkId, NodeId};

use crate::error::StructuralError;
use crate::node::{Node, NodeKind};

/// Namespace symbol under which a subprogram's entry function is linked
pub fn subprogram_symbol(id: &NetworkId) -> String {
    format!("subprogram_{id}")
}

/// Which unit variant compiles a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Main,
    Script,
    Loop,
}

/// A single socket link: producer output to consumer input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub from: (NodeId, usize),
    pub to: (NodeId, usize),
}

/// A maximal set of nodes sharing one evaluation context
#[derive(Debug, Clone)]
pub struct Network {
    pub id: NetworkId,
    /// Human-readable name, used as the unit's diagnostic key
    pub name: String,
    pub kind: NetworkKind,
    nodes: IndexMap<NodeId, Node>,
    links: Vec<Link>,
    external_outputs: Vec<(NodeId, usize)>,
}

impl Network {
    pub fn new(id: impl Into<NetworkId>, name: impl Into<String>, kind: NetworkKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            nodes: IndexMap::new(),
            links: Vec::new(),
            external_outputs: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), StructuralError> {
        if self.nodes.contains_key(&node.id) {
            return Err(StructuralError::DuplicateNode(node.id.clone()));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, StructuralError> {
        self.nodes
            .get(id)
            .ok_or_else(|| StructuralError::UnknownNode(id.clone()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Connect a producer output to a consumer input. An input accepts
    /// exactly one producer; an output fans out freely.
    pub fn link(
        &mut self,
        from: (impl Into<NodeId>, usize),
        to: (impl Into<NodeId>, usize),
    ) -> Result<(), StructuralError> {
        let from = (from.0.into(), from.1);
        let to = (to.0.into(), to.1);

        let producer = self.node(&from.0)?;
        if from.1 >= producer.outputs.len() {
            return Err(StructuralError::InvalidSocketIndex {
                node: from.0,
                direction: "output",
                index: from.1,
            });
        }
        let consumer = self.node(&to.0)?;
        if to.1 >= consumer.inputs.len() {
            return Err(StructuralError::InvalidSocketIndex {
                node: to.0,
                direction: "input",
                index: to.1,
            });
        }
        if self.links.iter().any(|link| link.to == to) {
            return Err(StructuralError::InputAlreadyLinked {
                node: to.0,
                input: to.1,
            });
        }
        self.links.push(Link { from, to });
        Ok(())
    }

    /// Producer feeding an input socket, if linked
    pub fn producer_of(&self, node: &NodeId, input: usize) -> Option<&(NodeId, usize)> {
        self.links
            .iter()
            .find(|link| link.to.0 == *node && link.to.1 == input)
            .map(|link| &link.from)
    }

    pub fn is_output_linked(&self, node: &NodeId, output: usize) -> bool {
        self.links
            .iter()
            .any(|link| link.from.0 == *node && link.from.1 == output)
    }

    /// Mark an output as consumed by the host (returned from the
    /// compiled procedure even without an in-graph consumer)
    pub fn mark_external_output(
        &mut self,
        node: impl Into<NodeId>,
        output: usize,
    ) -> Result<(), StructuralError> {
        let node = node.into();
        let owner = self.node(&node)?;
        if output >= owner.outputs.len() {
            return Err(StructuralError::InvalidSocketIndex {
                node,
                direction: "output",
                index: output,
            });
        }
        self.external_outputs.push((node, output));
        Ok(())
    }

    pub fn external_outputs(&self) -> &[(NodeId, usize)] {
        &self.external_outputs
    }

    /// Per node, the output indices required downstream: linked outputs
    /// plus externally consumed ones
    pub fn required_outputs(&self) -> IndexMap<NodeId, BTreeSet<usize>> {
        let mut required: IndexMap<NodeId, BTreeSet<usize>> = self
            .nodes
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();
        for link in &self.links {
            if let Some(set) = required.get_mut(&link.from.0) {
                set.insert(link.from.1);
            }
        }
        for (node, output) in &self.external_outputs {
            if let Some(set) = required.get_mut(node) {
                set.insert(*output);
            }
        }
        required
    }

    /// The single loop-input node of a loop network
    pub fn loop_input(&self) -> Result<&Node, StructuralError> {
        self.nodes
            .values()
            .find(|node| matches!(node.kind, NodeKind::LoopInput(_)))
            .ok_or_else(|| StructuralError::MissingLoopInput(self.id.clone()))
    }

    /// The single script node of a script network
    pub fn script_node(&self) -> Result<&Node, StructuralError> {
        self.nodes
            .values()
            .find(|node| matches!(node.kind, NodeKind::Script(_)))
            .ok_or_else(|| StructuralError::MissingScriptNode(self.id.clone()))
    }

    pub fn viewer_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .values()
            .filter(|node| matches!(node.kind, NodeKind::LoopViewer))
    }
}

/// The full set of networks under evaluation
#[derive(Debug, Clone, Default)]
pub struct Program {
    networks: IndexMap<NetworkId, Network>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_network(&mut self, network: Network) {
        self.networks.insert(network.id.clone(), network);
    }

    pub fn network(&self, id: &NetworkId) -> Result<&Network, StructuralError> {
        self.networks
            .get(id)
            .ok_or_else(|| StructuralError::UnknownNetwork(id.clone()))
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    /// Pre-pass: clear subprogram targets that no longer resolve to an
    /// existing network. Returns the number of references reset. A call
    /// left without a target fails compilation later with
    /// [`StructuralError::MissingSubprogram`].
    pub fn reset_stale_calls(&mut self) -> usize {
        let known: HashSet<NetworkId> = self.networks.keys().cloned().collect();
        let mut reset = 0;
        for network in self.networks.values_mut() {
            for node in network.nodes_mut() {
                if let NodeKind::SubprogramCall(spec) = &mut node.kind
                    && let Some(target) = &spec.target
                    && !known.contains(target)
                {
                    warn!(node = %node.id, target = %target, "stale subprogram reference reset");
                    spec.target = None;
                    reset += 1;
                }
            }
        }
        reset
    }
}
