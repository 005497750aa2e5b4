//! Compilation errors

use thiserror::Error;
use trellis_foundation::{NetworkId, NodeId};

/// Graph-shape errors that fail compilation outright. No partial unit
/// is produced when one of these surfaces.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StructuralError {
    #[error("cycle detected in network, involving: {involved:?}")]
    Cycle { involved: Vec<NodeId> },

    #[error("subprogram call {node} has no target network")]
    MissingSubprogram { node: NodeId },

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("unknown network: {0}")]
    UnknownNetwork(NetworkId),

    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    #[error("input {input} of {node} is already linked")]
    InputAlreadyLinked { node: NodeId, input: usize },

    #[error("{node} has no {direction} socket {index}")]
    InvalidSocketIndex {
        node: NodeId,
        direction: &'static str,
        index: usize,
    },

    #[error("loop network {0} has no loop input node")]
    MissingLoopInput(NetworkId),

    #[error("script network {0} has no script node")]
    MissingScriptNode(NetworkId),
}

/// Errors from code generation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(
        "vectorization default on input {input} of {node} does not survive the \
         representation round trip: {reason}"
    )]
    InvalidVectorDefault {
        node: NodeId,
        input: usize,
        reason: String,
    },

    #[error("vectorized output {output} of {node} aliases non-vectorized input {input}")]
    InvalidVectorAlias {
        node: NodeId,
        output: usize,
        input: usize,
    },

    #[error("{direction} socket {index} of {node} was never bound")]
    UnboundPort {
        node: NodeId,
        direction: &'static str,
        index: usize,
    },

    #[error("node {node} cannot appear in a {context} network")]
    MisplacedNode { node: NodeId, context: &'static str },

    #[error("network {network} is not a {expected} network")]
    WrongNetworkKind {
        network: NetworkId,
        expected: &'static str,
    },

    #[error("malformed loop: {0}")]
    MalformedLoop(&'static str),
}
