//! Trellis Foundation
//!
//! Core types shared by every layer: typed identifiers, runtime values,
//! the socket-type registry, and the operation registry.

pub mod ids;
pub mod ops;
pub mod types;
pub mod value;

pub use ids::{NetworkId, NodeId, SocketId};
pub use ops::{Arity, OpDescriptor, OpError, OpRegistry};
pub use types::{CorrectionKind, SocketTypeRegistry, TypeInfo};
pub use value::{DataType, ReprError, SocketType, Value};
