//! Dependency resolver
//!
//! Topologically sorts the nodes of one network so every producer is
//! ordered before its consumers. Kahn's algorithm with a deterministic
//! tie-break: ready nodes are processed in id order, wave by wave.

use indexmap::IndexMap;
use trellis_foundation::NodeId;

use crate::error::StructuralError;
use crate::network::Network;

/// Every node of the network exactly once, producers first. Fails with
/// [`StructuralError::Cycle`] when no valid order exists.
pub fn sorted_nodes(network: &Network) -> Result<Vec<NodeId>, StructuralError> {
    let mut in_degree: IndexMap<&NodeId, usize> = network
        .nodes()
        .map(|node| (&node.id, 0usize))
        .collect();
    let mut dependents: IndexMap<&NodeId, Vec<&NodeId>> = IndexMap::new();

    for link in network.links() {
        *in_degree.get_mut(&link.to.0).unwrap() += 1;
        dependents.entry(&link.from.0).or_default().push(&link.to.0);
    }

    let mut current_wave: Vec<&NodeId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());

    while !current_wave.is_empty() {
        // Sort for determinism
        current_wave.sort();

        let mut next_wave = Vec::new();
        for node in current_wave {
            order.push(node.clone());
            if let Some(consumers) = dependents.get(node) {
                for consumer in consumers {
                    let degree = in_degree.get_mut(consumer).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        next_wave.push(*consumer);
                    }
                }
            }
        }
        current_wave = next_wave;
    }

    if order.len() != in_degree.len() {
        let involved: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| (*id).clone())
            .collect();
        return Err(StructuralError::Cycle { involved });
    }

    Ok(order)
}
