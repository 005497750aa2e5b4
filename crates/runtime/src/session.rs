//! Evaluation session boards
//!
//! Mutable per-evaluation state the host driver owns and passes into
//! `execute`: node error messages (written exactly by debug-wrapped
//! generated code), socket inspection flags, loop-viewer display
//! buffers, and per-node timing in measured mode.

use std::time::Duration;

use indexmap::IndexMap;
use trellis_foundation::{CorrectionKind, NodeId};

/// Inspection flags recorded for one output socket
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SocketInspection {
    /// Whether user code bound the output before the epilogue ran
    pub initialized: Option<bool>,
    /// Outcome of the output-type correction, when it ran
    pub correction: Option<CorrectionKind>,
}

/// Accumulated timing for one node in measured mode
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeMeasurement {
    pub calls: u64,
    pub total: Duration,
}

#[derive(Debug, Clone, Default)]
struct ViewerBuffer {
    pending: Vec<String>,
    published: Vec<String>,
    updates: u64,
}

/// Per-evaluation mutable state
#[derive(Debug, Clone, Default)]
pub struct EvalSession {
    node_errors: IndexMap<NodeId, String>,
    inspections: IndexMap<(NodeId, usize), SocketInspection>,
    viewers: IndexMap<NodeId, ViewerBuffer>,
    measurements: IndexMap<NodeId, NodeMeasurement>,
}

impl EvalSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all boards for a fresh evaluation pass
    pub fn reset(&mut self) {
        self.node_errors.clear();
        self.inspections.clear();
        self.viewers.clear();
        self.measurements.clear();
    }

    pub fn set_error(&mut self, node: &NodeId, message: impl Into<String>) {
        self.node_errors.insert(node.clone(), message.into());
    }

    pub fn clear_error(&mut self, node: &NodeId) {
        self.node_errors.shift_remove(node);
    }

    pub fn error_message(&self, node: &NodeId) -> Option<&str> {
        self.node_errors.get(node).map(String::as_str)
    }

    pub fn record_initialized(&mut self, node: &NodeId, output: usize, initialized: bool) {
        self.inspections
            .entry((node.clone(), output))
            .or_default()
            .initialized = Some(initialized);
    }

    pub fn record_correction(&mut self, node: &NodeId, output: usize, kind: CorrectionKind) {
        self.inspections
            .entry((node.clone(), output))
            .or_default()
            .correction = Some(kind);
    }

    pub fn inspection(&self, node: &NodeId, output: usize) -> Option<SocketInspection> {
        self.inspections.get(&(node.clone(), output)).copied()
    }

    /// Buffer one display line for a viewer node
    pub fn record_viewer_line(&mut self, node: &NodeId, line: String) {
        self.viewers.entry(node.clone()).or_default().pending.push(line);
    }

    /// Publish a viewer node's buffered lines and start a new buffer
    pub fn flush_viewer(&mut self, node: &NodeId) {
        let buffer = self.viewers.entry(node.clone()).or_default();
        buffer.published = std::mem::take(&mut buffer.pending);
        buffer.updates += 1;
    }

    /// The lines last published for a viewer node
    pub fn viewer_lines(&self, node: &NodeId) -> &[String] {
        self.viewers
            .get(node)
            .map(|buffer| buffer.published.as_slice())
            .unwrap_or(&[])
    }

    pub fn viewer_updates(&self, node: &NodeId) -> u64 {
        self.viewers.get(node).map(|buffer| buffer.updates).unwrap_or(0)
    }

    pub fn add_measurement(&mut self, node: &NodeId, elapsed: Duration) {
        let entry = self.measurements.entry(node.clone()).or_default();
        entry.calls += 1;
        entry.total += elapsed;
    }

    pub fn measurement(&self, node: &NodeId) -> Option<NodeMeasurement> {
        self.measurements.get(node).copied()
    }
}
