//! Edge types for workflow graphs.
//!
//! Edges connect nodes directly. Branching nodes (condition, split) label
//! their outgoing edges with a handle; the executor selects the edge whose
//! handle equals the produced branch value. Non-branching nodes use plain
//! edges with no handle.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Handle produced by a condition node when its expression holds.
pub const HANDLE_TRUE: &str = "true";

/// Handle produced by a condition node when its expression does not hold.
pub const HANDLE_FALSE: &str = "false";

/// An edge connecting two nodes in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Branch handle addressed by the source node, if it branches.
    pub handle: Option<String>,
}

impl Edge {
    /// Creates an unlabeled edge for a non-branching source.
    #[must_use]
    pub fn plain() -> Self {
        Self { handle: None }
    }

    /// Creates an edge addressed by the given branch handle.
    #[must_use]
    pub fn with_handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
        }
    }

    /// Returns true if this edge is addressed by the given handle.
    #[must_use]
    pub fn matches(&self, handle: &str) -> bool {
        self.handle.as_deref() == Some(handle)
    }
}

impl Default for Edge {
    fn default() -> Self {
        Self::plain()
    }
}

/// A complete edge reference including source and target node IDs.
///
/// This is used for external representation and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    /// The source node ID.
    pub source_node: NodeId,
    /// The target node ID.
    pub target_node: NodeId,
    /// Branch handle, if the source node branches.
    pub handle: Option<String>,
}

impl EdgeRef {
    /// Creates a new edge reference.
    #[must_use]
    pub fn new(source_node: NodeId, target_node: NodeId, handle: Option<String>) -> Self {
        Self {
            source_node,
            target_node,
            handle,
        }
    }

    /// Creates an unlabeled edge reference.
    #[must_use]
    pub fn plain(source_node: NodeId, target_node: NodeId) -> Self {
        Self::new(source_node, target_node, None)
    }
}
