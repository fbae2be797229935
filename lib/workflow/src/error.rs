//! Error types for the workflow crate.
//!
//! Three layers, each with only the information available at that layer:
//! - `GraphError`: structural problems in a workflow graph (authoring time)
//! - `ExecError`: a node executor failing the current execution (runtime)
//! - `EngineError`: engine entry-point contract violations and storage
//!   failures

use crate::context::ExecutionStatus;
use crate::node::NodeId;
use crate::store::StoreError;
use copper_pigeon_messaging::DeliveryError;
use std::fmt;

/// Errors from graph operations and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// The workflow has no trigger node.
    MissingTriggerNode,
    /// The workflow has more than one trigger node.
    MultipleTriggerNodes { count: usize },
    /// A non-branching node has more than one outgoing edge.
    TooManyOutgoingEdges { node_id: NodeId },
    /// A branching node's outgoing edge carries no handle.
    MissingHandle { node_id: NodeId },
    /// An edge handle is not one the source node can produce.
    HandleNotProduced { node_id: NodeId, handle: String },
    /// Two outgoing edges of a branching node carry the same handle.
    DuplicateHandle { node_id: NodeId, handle: String },
    /// A non-branching node's edge carries a handle.
    UnexpectedHandle { node_id: NodeId, handle: String },
    /// Graph contains cycles.
    CycleDetected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => {
                write!(f, "node not found: {node_id}")
            }
            Self::MissingTriggerNode => {
                write!(f, "workflow has no trigger node")
            }
            Self::MultipleTriggerNodes { count } => {
                write!(f, "workflow has {count} trigger nodes, expected exactly one")
            }
            Self::TooManyOutgoingEdges { node_id } => {
                write!(f, "non-branching node {node_id} has more than one outgoing edge")
            }
            Self::MissingHandle { node_id } => {
                write!(f, "edge from branching node {node_id} has no handle")
            }
            Self::HandleNotProduced { node_id, handle } => {
                write!(f, "node {node_id} cannot produce edge handle '{handle}'")
            }
            Self::DuplicateHandle { node_id, handle } => {
                write!(f, "node {node_id} has duplicate edges for handle '{handle}'")
            }
            Self::UnexpectedHandle { node_id, handle } => {
                write!(f, "non-branching node {node_id} has edge handle '{handle}'")
            }
            Self::CycleDetected => write!(f, "graph contains cycles"),
        }
    }
}

impl std::error::Error for GraphError {}

/// A node executor failing the current execution.
///
/// Only executors that call an external, fallible collaborator produce these;
/// every other malformed input degrades to a safe default instead. The
/// `Display` output becomes the execution's recorded error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Message delivery was rejected by the channel provider.
    Delivery { node_id: NodeId, error: DeliveryError },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivery { node_id, error } => {
                write!(f, "Message delivery failed at {node_id}: {error}")
            }
        }
    }
}

impl std::error::Error for ExecError {}

/// Errors from the engine entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The workflow cannot be started without a trigger node.
    MissingTriggerNode,
    /// `resume_execution` was called on a context that is not waiting.
    NotWaiting { status: ExecutionStatus },
    /// The execution store failed.
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTriggerNode => {
                write!(f, "Workflow must have a trigger node")
            }
            Self::NotWaiting { status } => {
                write!(f, "cannot resume execution with status {status}")
            }
            Self::Store(e) => write!(f, "execution store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
