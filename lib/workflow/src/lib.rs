//! Workflow execution engine for the copper-pigeon platform.
//!
//! This crate provides the core automation engine, including:
//!
//! - **Graph Model**: directed graphs using petgraph with typed nodes and
//!   handle-labeled edges for branching
//! - **Node Types**: trigger, message, delay, condition, action, split, goal
//! - **Execution**: a state machine (`ExecutionContext`) driven by an
//!   iterative step loop with suspension and resumption
//! - **Executors**: one execution strategy per node type, dispatching over a
//!   closed set of configuration variants
//! - **Storage boundary**: traits for workflow definitions and execution
//!   state, persisted at every suspension point and terminal state

pub mod condition;
pub mod context;
pub mod definition;
pub mod edge;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod render;
pub mod split;
pub mod store;

pub use condition::ConditionOperator;
pub use context::{ExecutionContext, ExecutionStatus, ExecutionSummary};
pub use definition::{
    ExecutionCountMode, Workflow, WorkflowMetadata, WorkflowSettings, WorkflowStatus,
};
pub use edge::{Edge, EdgeRef, HANDLE_FALSE, HANDLE_TRUE};
pub use engine::ExecutionEngine;
pub use error::{EngineError, ExecError, GraphError};
pub use executor::{EngineServices, GoalNotifier, GoalRecord, NodeOutcome, NotifyError};
pub use graph::WorkflowGraph;
pub use node::{Node, NodeConfig, NodeId, NodeKind, TriggerEventType};
pub use split::{FixedSequence, RandomSource, ThreadRandom};
pub use store::{CountScope, ExecutionStore, InsertGuard, StoreError, WorkflowStore};
