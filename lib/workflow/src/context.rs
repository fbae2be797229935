//! Execution state machine.
//!
//! An `ExecutionContext` is the mutable state of one contact's run through
//! one workflow. It is created by `ExecutionEngine::start_execution`, mutated
//! exclusively by the step loop, and persisted at every suspension point and
//! terminal state so that waiting executions survive process restarts.

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use copper_pigeon_contact::ContactProfile;
use copper_pigeon_core::{ContactId, ExecutionId, OrganizationId, WorkflowId};
use copper_pigeon_messaging::ChannelCredentials;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// The status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The step loop is advancing through nodes.
    Running,
    /// Suspended until the wake time elapses.
    Waiting,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the execution still occupies its contact slot
    /// (blocks non-reentrant workflows).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Waiting)
    }

    /// Returns the wire name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The mutable state of one contact's run through one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Unique identifier for this execution.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The organization that owns the workflow.
    pub organization_id: OrganizationId,
    /// The contact this execution runs against.
    pub contact_id: ContactId,
    /// Current status.
    pub status: ExecutionStatus,
    /// The next node to execute. `None` means the path ended and the
    /// execution completes on the next step.
    pub current_node: Option<NodeId>,
    /// Node identifiers visited, in order. Append-only.
    pub path: Vec<NodeId>,
    /// Per-node scratch space (condition results, split decisions, goal
    /// records), keyed by the node that wrote the entry.
    #[serde(default)]
    pub scratch: HashMap<NodeId, JsonValue>,
    /// Retry counter for an external supervisor. The engine persists it but
    /// never consumes it.
    pub retry_count: u32,
    /// Error message, set when the execution fails.
    pub error_message: Option<String>,
    /// The node where the failure occurred.
    pub error_node: Option<NodeId>,
    /// Wake time, set only while waiting.
    pub wake_at: Option<DateTime<Utc>>,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
    /// The contact's attribute view, used by downstream node executors.
    pub profile: Option<ContactProfile>,
    /// Messaging credentials for the owning organization.
    pub credentials: Option<ChannelCredentials>,
}

impl ExecutionContext {
    /// Creates a fresh running context positioned at the given entry node.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        organization_id: OrganizationId,
        contact_id: ContactId,
        entry_node: NodeId,
    ) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            workflow_id,
            organization_id,
            contact_id,
            status: ExecutionStatus::Running,
            current_node: Some(entry_node),
            path: Vec::new(),
            scratch: HashMap::new(),
            retry_count: 0,
            error_message: None,
            error_node: None,
            wake_at: None,
            started_at: Utc::now(),
            finished_at: None,
            profile: None,
            credentials: None,
        }
    }

    /// Attaches the contact's profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ContactProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Attaches messaging credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ChannelCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Appends a node to the execution path.
    pub fn record_step(&mut self, node_id: NodeId) {
        self.path.push(node_id);
    }

    /// Writes a scratch entry for a node.
    pub fn record_scratch(&mut self, node_id: NodeId, value: JsonValue) {
        self.scratch.insert(node_id, value);
    }

    /// Moves the cursor to the next node.
    pub fn advance(&mut self, next: Option<NodeId>) {
        self.current_node = next;
    }

    /// Suspends the execution until the wake time, positioned at the node to
    /// run after waking.
    pub fn suspend(&mut self, wake_at: DateTime<Utc>, next: Option<NodeId>) {
        self.status = ExecutionStatus::Waiting;
        self.wake_at = Some(wake_at);
        self.current_node = next;
    }

    /// Clears the wait state when the scheduler resumes this execution.
    pub fn wake(&mut self) {
        self.status = ExecutionStatus::Running;
        self.wake_at = None;
    }

    /// Marks the execution as completed.
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.current_node = None;
    }

    /// Marks the execution as failed at the given node.
    pub fn fail(&mut self, node_id: NodeId, message: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(message.into());
        self.error_node = Some(node_id);
        self.finished_at = Some(Utc::now());
    }

    /// Returns true if the execution reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Lightweight inspectable record of an execution, for support tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Execution ID.
    pub execution_id: ExecutionId,
    /// Workflow ID.
    pub workflow_id: WorkflowId,
    /// Contact ID.
    pub contact_id: ContactId,
    /// Final (or current) status.
    pub status: ExecutionStatus,
    /// Number of nodes executed.
    pub steps: usize,
    /// The node where the execution failed, if it failed.
    pub error_node: Option<NodeId>,
    /// The recorded error message, if any.
    pub error_message: Option<String>,
}

impl From<&ExecutionContext> for ExecutionSummary {
    fn from(context: &ExecutionContext) -> Self {
        Self {
            execution_id: context.execution_id,
            workflow_id: context.workflow_id,
            contact_id: context.contact_id,
            status: context.status,
            steps: context.path.len(),
            error_node: context.error_node,
            error_message: context.error_message.clone(),
        }
    }
}
