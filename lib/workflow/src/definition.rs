//! Workflow definition types.
//!
//! A workflow is a named automation owned by an organization:
//! - Metadata (name, description, timestamps)
//! - A directed graph of nodes and edges
//! - Settings governing per-contact re-entry
//!
//! Definitions are read-only to the engine and immutable per execution.

use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use crate::node::Node;
use chrono::{DateTime, Utc};
use copper_pigeon_core::{OrganizationId, WorkflowId};
use serde::{Deserialize, Serialize};

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    pub description: Option<String>,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates new metadata with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Whether a workflow accepts new executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Evaluated against inbound events.
    Active,
    /// Ignored by the trigger service.
    Inactive,
}

/// How `max_executions_per_contact` counts prior executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionCountMode {
    /// Count every execution regardless of status.
    #[default]
    AllRuns,
    /// Count only executions that completed.
    CompletedOnly,
}

/// Per-contact entry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Whether a contact may start a new execution while a previous one of
    /// this workflow is still active.
    pub allow_reentry: bool,
    /// Lifetime cap on executions per contact, applied regardless of the
    /// re-entry flag.
    pub max_executions_per_contact: Option<u32>,
    /// Count basis for the lifetime cap.
    #[serde(default)]
    pub count_mode: ExecutionCountMode,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            allow_reentry: false,
            max_executions_per_contact: None,
            count_mode: ExecutionCountMode::AllRuns,
        }
    }
}

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// The organization that owns this workflow.
    pub organization_id: OrganizationId,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
    /// The workflow graph (nodes and edges).
    pub graph: WorkflowGraph,
    /// Whether the workflow is evaluated for new events.
    pub status: WorkflowStatus,
    /// Per-contact entry settings.
    pub settings: WorkflowSettings,
}

impl Workflow {
    /// Creates a new active workflow with the given name.
    #[must_use]
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            organization_id,
            metadata: WorkflowMetadata::new(name),
            graph: WorkflowGraph::new(),
            status: WorkflowStatus::Active,
            settings: WorkflowSettings::default(),
        }
    }

    /// Creates a workflow with a specific ID.
    #[must_use]
    pub fn with_id(
        id: WorkflowId,
        organization_id: OrganizationId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            organization_id,
            metadata: WorkflowMetadata::new(name),
            graph: WorkflowGraph::new(),
            status: WorkflowStatus::Active,
            settings: WorkflowSettings::default(),
        }
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns whether the workflow accepts new executions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// Activates the workflow.
    pub fn activate(&mut self) {
        self.status = WorkflowStatus::Active;
        self.metadata.updated_at = Utc::now();
    }

    /// Deactivates the workflow.
    pub fn deactivate(&mut self) {
        self.status = WorkflowStatus::Inactive;
        self.metadata.updated_at = Utc::now();
    }

    /// Returns the workflow's trigger node, if present.
    #[must_use]
    pub fn trigger_node(&self) -> Option<&Node> {
        self.graph.trigger_node()
    }

    /// Validates the workflow graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow graph is invalid.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.graph.validate()
    }
}
