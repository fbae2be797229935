//! Storage boundary traits.
//!
//! Workflow definitions are read-only to the engine; execution contexts are
//! created on start, updated on every status transition, and queried by the
//! resumption scheduler and the trigger service. These traits abstract the
//! datastore so the engine can be tested without one; implementations live
//! in the store crate.

use crate::context::ExecutionContext;
use crate::definition::Workflow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copper_pigeon_core::{ContactId, ExecutionId, OrganizationId, WorkflowId};
use std::fmt;
use std::sync::Arc;

/// Guard applied when inserting a new execution.
///
/// The check-then-act sequence in trigger evaluation is racy on its own;
/// the conditional insert is the serialization point that prevents two
/// concurrent non-reentrant executions for the same contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertGuard {
    /// Insert unconditionally.
    None,
    /// Fail if the contact already has an active (running or waiting)
    /// execution of the same workflow.
    NoActiveForContact,
}

/// Which executions to count for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    /// Every execution regardless of status.
    Any,
    /// Executions that are running or waiting.
    Active,
    /// Executions that completed.
    Completed,
}

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A guarded insert found an active execution for the contact.
    ActiveExecutionExists {
        workflow_id: WorkflowId,
        contact_id: ContactId,
    },
    /// The execution does not exist.
    NotFound { execution_id: ExecutionId },
    /// The backing datastore failed.
    Backend { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveExecutionExists {
                workflow_id,
                contact_id,
            } => {
                write!(
                    f,
                    "contact {contact_id} already has an active execution of workflow {workflow_id}"
                )
            }
            Self::NotFound { execution_id } => {
                write!(f, "execution not found: {execution_id}")
            }
            Self::Backend { reason } => write!(f, "storage backend failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read access to workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetches a workflow by ID.
    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, StoreError>;

    /// Lists all active workflows for an organization.
    async fn list_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Workflow>, StoreError>;
}

/// Persistence for execution contexts.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Creates a new execution record, enforcing the guard atomically.
    async fn insert(
        &self,
        context: &ExecutionContext,
        guard: InsertGuard,
    ) -> Result<(), StoreError>;

    /// Persists the current state of an execution.
    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError>;

    /// Fetches an execution by ID.
    async fn load(&self, execution_id: ExecutionId)
    -> Result<Option<ExecutionContext>, StoreError>;

    /// Counts a contact's executions of a workflow within the given scope.
    async fn count_for_contact(
        &self,
        workflow_id: WorkflowId,
        contact_id: ContactId,
        scope: CountScope,
    ) -> Result<u64, StoreError>;

    /// Lists waiting executions whose wake time has elapsed.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionContext>, StoreError>;
}

#[async_trait]
impl<T: WorkflowStore + ?Sized> WorkflowStore for Arc<T> {
    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        (**self).get(workflow_id).await
    }

    async fn list_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Workflow>, StoreError> {
        (**self).list_active(organization_id).await
    }
}

#[async_trait]
impl<T: ExecutionStore + ?Sized> ExecutionStore for Arc<T> {
    async fn insert(
        &self,
        context: &ExecutionContext,
        guard: InsertGuard,
    ) -> Result<(), StoreError> {
        (**self).insert(context, guard).await
    }

    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError> {
        (**self).save(context).await
    }

    async fn load(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ExecutionContext>, StoreError> {
        (**self).load(execution_id).await
    }

    async fn count_for_contact(
        &self,
        workflow_id: WorkflowId,
        contact_id: ContactId,
        scope: CountScope,
    ) -> Result<u64, StoreError> {
        (**self).count_for_contact(workflow_id, contact_id, scope).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionContext>, StoreError> {
        (**self).list_due(now).await
    }
}
