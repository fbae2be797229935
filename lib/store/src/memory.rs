//! In-memory store.
//!
//! Backs tests and single-process deployments. All state lives in
//! mutex-guarded maps; the guarded insert performs its existence check and
//! insert under a single lock acquisition, so two near-simultaneous starts
//! for the same contact cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copper_pigeon_core::{ContactId, ExecutionId, OrganizationId, WorkflowId};
use copper_pigeon_workflow::{
    CountScope, ExecutionContext, ExecutionStatus, ExecutionStore, InsertGuard, StoreError,
    Workflow, WorkflowStore,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded in-memory implementation of both storage traits.
#[derive(Default)]
pub struct MemoryStore {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
    executions: Mutex<HashMap<ExecutionId, ExecutionContext>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) a workflow definition.
    pub async fn put_workflow(&self, workflow: Workflow) {
        self.workflows
            .lock()
            .expect("workflow map poisoned")
            .insert(workflow.id, workflow);
    }

    /// Returns the number of stored executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().expect("execution map poisoned").len()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        Ok(self
            .workflows
            .lock()
            .expect("workflow map poisoned")
            .get(&workflow_id)
            .cloned())
    }

    async fn list_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Workflow>, StoreError> {
        Ok(self
            .workflows
            .lock()
            .expect("workflow map poisoned")
            .values()
            .filter(|w| w.organization_id == organization_id && w.is_active())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn insert(
        &self,
        context: &ExecutionContext,
        guard: InsertGuard,
    ) -> Result<(), StoreError> {
        let mut executions = self.executions.lock().expect("execution map poisoned");

        if guard == InsertGuard::NoActiveForContact {
            let blocked = executions.values().any(|existing| {
                existing.workflow_id == context.workflow_id
                    && existing.contact_id == context.contact_id
                    && existing.status.is_active()
            });
            if blocked {
                return Err(StoreError::ActiveExecutionExists {
                    workflow_id: context.workflow_id,
                    contact_id: context.contact_id,
                });
            }
        }

        executions.insert(context.execution_id, context.clone());
        Ok(())
    }

    async fn save(&self, context: &ExecutionContext) -> Result<(), StoreError> {
        self.executions
            .lock()
            .expect("execution map poisoned")
            .insert(context.execution_id, context.clone());
        Ok(())
    }

    async fn load(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ExecutionContext>, StoreError> {
        Ok(self
            .executions
            .lock()
            .expect("execution map poisoned")
            .get(&execution_id)
            .cloned())
    }

    async fn count_for_contact(
        &self,
        workflow_id: WorkflowId,
        contact_id: ContactId,
        scope: CountScope,
    ) -> Result<u64, StoreError> {
        let executions = self.executions.lock().expect("execution map poisoned");
        let count = executions
            .values()
            .filter(|c| c.workflow_id == workflow_id && c.contact_id == contact_id)
            .filter(|c| match scope {
                CountScope::Any => true,
                CountScope::Active => c.status.is_active(),
                CountScope::Completed => c.status == ExecutionStatus::Completed,
            })
            .count();
        Ok(count as u64)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionContext>, StoreError> {
        Ok(self
            .executions
            .lock()
            .expect("execution map poisoned")
            .values()
            .filter(|c| {
                c.status == ExecutionStatus::Waiting && c.wake_at.is_some_and(|wake| wake <= now)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_pigeon_workflow::NodeId;
    use std::sync::Arc;

    fn context(workflow_id: WorkflowId, contact_id: ContactId) -> ExecutionContext {
        ExecutionContext::new(
            workflow_id,
            OrganizationId::new(),
            contact_id,
            NodeId::new(),
        )
    }

    #[tokio::test]
    async fn list_active_filters_organization_and_status() {
        let store = MemoryStore::new();
        let organization_id = OrganizationId::new();

        let active = Workflow::new(organization_id, "Active");
        let mut inactive = Workflow::new(organization_id, "Inactive");
        inactive.deactivate();
        let foreign = Workflow::new(OrganizationId::new(), "Foreign");

        let active_id = active.id;
        store.put_workflow(active).await;
        store.put_workflow(inactive).await;
        store.put_workflow(foreign).await;

        let listed = store.list_active(organization_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active_id);
    }

    #[tokio::test]
    async fn guarded_insert_blocks_second_active() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        let first = context(workflow_id, contact_id);
        store
            .insert(&first, InsertGuard::NoActiveForContact)
            .await
            .unwrap();

        let second = context(workflow_id, contact_id);
        let result = store.insert(&second, InsertGuard::NoActiveForContact).await;
        assert!(matches!(
            result,
            Err(StoreError::ActiveExecutionExists { .. })
        ));

        // Unguarded insert is not blocked.
        store.insert(&second, InsertGuard::None).await.unwrap();
    }

    #[tokio::test]
    async fn guard_frees_after_terminal_status() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        let mut first = context(workflow_id, contact_id);
        store
            .insert(&first, InsertGuard::NoActiveForContact)
            .await
            .unwrap();

        first.complete();
        store.save(&first).await.unwrap();

        let second = context(workflow_id, contact_id);
        store
            .insert(&second, InsertGuard::NoActiveForContact)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_guarded_inserts_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let candidate = context(workflow_id, contact_id);
                store
                    .insert(&candidate, InsertGuard::NoActiveForContact)
                    .await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(store.execution_count(), 1);
    }

    #[tokio::test]
    async fn count_scopes() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        let running = context(workflow_id, contact_id);
        store.insert(&running, InsertGuard::None).await.unwrap();

        let mut completed = context(workflow_id, contact_id);
        completed.complete();
        store.insert(&completed, InsertGuard::None).await.unwrap();

        let mut failed = context(workflow_id, contact_id);
        failed.fail(NodeId::new(), "boom");
        store.insert(&failed, InsertGuard::None).await.unwrap();

        let count = |scope| store.count_for_contact(workflow_id, contact_id, scope);
        assert_eq!(count(CountScope::Any).await.unwrap(), 3);
        assert_eq!(count(CountScope::Active).await.unwrap(), 1);
        assert_eq!(count(CountScope::Completed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_due_returns_only_elapsed_waiting() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut due = context(WorkflowId::new(), ContactId::new());
        due.suspend(now - chrono::Duration::minutes(5), Some(NodeId::new()));
        store.insert(&due, InsertGuard::None).await.unwrap();

        let mut not_yet = context(WorkflowId::new(), ContactId::new());
        not_yet.suspend(now + chrono::Duration::hours(1), Some(NodeId::new()));
        store.insert(&not_yet, InsertGuard::None).await.unwrap();

        let running = context(WorkflowId::new(), ContactId::new());
        store.insert(&running, InsertGuard::None).await.unwrap();

        let listed = store.list_due(now).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].execution_id, due.execution_id);
    }
}
