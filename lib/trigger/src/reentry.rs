//! Re-entry control.
//!
//! Decides whether a contact may start a new execution of a workflow. The
//! rules are evaluated in order:
//!
//! 1. Re-entry allowed and no lifetime cap: always eligible.
//! 2. Re-entry disallowed: eligible only with zero active (running or
//!    waiting) executions of this workflow.
//! 3. Lifetime cap configured: eligible only while the counted executions
//!    stay strictly below the cap, regardless of the re-entry flag.
//!
//! This check is advisory; the storage layer's conditional insert is the
//! serialization point that makes it race-free.

use copper_pigeon_core::{ContactId, WorkflowId};
use copper_pigeon_workflow::{
    CountScope, ExecutionCountMode, ExecutionStore, StoreError, WorkflowSettings,
};

/// Returns whether the contact may start a new execution of the workflow.
///
/// # Errors
///
/// Returns an error if the execution store fails.
pub async fn can_contact_enter_workflow<E>(
    store: &E,
    workflow_id: WorkflowId,
    contact_id: ContactId,
    settings: &WorkflowSettings,
) -> Result<bool, StoreError>
where
    E: ExecutionStore + ?Sized,
{
    if settings.allow_reentry && settings.max_executions_per_contact.is_none() {
        return Ok(true);
    }

    if !settings.allow_reentry {
        let active = store
            .count_for_contact(workflow_id, contact_id, CountScope::Active)
            .await?;
        if active > 0 {
            return Ok(false);
        }
    }

    if let Some(max) = settings.max_executions_per_contact {
        let scope = match settings.count_mode {
            ExecutionCountMode::AllRuns => CountScope::Any,
            ExecutionCountMode::CompletedOnly => CountScope::Completed,
        };
        let count = store.count_for_contact(workflow_id, contact_id, scope).await?;
        if count >= u64::from(max) {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_pigeon_core::{ExecutionId, OrganizationId};
    use copper_pigeon_store::MemoryStore;
    use copper_pigeon_workflow::{
        ExecutionContext, InsertGuard, NodeId,
    };

    fn settings(allow_reentry: bool, max: Option<u32>) -> WorkflowSettings {
        WorkflowSettings {
            allow_reentry,
            max_executions_per_contact: max,
            count_mode: ExecutionCountMode::AllRuns,
        }
    }

    async fn insert_execution(
        store: &MemoryStore,
        workflow_id: WorkflowId,
        contact_id: ContactId,
    ) -> ExecutionContext {
        let context = ExecutionContext::new(
            workflow_id,
            OrganizationId::new(),
            contact_id,
            NodeId::new(),
        );
        store.insert(&context, InsertGuard::None).await.unwrap();
        context
    }

    #[tokio::test]
    async fn reentry_allowed_without_cap_is_always_eligible() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        insert_execution(&store, workflow_id, contact_id).await;
        insert_execution(&store, workflow_id, contact_id).await;

        let eligible =
            can_contact_enter_workflow(&store, workflow_id, contact_id, &settings(true, None))
                .await
                .unwrap();
        assert!(eligible);
    }

    #[tokio::test]
    async fn active_execution_blocks_non_reentrant_workflow() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        let mut context = insert_execution(&store, workflow_id, contact_id).await;

        let eligible =
            can_contact_enter_workflow(&store, workflow_id, contact_id, &settings(false, None))
                .await
                .unwrap();
        assert!(!eligible);

        // Terminal status frees the slot.
        context.complete();
        store.save(&context).await.unwrap();

        let eligible =
            can_contact_enter_workflow(&store, workflow_id, contact_id, &settings(false, None))
                .await
                .unwrap();
        assert!(eligible);
    }

    #[tokio::test]
    async fn waiting_execution_also_blocks() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        let mut context = insert_execution(&store, workflow_id, contact_id).await;
        context.suspend(chrono::Utc::now() + chrono::Duration::hours(1), None);
        store.save(&context).await.unwrap();

        let eligible =
            can_contact_enter_workflow(&store, workflow_id, contact_id, &settings(false, None))
                .await
                .unwrap();
        assert!(!eligible);
    }

    #[tokio::test]
    async fn lifetime_cap_applies_regardless_of_reentry_flag() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        // Two completed runs against a cap of 2.
        for _ in 0..2 {
            let mut context = insert_execution(&store, workflow_id, contact_id).await;
            context.complete();
            store.save(&context).await.unwrap();
        }

        let eligible =
            can_contact_enter_workflow(&store, workflow_id, contact_id, &settings(true, Some(2)))
                .await
                .unwrap();
        assert!(!eligible);

        let eligible =
            can_contact_enter_workflow(&store, workflow_id, contact_id, &settings(true, Some(3)))
                .await
                .unwrap();
        assert!(eligible);
    }

    #[tokio::test]
    async fn completed_only_count_mode_ignores_failed_runs() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();
        let contact_id = ContactId::new();

        // One failed and one completed run.
        let mut failed = insert_execution(&store, workflow_id, contact_id).await;
        let failed_node = NodeId::new();
        failed.fail(failed_node, "boom");
        store.save(&failed).await.unwrap();

        let mut completed = insert_execution(&store, workflow_id, contact_id).await;
        completed.complete();
        store.save(&completed).await.unwrap();

        let strict = WorkflowSettings {
            allow_reentry: true,
            max_executions_per_contact: Some(2),
            count_mode: ExecutionCountMode::AllRuns,
        };
        let lenient = WorkflowSettings {
            allow_reentry: true,
            max_executions_per_contact: Some(2),
            count_mode: ExecutionCountMode::CompletedOnly,
        };

        assert!(
            !can_contact_enter_workflow(&store, workflow_id, contact_id, &strict)
                .await
                .unwrap()
        );
        assert!(
            can_contact_enter_workflow(&store, workflow_id, contact_id, &lenient)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn other_contacts_do_not_affect_eligibility() {
        let store = MemoryStore::new();
        let workflow_id = WorkflowId::new();

        insert_execution(&store, workflow_id, ContactId::new()).await;

        let eligible = can_contact_enter_workflow(
            &store,
            workflow_id,
            ContactId::new(),
            &settings(false, None),
        )
        .await
        .unwrap();
        assert!(eligible);
    }

    #[tokio::test]
    async fn unknown_execution_lookup_is_none() {
        let store = MemoryStore::new();
        let found = store.load(ExecutionId::new()).await.unwrap();
        assert!(found.is_none());
    }
}
