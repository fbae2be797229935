//! Per-event trigger evaluation.
//!
//! `evaluate_triggers` loads every active workflow for the event's
//! organization and returns one result per workflow, including the
//! non-triggered ones: the reason string is load-bearing for support and
//! debugging tooling built on top of this core.
//!
//! Storage errors fail closed: a transient data-layer error must never be
//! interpreted as "trigger everything", so the service returns no triggers
//! rather than raising.

use crate::event::TriggerEvent;
use crate::reentry;
use copper_pigeon_contact::ContactProfile;
use copper_pigeon_core::WorkflowId;
use copper_pigeon_messaging::ChannelCredentials;
use copper_pigeon_workflow::node::TriggerNodeConfig;
use copper_pigeon_workflow::{
    EngineServices, ExecutionContext, ExecutionEngine, ExecutionStore, NodeConfig,
    TriggerEventType, Workflow, WorkflowStore,
};
use serde::{Deserialize, Serialize};

/// The outcome of evaluating one workflow against one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// The workflow should start a new execution.
    Triggered,
    /// The workflow does not match, with an inspectable reason.
    NotTriggered { reason: String },
}

/// Per-workflow evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvaluation {
    /// The evaluated workflow.
    pub workflow_id: WorkflowId,
    /// Whether it triggered, and why not if it didn't.
    pub outcome: TriggerOutcome,
}

impl TriggerEvaluation {
    /// Returns true if the workflow triggered.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.outcome == TriggerOutcome::Triggered
    }

    /// Returns the non-trigger reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            TriggerOutcome::Triggered => None,
            TriggerOutcome::NotTriggered { reason } => Some(reason),
        }
    }

    fn not_triggered(workflow_id: WorkflowId, reason: impl Into<String>) -> Self {
        Self {
            workflow_id,
            outcome: TriggerOutcome::NotTriggered {
                reason: reason.into(),
            },
        }
    }
}

/// Evaluates inbound events against an organization's active workflows.
pub struct TriggerService<W, E> {
    workflows: W,
    executions: E,
}

impl<W, E> TriggerService<W, E>
where
    W: WorkflowStore,
    E: ExecutionStore,
{
    /// Creates a trigger service over the given stores.
    pub fn new(workflows: W, executions: E) -> Self {
        Self {
            workflows,
            executions,
        }
    }

    /// Evaluates an event against every active workflow of its organization.
    ///
    /// Returns one result per workflow. On storage error, returns an empty
    /// list (fail closed).
    pub async fn evaluate_triggers(&self, event: &TriggerEvent) -> Vec<TriggerEvaluation> {
        let workflows = match self.workflows.list_active(event.organization_id).await {
            Ok(workflows) => workflows,
            Err(error) => {
                tracing::warn!(
                    organization = %event.organization_id,
                    %error,
                    "workflow lookup failed, returning no triggers"
                );
                return Vec::new();
            }
        };

        self.evaluate_against(&workflows, event).await
    }

    /// Evaluates the event against each workflow independently.
    async fn evaluate_against(
        &self,
        workflows: &[Workflow],
        event: &TriggerEvent,
    ) -> Vec<TriggerEvaluation> {
        let evaluations = workflows
            .iter()
            .map(|workflow| self.evaluate_workflow(workflow, event));
        futures::future::join_all(evaluations).await
    }

    /// Evaluates one workflow: trigger node, type, filters, then re-entry.
    async fn evaluate_workflow(
        &self,
        workflow: &Workflow,
        event: &TriggerEvent,
    ) -> TriggerEvaluation {
        let Some(trigger) = workflow.trigger_node() else {
            return TriggerEvaluation::not_triggered(workflow.id, "No trigger node found");
        };
        let NodeConfig::Trigger(config) = &trigger.config else {
            return TriggerEvaluation::not_triggered(workflow.id, "No trigger node found");
        };

        if config.event_type != event.event_type {
            return TriggerEvaluation::not_triggered(workflow.id, "Trigger type mismatch");
        }

        if let Some(reason) = filter_mismatch(config, event) {
            return TriggerEvaluation::not_triggered(workflow.id, reason);
        }

        match reentry::can_contact_enter_workflow(
            &self.executions,
            workflow.id,
            event.contact_id,
            &workflow.settings,
        )
        .await
        {
            Ok(true) => TriggerEvaluation {
                workflow_id: workflow.id,
                outcome: TriggerOutcome::Triggered,
            },
            Ok(false) => TriggerEvaluation::not_triggered(
                workflow.id,
                "Contact not eligible for re-entry",
            ),
            Err(error) => {
                tracing::warn!(
                    workflow = %workflow.id,
                    contact = %event.contact_id,
                    %error,
                    "eligibility check failed, not triggering"
                );
                TriggerEvaluation::not_triggered(workflow.id, "Eligibility check failed")
            }
        }
    }
}

impl<W, E> TriggerService<W, E>
where
    W: WorkflowStore,
    E: ExecutionStore + Clone,
{
    /// Evaluates an event and starts an execution for every triggered
    /// workflow.
    ///
    /// The caller supplies the contact's profile and channel credentials,
    /// which are attached to each started execution. Engine failures on one
    /// workflow are logged and do not prevent the others from starting.
    pub async fn dispatch_event(
        &self,
        event: &TriggerEvent,
        services: &EngineServices,
        profile: Option<ContactProfile>,
        credentials: Option<ChannelCredentials>,
    ) -> Vec<ExecutionContext> {
        let workflows = match self.workflows.list_active(event.organization_id).await {
            Ok(workflows) => workflows,
            Err(error) => {
                tracing::warn!(
                    organization = %event.organization_id,
                    %error,
                    "workflow lookup failed, dispatching nothing"
                );
                return Vec::new();
            }
        };

        let evaluations = self.evaluate_against(&workflows, event).await;

        let mut started = Vec::new();
        for (workflow, evaluation) in workflows.iter().zip(&evaluations) {
            if let Some(reason) = evaluation.reason() {
                tracing::debug!(workflow = %workflow.id, reason, "workflow not triggered");
                continue;
            }

            let engine = ExecutionEngine::new(
                workflow.clone(),
                self.executions.clone(),
                services.clone(),
            );
            match engine
                .start_execution(
                    event.contact_id,
                    event.organization_id,
                    profile.clone(),
                    credentials.clone(),
                )
                .await
            {
                Ok(context) => started.push(context),
                Err(error) => {
                    tracing::warn!(
                        workflow = %workflow.id,
                        contact = %event.contact_id,
                        %error,
                        "failed to start triggered execution"
                    );
                }
            }
        }
        started
    }
}

/// Checks the trigger's configured filters against the event payload.
///
/// Returns the mismatch reason, or `None` when every configured filter
/// passes. A trigger with no filters matches vacuously.
fn filter_mismatch(config: &TriggerNodeConfig, event: &TriggerEvent) -> Option<String> {
    let filters = &config.filters;

    match &event.event_type {
        TriggerEventType::ContactReplied => {
            if !filters.keywords.is_empty() {
                // Never a match on absent data.
                let Some(content) = event.message_content() else {
                    return Some("Message content missing".to_string());
                };
                let matched = filters
                    .keywords
                    .iter()
                    .any(|keyword| content.contains(keyword.as_str()));
                if !matched {
                    return Some("No keyword matched".to_string());
                }
            }

            if let Some(allowed) = &filters.message_types {
                let matched = event
                    .message_type()
                    .is_some_and(|t| allowed.iter().any(|a| a == t));
                if !matched {
                    return Some("Message type not allowed".to_string());
                }
            }
        }
        TriggerEventType::TagApplied => {
            if let Some(allowed) = &filters.tags {
                let matched = event.tag().is_some_and(|t| allowed.iter().any(|a| a == t));
                if !matched {
                    return Some("Tag not in allowed list".to_string());
                }
            }
        }
        TriggerEventType::CustomFieldChanged => {
            if let Some(field) = &filters.field_name
                && event.field_name() != Some(field.as_str())
            {
                return Some("Field name mismatch".to_string());
            }
            if let Some(expected) = &filters.previous_value
                && event.previous_value() != Some(expected)
            {
                return Some("Previous value mismatch".to_string());
            }
            if let Some(expected) = &filters.new_value
                && event.new_value() != Some(expected)
            {
                return Some("New value mismatch".to_string());
            }
        }
        TriggerEventType::ContactAdded | TriggerEventType::Other(_) => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use copper_pigeon_contact::{ContactMutator, MutationError};
    use copper_pigeon_core::{ContactId, OrganizationId, TagId};
    use copper_pigeon_messaging::{
        ChannelConnector, DeliveryError, ProviderMessageId, TemplateComponent,
    };
    use copper_pigeon_store::MemoryStore;
    use copper_pigeon_workflow::node::{TriggerFilters, TriggerNodeConfig};
    use copper_pigeon_workflow::{
        Edge, ExecutionStatus, Node, StoreError, WorkflowSettings,
    };
    use serde_json::{Value as JsonValue, json};
    use std::sync::Arc;

    fn workflow_with_trigger(
        organization_id: OrganizationId,
        event_type: TriggerEventType,
        filters: TriggerFilters,
    ) -> Workflow {
        let mut workflow = Workflow::new(organization_id, "Test Workflow");
        workflow.graph.add_node(Node::new(
            "Entry",
            NodeConfig::Trigger(TriggerNodeConfig {
                event_type,
                filters,
            }),
        ));
        workflow
    }

    async fn service_with(
        workflows: Vec<Workflow>,
    ) -> TriggerService<Arc<MemoryStore>, Arc<MemoryStore>> {
        let store = Arc::new(MemoryStore::new());
        for workflow in workflows {
            store.put_workflow(workflow).await;
        }
        TriggerService::new(Arc::clone(&store), store)
    }

    #[tokio::test]
    async fn one_result_per_active_workflow() {
        let organization_id = OrganizationId::new();
        let matching = workflow_with_trigger(
            organization_id,
            TriggerEventType::ContactAdded,
            TriggerFilters::default(),
        );
        let mismatched = workflow_with_trigger(
            organization_id,
            TriggerEventType::TagApplied,
            TriggerFilters::default(),
        );
        let matching_id = matching.id;

        let service = service_with(vec![matching, mismatched]).await;
        let event = TriggerEvent::contact_added(organization_id, ContactId::new());

        let evaluations = service.evaluate_triggers(&event).await;
        assert_eq!(evaluations.len(), 2);

        for evaluation in &evaluations {
            if evaluation.workflow_id == matching_id {
                assert!(evaluation.triggered());
            } else {
                assert!(!evaluation.triggered());
                assert_eq!(evaluation.reason(), Some("Trigger type mismatch"));
            }
        }
    }

    #[tokio::test]
    async fn inactive_workflows_are_not_evaluated() {
        let organization_id = OrganizationId::new();
        let mut inactive = workflow_with_trigger(
            organization_id,
            TriggerEventType::ContactAdded,
            TriggerFilters::default(),
        );
        inactive.deactivate();

        let service = service_with(vec![inactive]).await;
        let event = TriggerEvent::contact_added(organization_id, ContactId::new());

        assert!(service.evaluate_triggers(&event).await.is_empty());
    }

    #[tokio::test]
    async fn workflow_without_trigger_node_has_reason() {
        let organization_id = OrganizationId::new();
        let empty = Workflow::new(organization_id, "No Entry");

        let service = service_with(vec![empty]).await;
        let event = TriggerEvent::contact_added(organization_id, ContactId::new());

        let evaluations = service.evaluate_triggers(&event).await;
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].reason(), Some("No trigger node found"));
    }

    #[tokio::test]
    async fn keyword_filter_matches_substring() {
        let organization_id = OrganizationId::new();
        let filters = TriggerFilters {
            keywords: vec!["STOP".to_string()],
            ..TriggerFilters::default()
        };
        let workflow =
            workflow_with_trigger(organization_id, TriggerEventType::ContactReplied, filters);

        let service = service_with(vec![workflow]).await;

        let hit = TriggerEvent::contact_replied(
            organization_id,
            ContactId::new(),
            "please STOP now",
            "text",
        );
        assert!(service.evaluate_triggers(&hit).await[0].triggered());

        // Case-sensitive substring match.
        let miss = TriggerEvent::contact_replied(
            organization_id,
            ContactId::new(),
            "please stop now",
            "text",
        );
        let evaluations = service.evaluate_triggers(&miss).await;
        assert_eq!(evaluations[0].reason(), Some("No keyword matched"));
    }

    #[tokio::test]
    async fn keyword_filter_never_matches_absent_content() {
        let organization_id = OrganizationId::new();
        let filters = TriggerFilters {
            keywords: vec!["STOP".to_string()],
            ..TriggerFilters::default()
        };
        let workflow =
            workflow_with_trigger(organization_id, TriggerEventType::ContactReplied, filters);

        let service = service_with(vec![workflow]).await;
        let event = TriggerEvent::new(
            TriggerEventType::ContactReplied,
            organization_id,
            ContactId::new(),
            json!({ "message_type": "text" }),
        );

        let evaluations = service.evaluate_triggers(&event).await;
        assert_eq!(evaluations[0].reason(), Some("Message content missing"));
    }

    #[tokio::test]
    async fn message_type_filter() {
        let organization_id = OrganizationId::new();
        let filters = TriggerFilters {
            message_types: Some(vec!["text".to_string()]),
            ..TriggerFilters::default()
        };
        let workflow =
            workflow_with_trigger(organization_id, TriggerEventType::ContactReplied, filters);

        let service = service_with(vec![workflow]).await;

        let text =
            TriggerEvent::contact_replied(organization_id, ContactId::new(), "hello", "text");
        assert!(service.evaluate_triggers(&text).await[0].triggered());

        let image =
            TriggerEvent::contact_replied(organization_id, ContactId::new(), "hello", "image");
        let evaluations = service.evaluate_triggers(&image).await;
        assert_eq!(evaluations[0].reason(), Some("Message type not allowed"));
    }

    #[tokio::test]
    async fn tag_allow_list_filter() {
        let organization_id = OrganizationId::new();
        let filters = TriggerFilters {
            tags: Some(vec!["vip".to_string(), "beta".to_string()]),
            ..TriggerFilters::default()
        };
        let workflow =
            workflow_with_trigger(organization_id, TriggerEventType::TagApplied, filters);

        let service = service_with(vec![workflow]).await;

        let vip = TriggerEvent::tag_applied(organization_id, ContactId::new(), "vip");
        assert!(service.evaluate_triggers(&vip).await[0].triggered());

        let churned = TriggerEvent::tag_applied(organization_id, ContactId::new(), "churned");
        let evaluations = service.evaluate_triggers(&churned).await;
        assert_eq!(evaluations[0].reason(), Some("Tag not in allowed list"));
    }

    #[tokio::test]
    async fn custom_field_filters() {
        let organization_id = OrganizationId::new();
        let filters = TriggerFilters {
            field_name: Some("plan".to_string()),
            previous_value: Some(json!("free")),
            new_value: Some(json!("pro")),
            ..TriggerFilters::default()
        };
        let workflow = workflow_with_trigger(
            organization_id,
            TriggerEventType::CustomFieldChanged,
            filters,
        );

        let service = service_with(vec![workflow]).await;

        let upgrade = TriggerEvent::custom_field_changed(
            organization_id,
            ContactId::new(),
            "plan",
            json!("free"),
            json!("pro"),
        );
        assert!(service.evaluate_triggers(&upgrade).await[0].triggered());

        let wrong_field = TriggerEvent::custom_field_changed(
            organization_id,
            ContactId::new(),
            "region",
            json!("free"),
            json!("pro"),
        );
        assert_eq!(
            service.evaluate_triggers(&wrong_field).await[0].reason(),
            Some("Field name mismatch")
        );

        let wrong_target = TriggerEvent::custom_field_changed(
            organization_id,
            ContactId::new(),
            "plan",
            json!("free"),
            json!("enterprise"),
        );
        assert_eq!(
            service.evaluate_triggers(&wrong_target).await[0].reason(),
            Some("New value mismatch")
        );
    }

    #[tokio::test]
    async fn unfiltered_trigger_matches_vacuously() {
        let organization_id = OrganizationId::new();
        let workflow = workflow_with_trigger(
            organization_id,
            TriggerEventType::ContactReplied,
            TriggerFilters::default(),
        );

        let service = service_with(vec![workflow]).await;
        let event = TriggerEvent::contact_replied(
            organization_id,
            ContactId::new(),
            "anything at all",
            "sticker",
        );
        assert!(service.evaluate_triggers(&event).await[0].triggered());
    }

    #[tokio::test]
    async fn ineligible_contact_has_reentry_reason() {
        let organization_id = OrganizationId::new();
        let mut workflow = workflow_with_trigger(
            organization_id,
            TriggerEventType::ContactAdded,
            TriggerFilters::default(),
        );
        workflow.settings = WorkflowSettings {
            allow_reentry: false,
            max_executions_per_contact: None,
            ..WorkflowSettings::default()
        };
        let workflow_id = workflow.id;
        let contact_id = ContactId::new();

        let store = Arc::new(MemoryStore::new());
        store.put_workflow(workflow).await;

        // Simulate an active execution for this contact.
        let context = ExecutionContext::new(
            workflow_id,
            organization_id,
            contact_id,
            copper_pigeon_workflow::NodeId::new(),
        );
        store
            .insert(&context, copper_pigeon_workflow::InsertGuard::None)
            .await
            .unwrap();

        let service = TriggerService::new(Arc::clone(&store), store);
        let event = TriggerEvent::contact_added(organization_id, contact_id);

        let evaluations = service.evaluate_triggers(&event).await;
        assert_eq!(
            evaluations[0].reason(),
            Some("Contact not eligible for re-entry")
        );

        // A different contact is unaffected.
        let other = TriggerEvent::contact_added(organization_id, ContactId::new());
        assert!(service.evaluate_triggers(&other).await[0].triggered());
    }

    /// Workflow store that always fails.
    struct FailingWorkflowStore;

    #[async_trait]
    impl WorkflowStore for FailingWorkflowStore {
        async fn get(
            &self,
            _workflow_id: WorkflowId,
        ) -> Result<Option<Workflow>, StoreError> {
            Err(StoreError::Backend {
                reason: "down".to_string(),
            })
        }

        async fn list_active(
            &self,
            _organization_id: OrganizationId,
        ) -> Result<Vec<Workflow>, StoreError> {
            Err(StoreError::Backend {
                reason: "down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn storage_error_fails_closed() {
        let executions = Arc::new(MemoryStore::new());
        let service = TriggerService::new(FailingWorkflowStore, executions);
        let event = TriggerEvent::contact_added(OrganizationId::new(), ContactId::new());

        assert!(service.evaluate_triggers(&event).await.is_empty());
    }

    /// No-op channel connector for dispatch tests.
    struct NullChannel;

    #[async_trait]
    impl ChannelConnector for NullChannel {
        async fn send_text(
            &self,
            _credentials: &copper_pigeon_messaging::ChannelCredentials,
            _address: &str,
            _body: &str,
        ) -> Result<ProviderMessageId, DeliveryError> {
            Ok(ProviderMessageId::new("noop"))
        }

        async fn send_template(
            &self,
            _credentials: &copper_pigeon_messaging::ChannelCredentials,
            _address: &str,
            _template_id: &str,
            _language: &str,
            _components: &[TemplateComponent],
        ) -> Result<ProviderMessageId, DeliveryError> {
            Ok(ProviderMessageId::new("noop"))
        }

        async fn send_media(
            &self,
            _credentials: &copper_pigeon_messaging::ChannelCredentials,
            _address: &str,
            _media_url: &str,
            _caption: Option<&str>,
        ) -> Result<ProviderMessageId, DeliveryError> {
            Ok(ProviderMessageId::new("noop"))
        }
    }

    /// No-op contact mutator for dispatch tests.
    struct NullMutator;

    #[async_trait]
    impl ContactMutator for NullMutator {
        async fn add_tags(
            &self,
            _contact_id: ContactId,
            _tag_ids: &[TagId],
        ) -> Result<(), MutationError> {
            Ok(())
        }

        async fn remove_tags(
            &self,
            _contact_id: ContactId,
            _tag_ids: &[TagId],
        ) -> Result<(), MutationError> {
            Ok(())
        }

        async fn update_field(
            &self,
            _contact_id: ContactId,
            _field_name: &str,
            _value: &JsonValue,
        ) -> Result<(), MutationError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_starts_executions_for_triggered_workflows() {
        let organization_id = OrganizationId::new();
        let mut matching = workflow_with_trigger(
            organization_id,
            TriggerEventType::ContactAdded,
            TriggerFilters::default(),
        );
        // Give the matching workflow one step after the trigger.
        let trigger_id = matching.trigger_node().unwrap().id;
        let action_id = matching.graph.add_node(Node::new(
            "Tag",
            NodeConfig::Action(copper_pigeon_workflow::node::ActionNodeConfig::AddTag {
                tag_ids: vec![TagId::new()],
            }),
        ));
        matching
            .graph
            .add_edge(trigger_id, action_id, Edge::plain())
            .unwrap();

        let mismatched = workflow_with_trigger(
            organization_id,
            TriggerEventType::TagApplied,
            TriggerFilters::default(),
        );
        let matching_id = matching.id;

        let store = Arc::new(MemoryStore::new());
        store.put_workflow(matching).await;
        store.put_workflow(mismatched).await;
        let service = TriggerService::new(Arc::clone(&store), Arc::clone(&store));

        let services = EngineServices::new(Arc::new(NullChannel), Arc::new(NullMutator));
        let event = TriggerEvent::contact_added(organization_id, ContactId::new());

        let started = service
            .dispatch_event(&event, &services, None, None)
            .await;

        assert_eq!(started.len(), 1);
        assert_eq!(started[0].workflow_id, matching_id);
        assert_eq!(started[0].status, ExecutionStatus::Completed);
        assert_eq!(started[0].path.len(), 2);

        // The execution was persisted.
        let stored = store.load(started[0].execution_id).await.unwrap();
        assert_eq!(stored.map(|c| c.status), Some(ExecutionStatus::Completed));
    }
}
