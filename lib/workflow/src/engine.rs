//! The execution engine.
//!
//! The engine owns one workflow's graph and drives the step loop: start at
//! the trigger node, dispatch to the matching executor, follow the correct
//! outgoing edge, and persist execution state on suspension, completion, or
//! failure.
//!
//! The loop is iterative mutation of an explicit state machine, not
//! recursion: suspension maps to "serialize state, return" and resumption to
//! "deserialize state, continue". The engine performs no sleeping or timers;
//! resumption is driven externally by the scheduler.

use crate::context::{ExecutionContext, ExecutionStatus};
use crate::definition::Workflow;
use crate::error::EngineError;
use crate::executor::{self, EngineServices, NodeOutcome};
use crate::store::{ExecutionStore, InsertGuard};
use copper_pigeon_contact::ContactProfile;
use copper_pigeon_core::{ContactId, OrganizationId};
use copper_pigeon_messaging::ChannelCredentials;

/// Drives executions of a single workflow.
pub struct ExecutionEngine<S> {
    workflow: Workflow,
    store: S,
    services: EngineServices,
}

impl<S: ExecutionStore> ExecutionEngine<S> {
    /// Creates an engine for the given workflow.
    pub fn new(workflow: Workflow, store: S, services: EngineServices) -> Self {
        Self {
            workflow,
            store,
            services,
        }
    }

    /// Returns the workflow this engine executes.
    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Starts a new execution for a contact.
    ///
    /// Creates a fresh context at the trigger node and runs the step loop
    /// synchronously until the context reaches `waiting`, `completed`, or
    /// `failed`. There is no background continuation: the returned context
    /// is already in one of those states.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow has no trigger node, or if the store
    /// rejects the insert (including the active-execution guard for
    /// non-reentrant workflows).
    pub async fn start_execution(
        &self,
        contact_id: ContactId,
        organization_id: OrganizationId,
        profile: Option<ContactProfile>,
        credentials: Option<ChannelCredentials>,
    ) -> Result<ExecutionContext, EngineError> {
        let trigger = self
            .workflow
            .trigger_node()
            .ok_or(EngineError::MissingTriggerNode)?;

        let mut context =
            ExecutionContext::new(self.workflow.id, organization_id, contact_id, trigger.id);
        context.profile = profile;
        context.credentials = credentials;

        let guard = if self.workflow.settings.allow_reentry {
            InsertGuard::None
        } else {
            InsertGuard::NoActiveForContact
        };
        self.store.insert(&context, guard).await?;

        tracing::info!(
            workflow = %self.workflow.id,
            execution = %context.execution_id,
            contact = %contact_id,
            "starting execution"
        );
        self.run(&mut context).await?;
        Ok(context)
    }

    /// Resumes a waiting execution from its persisted cursor.
    ///
    /// The cursor was already advanced past the delay node at suspension
    /// time, so the loop continues at the delay's successor; the delay node
    /// is not re-executed.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is not waiting, or on storage failure.
    pub async fn resume_execution(
        &self,
        context: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        if context.status != ExecutionStatus::Waiting {
            return Err(EngineError::NotWaiting {
                status: context.status,
            });
        }

        context.wake();
        self.store.save(context).await?;

        tracing::info!(
            workflow = %self.workflow.id,
            execution = %context.execution_id,
            "resuming execution"
        );
        self.run(context).await
    }

    /// The step loop. Runs until the context leaves `running`, then persists.
    async fn run(&self, context: &mut ExecutionContext) -> Result<(), EngineError> {
        while context.status == ExecutionStatus::Running {
            let Some(node_id) = context.current_node else {
                // The previous node had no outgoing edge.
                context.complete();
                break;
            };

            let Some(node) = self.workflow.graph.get_node(node_id) else {
                context.fail(node_id, format!("Node not found: {node_id}"));
                break;
            };

            tracing::debug!(
                execution = %context.execution_id,
                node = %node_id,
                kind = ?node.kind(),
                "executing node"
            );

            match executor::execute_node(node, &self.workflow.graph, context, &self.services).await
            {
                Ok(NodeOutcome::Advance(next)) => {
                    context.record_step(node_id);
                    context.advance(next);
                }
                Ok(NodeOutcome::Suspend { wake_at, next }) => {
                    context.record_step(node_id);
                    context.suspend(wake_at, next);
                }
                Ok(NodeOutcome::Terminal) => {
                    context.record_step(node_id);
                    context.complete();
                }
                Err(error) => {
                    context.record_step(node_id);
                    context.fail(node_id, error.to_string());
                }
            }
        }

        self.store.save(context).await?;
        Ok(())
    }
}
