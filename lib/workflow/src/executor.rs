//! Node executors.
//!
//! One execution strategy per node type, dispatched over the closed
//! `NodeConfig` variants. Each executor consumes the execution context and
//! the node's configuration and returns a `NodeOutcome`: advance to a
//! successor, suspend until a wake time, or end the workflow.
//!
//! Only the message executor calls an external, fallible collaborator and
//! can fail the execution. Everything else degrades to a safe default:
//! contact-mutation and notification failures are logged and swallowed,
//! malformed configuration falls through without crashing the run.

use crate::condition;
use crate::context::ExecutionContext;
use crate::edge::{HANDLE_FALSE, HANDLE_TRUE};
use crate::error::ExecError;
use crate::graph::WorkflowGraph;
use crate::node::{
    ActionNodeConfig, MessageNodeConfig, Node, NodeConfig, NodeId,
};
use crate::render;
use crate::split::{self, RandomSource, ThreadRandom};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copper_pigeon_contact::ContactMutator;
use copper_pigeon_messaging::ChannelConnector;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// What a node executor instructs the step loop to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Continue at the given node; `None` completes the workflow.
    Advance(Option<NodeId>),
    /// Persist and return; the scheduler resumes at `next` after `wake_at`.
    Suspend {
        wake_at: DateTime<Utc>,
        next: Option<NodeId>,
    },
    /// The workflow ends here.
    Terminal,
}

/// A recorded goal achievement, stored in the execution's scratch space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    /// Goal name.
    pub name: String,
    /// Goal category.
    pub goal_type: String,
    /// When the goal was reached.
    pub achieved_at: DateTime<Utc>,
}

/// Error from a goal notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError {
    /// What the collaborator reported.
    pub reason: String,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "goal notification failed: {}", self.reason)
    }
}

impl std::error::Error for NotifyError {}

/// Capability for signaling goal achievements to an external target.
#[async_trait]
pub trait GoalNotifier: Send + Sync {
    /// Notifies the target that a goal was reached.
    async fn goal_achieved(
        &self,
        context: &ExecutionContext,
        record: &GoalRecord,
        target: &str,
    ) -> Result<(), NotifyError>;
}

/// The injected collaborators node executors depend on.
///
/// These are capabilities the engine receives, not ones it constructs, so
/// tests substitute in-memory fakes without global state.
#[derive(Clone)]
pub struct EngineServices {
    /// Messaging-channel provider.
    pub channel: Arc<dyn ChannelConnector>,
    /// Contact-mutation collaborator.
    pub contacts: Arc<dyn ContactMutator>,
    /// Optional goal notification collaborator.
    pub goals: Option<Arc<dyn GoalNotifier>>,
    /// Random source for split-branch selection.
    pub random: Arc<dyn RandomSource>,
}

impl EngineServices {
    /// Creates services with the required collaborators and default
    /// randomness.
    #[must_use]
    pub fn new(channel: Arc<dyn ChannelConnector>, contacts: Arc<dyn ContactMutator>) -> Self {
        Self {
            channel,
            contacts,
            goals: None,
            random: Arc::new(ThreadRandom),
        }
    }

    /// Attaches a goal notifier.
    #[must_use]
    pub fn with_goal_notifier(mut self, goals: Arc<dyn GoalNotifier>) -> Self {
        self.goals = Some(goals);
        self
    }

    /// Replaces the random source (seeded or fixed-sequence in tests).
    #[must_use]
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }
}

/// Executes one node and returns the step-loop instruction.
pub(crate) async fn execute_node(
    node: &Node,
    graph: &WorkflowGraph,
    context: &mut ExecutionContext,
    services: &EngineServices,
) -> Result<NodeOutcome, ExecError> {
    match &node.config {
        NodeConfig::Trigger(_) => {
            // Entry point is a pass-through; matching happened upstream.
            Ok(NodeOutcome::Advance(graph.successor(node.id)))
        }
        NodeConfig::Message(config) => execute_message(node, config, graph, context, services).await,
        NodeConfig::Delay(config) => {
            let wake_at = Utc::now() + config.duration();
            Ok(NodeOutcome::Suspend {
                wake_at,
                next: graph.successor(node.id),
            })
        }
        NodeConfig::Condition(config) => {
            let data = context
                .profile
                .as_ref()
                .map(|profile| profile.attributes())
                .unwrap_or_default();
            let result = condition::evaluate(&data, &config.field, config.operator, &config.value);
            context.record_scratch(node.id, JsonValue::Bool(result));

            let handle = if result { HANDLE_TRUE } else { HANDLE_FALSE };
            Ok(NodeOutcome::Advance(
                graph.successor_via_handle(node.id, handle),
            ))
        }
        NodeConfig::Action(config) => {
            execute_action(node, config, context, services).await;
            Ok(NodeOutcome::Advance(graph.successor(node.id)))
        }
        NodeConfig::Split(config) => {
            match split::pick_branch(&config.branches, services.random.as_ref()) {
                Some(branch) => {
                    let next = graph.successor_via_handle(node.id, branch);
                    context.record_scratch(node.id, JsonValue::String(branch.to_string()));
                    Ok(NodeOutcome::Advance(next))
                }
                None => {
                    tracing::warn!(node = %node.id, "split node has no branches, ending path");
                    Ok(NodeOutcome::Advance(None))
                }
            }
        }
        NodeConfig::Goal(config) => {
            let record = GoalRecord {
                name: config.name.clone(),
                goal_type: config.goal_type.clone(),
                achieved_at: Utc::now(),
            };
            context.record_scratch(
                node.id,
                serde_json::to_value(&record).unwrap_or(JsonValue::Null),
            );

            if let (Some(notifier), Some(target)) = (&services.goals, &config.notify_target)
                && let Err(error) = notifier.goal_achieved(context, &record, target).await
            {
                tracing::warn!(node = %node.id, %error, "goal notification failed, continuing");
            }

            match graph.successor(node.id) {
                Some(next) => Ok(NodeOutcome::Advance(Some(next))),
                None => Ok(NodeOutcome::Terminal),
            }
        }
    }
}

/// Delivers a message to the contact.
///
/// A contact with no deliverable address skips the send but still advances;
/// a provider-level error fails the execution.
async fn execute_message(
    node: &Node,
    config: &MessageNodeConfig,
    graph: &WorkflowGraph,
    context: &ExecutionContext,
    services: &EngineServices,
) -> Result<NodeOutcome, ExecError> {
    let next = graph.successor(node.id);

    let Some(profile) = &context.profile else {
        tracing::warn!(node = %node.id, contact = %context.contact_id, "no profile, skipping send");
        return Ok(NodeOutcome::Advance(next));
    };
    let Some(address) = profile.channel_address.as_deref().filter(|a| !a.is_empty()) else {
        tracing::warn!(node = %node.id, contact = %context.contact_id, "no deliverable address, skipping send");
        return Ok(NodeOutcome::Advance(next));
    };
    let Some(credentials) = &context.credentials else {
        tracing::warn!(node = %node.id, contact = %context.contact_id, "no channel credentials, skipping send");
        return Ok(NodeOutcome::Advance(next));
    };

    let result = match config {
        MessageNodeConfig::Text { body } => {
            let body = render::render(body, profile);
            services.channel.send_text(credentials, address, &body).await
        }
        MessageNodeConfig::Template {
            template_id,
            language,
            components,
        } => {
            services
                .channel
                .send_template(credentials, address, template_id, language, components)
                .await
        }
        MessageNodeConfig::Media { url, caption } => {
            let caption = caption.as_ref().map(|c| render::render(c, profile));
            services
                .channel
                .send_media(credentials, address, url, caption.as_deref())
                .await
        }
    };

    match result {
        Ok(message_id) => {
            tracing::debug!(node = %node.id, %message_id, "message delivered");
            Ok(NodeOutcome::Advance(next))
        }
        Err(error) => Err(ExecError::Delivery {
            node_id: node.id,
            error,
        }),
    }
}

/// Requests a contact mutation. Fire-and-forget: failures are logged, never
/// propagated as execution failures.
async fn execute_action(
    node: &Node,
    config: &ActionNodeConfig,
    context: &ExecutionContext,
    services: &EngineServices,
) {
    let result = match config {
        ActionNodeConfig::AddTag { tag_ids } => {
            services.contacts.add_tags(context.contact_id, tag_ids).await
        }
        ActionNodeConfig::RemoveTag { tag_ids } => {
            services
                .contacts
                .remove_tags(context.contact_id, tag_ids)
                .await
        }
        ActionNodeConfig::UpdateField { field_name, value } => {
            services
                .contacts
                .update_field(context.contact_id, field_name, value)
                .await
        }
    };

    if let Err(error) = result {
        tracing::warn!(node = %node.id, contact = %context.contact_id, %error, "contact mutation failed, continuing");
    }
}
