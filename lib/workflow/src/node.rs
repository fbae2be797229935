//! Workflow node types and configurations.
//!
//! Nodes are the building blocks of workflows. Each node has:
//! - A unique ID within the workflow
//! - A configuration that determines its type and behavior
//!
//! The configuration is a closed set of tagged variants, so adding a node
//! type is a compile-time-checked extension: every variant has exactly one
//! executor, and an unknown type cannot reach the engine.

use crate::condition::ConditionOperator;
use copper_pigeon_core::TagId;
use copper_pigeon_messaging::TemplateComponent;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// A unique identifier for a node within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// The type of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point; matched against inbound events by the trigger service.
    Trigger,
    /// Delivers a message to the contact through the channel provider.
    Message,
    /// Suspends the execution until a computed wake time.
    Delay,
    /// Routes to the `true` or `false` edge based on contact data.
    Condition,
    /// Requests a contact mutation (tags, fields).
    Action,
    /// Routes to one of several weighted branches.
    Split,
    /// Records a goal achievement.
    Goal,
}

/// The type of business event a trigger node listens for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEventType {
    /// The contact sent an inbound message.
    ContactReplied,
    /// The contact was created.
    ContactAdded,
    /// A tag was applied to the contact.
    TagApplied,
    /// A custom field on the contact changed value.
    CustomFieldChanged,
    /// Any other event type, matched by name.
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for TriggerEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContactReplied => write!(f, "contact_replied"),
            Self::ContactAdded => write!(f, "contact_added"),
            Self::TagApplied => write!(f, "tag_applied"),
            Self::CustomFieldChanged => write!(f, "custom_field_changed"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Optional filters narrowing which events a trigger node matches.
///
/// A filter that is not configured always passes; a trigger with no filters
/// matches every event of its type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerFilters {
    /// Keywords matched as case-sensitive substrings of the message content
    /// (`contact_replied` only). Empty means no keyword filtering.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Allowed inbound message types (`contact_replied` only).
    pub message_types: Option<Vec<String>>,
    /// Allow-list of tag names (`tag_applied` only).
    pub tags: Option<Vec<String>>,
    /// Exact field name to match (`custom_field_changed` only).
    pub field_name: Option<String>,
    /// Exact before-value to match (`custom_field_changed` only).
    pub previous_value: Option<JsonValue>,
    /// Exact after-value to match (`custom_field_changed` only).
    pub new_value: Option<JsonValue>,
}

/// Configuration for trigger nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerNodeConfig {
    /// The event type this trigger listens for.
    pub event_type: TriggerEventType,
    /// Optional event filters.
    #[serde(default)]
    pub filters: TriggerFilters,
}

/// Configuration for message nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageNodeConfig {
    /// Literal text with `{{field}}` placeholders.
    Text {
        /// The message body.
        body: String,
    },
    /// A pre-approved provider template.
    Template {
        /// Provider-side template identifier.
        template_id: String,
        /// Template language code.
        language: String,
        /// Structured template components.
        #[serde(default)]
        components: Vec<TemplateComponent>,
    },
    /// A media attachment with an optional caption.
    Media {
        /// URL of the media asset.
        url: String,
        /// Caption, rendered like a text body.
        caption: Option<String>,
    },
}

/// Time unit for delay nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

/// Configuration for delay nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayNodeConfig {
    /// How many units to wait.
    pub amount: u32,
    /// The unit of the wait.
    pub unit: DelayUnit,
}

impl DelayNodeConfig {
    /// Returns the configured wait as a duration.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            DelayUnit::Minutes => chrono::Duration::minutes(amount),
            DelayUnit::Hours => chrono::Duration::hours(amount),
            DelayUnit::Days => chrono::Duration::days(amount),
            DelayUnit::Weeks => chrono::Duration::weeks(amount),
        }
    }
}

/// Configuration for condition nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNodeConfig {
    /// The contact attribute to test.
    pub field: String,
    /// The comparison operator.
    pub operator: ConditionOperator,
    /// The comparison value.
    #[serde(default)]
    pub value: JsonValue,
}

/// Configuration for action nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionNodeConfig {
    /// Apply tags to the contact.
    AddTag {
        /// Tags to apply.
        tag_ids: Vec<TagId>,
    },
    /// Remove tags from the contact.
    RemoveTag {
        /// Tags to remove.
        tag_ids: Vec<TagId>,
    },
    /// Update a custom field on the contact.
    UpdateField {
        /// The field to update.
        field_name: String,
        /// The new value.
        value: JsonValue,
    },
}

/// One branch of a split node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitBranch {
    /// Branch identifier; outgoing edges address it as their handle.
    pub id: String,
    /// Percentage weight. Branch weights are expected to sum to 100, but
    /// selection normalizes over the configured total.
    pub weight: f64,
}

/// Configuration for split nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitNodeConfig {
    /// The weighted branches.
    pub branches: Vec<SplitBranch>,
}

/// Configuration for goal nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalNodeConfig {
    /// Goal name.
    pub name: String,
    /// Goal category (free-form, e.g. "conversion").
    pub goal_type: String,
    /// Optional notification target passed to the goal notifier.
    pub notify_target: Option<String>,
}

/// Configuration for a node, varying by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Trigger node configuration.
    Trigger(TriggerNodeConfig),
    /// Message node configuration.
    Message(MessageNodeConfig),
    /// Delay node configuration.
    Delay(DelayNodeConfig),
    /// Condition node configuration.
    Condition(ConditionNodeConfig),
    /// Action node configuration.
    Action(ActionNodeConfig),
    /// Split node configuration.
    Split(SplitNodeConfig),
    /// Goal node configuration.
    Goal(GoalNodeConfig),
}

impl NodeConfig {
    /// Returns the kind of this node configuration.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger(_) => NodeKind::Trigger,
            Self::Message(_) => NodeKind::Message,
            Self::Delay(_) => NodeKind::Delay,
            Self::Condition(_) => NodeKind::Condition,
            Self::Action(_) => NodeKind::Action,
            Self::Split(_) => NodeKind::Split,
            Self::Goal(_) => NodeKind::Goal,
        }
    }

    /// Returns true if this node selects among multiple outgoing edges.
    #[must_use]
    pub fn is_branching(&self) -> bool {
        matches!(self, Self::Condition(_) | Self::Split(_))
    }

    /// Returns the edge handles this node can produce, if it branches.
    #[must_use]
    pub fn produced_handles(&self) -> Option<Vec<String>> {
        match self {
            Self::Condition(_) => Some(vec![
                crate::edge::HANDLE_TRUE.to_string(),
                crate::edge::HANDLE_FALSE.to_string(),
            ]),
            Self::Split(config) => {
                Some(config.branches.iter().map(|b| b.id.clone()).collect())
            }
            _ => None,
        }
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the workflow.
    pub id: NodeId,
    /// Human-readable name for this node.
    pub name: String,
    /// Node configuration (determines type and behavior).
    pub config: NodeConfig,
}

impl Node {
    /// Creates a new node with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            config,
        }
    }

    /// Creates a new node with a specific ID.
    #[must_use]
    pub fn with_id(id: NodeId, name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id,
            name: name.into(),
            config,
        }
    }

    /// Returns the kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}
