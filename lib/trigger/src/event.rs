//! Normalized trigger events.
//!
//! The event ingestion layer (webhooks, UI actions) converts raw external
//! occurrences into this shape before handing them to the trigger service.
//! Events are immutable, transient inputs; this core never persists them.

use chrono::{DateTime, Utc};
use copper_pigeon_core::{ContactId, OrganizationId};
use copper_pigeon_workflow::TriggerEventType;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// A normalized business event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// The event type.
    pub event_type: TriggerEventType,
    /// The organization the event belongs to.
    pub organization_id: OrganizationId,
    /// The contact the event concerns.
    pub contact_id: ContactId,
    /// Type-specific payload map.
    #[serde(default)]
    pub payload: JsonValue,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl TriggerEvent {
    /// Creates an event with an arbitrary payload.
    #[must_use]
    pub fn new(
        event_type: TriggerEventType,
        organization_id: OrganizationId,
        contact_id: ContactId,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_type,
            organization_id,
            contact_id,
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// Creates a `contact_replied` event.
    #[must_use]
    pub fn contact_replied(
        organization_id: OrganizationId,
        contact_id: ContactId,
        message_content: impl Into<String>,
        message_type: impl Into<String>,
    ) -> Self {
        Self::new(
            TriggerEventType::ContactReplied,
            organization_id,
            contact_id,
            json!({
                "message_content": message_content.into(),
                "message_type": message_type.into(),
            }),
        )
    }

    /// Creates a `contact_added` event.
    #[must_use]
    pub fn contact_added(organization_id: OrganizationId, contact_id: ContactId) -> Self {
        Self::new(
            TriggerEventType::ContactAdded,
            organization_id,
            contact_id,
            json!({}),
        )
    }

    /// Creates a `tag_applied` event.
    #[must_use]
    pub fn tag_applied(
        organization_id: OrganizationId,
        contact_id: ContactId,
        tag: impl Into<String>,
    ) -> Self {
        Self::new(
            TriggerEventType::TagApplied,
            organization_id,
            contact_id,
            json!({ "tag": tag.into() }),
        )
    }

    /// Creates a `custom_field_changed` event.
    #[must_use]
    pub fn custom_field_changed(
        organization_id: OrganizationId,
        contact_id: ContactId,
        field_name: impl Into<String>,
        previous_value: JsonValue,
        new_value: JsonValue,
    ) -> Self {
        Self::new(
            TriggerEventType::CustomFieldChanged,
            organization_id,
            contact_id,
            json!({
                "field_name": field_name.into(),
                "previous_value": previous_value,
                "new_value": new_value,
            }),
        )
    }

    /// The inbound message content, for `contact_replied` events.
    #[must_use]
    pub fn message_content(&self) -> Option<&str> {
        self.payload.get("message_content").and_then(JsonValue::as_str)
    }

    /// The inbound message type, for `contact_replied` events.
    #[must_use]
    pub fn message_type(&self) -> Option<&str> {
        self.payload.get("message_type").and_then(JsonValue::as_str)
    }

    /// The applied tag name, for `tag_applied` events.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.payload.get("tag").and_then(JsonValue::as_str)
    }

    /// The changed field name, for `custom_field_changed` events.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.payload.get("field_name").and_then(JsonValue::as_str)
    }

    /// The before-value, for `custom_field_changed` events.
    #[must_use]
    pub fn previous_value(&self) -> Option<&JsonValue> {
        self.payload.get("previous_value")
    }

    /// The after-value, for `custom_field_changed` events.
    #[must_use]
    pub fn new_value(&self) -> Option<&JsonValue> {
        self.payload.get("new_value")
    }
}
