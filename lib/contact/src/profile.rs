//! Contact profile types.
//!
//! A profile is the read-only view of a contact that node executors consume.
//! It carries the built-in attributes (name, email, channel address) plus
//! free-form custom fields, and exposes a flattened attribute map used by
//! template rendering and condition evaluation.

use copper_pigeon_core::ContactId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// The attribute view of a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactProfile {
    /// The contact this profile describes.
    pub contact_id: ContactId,
    /// Display name.
    pub display_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Deliverable messaging-channel address (e.g. a phone number).
    pub channel_address: Option<String>,
    /// Free-form custom fields.
    #[serde(default)]
    pub custom_fields: HashMap<String, JsonValue>,
}

impl ContactProfile {
    /// Creates an empty profile for a contact.
    #[must_use]
    pub fn new(contact_id: ContactId) -> Self {
        Self {
            contact_id,
            display_name: None,
            email: None,
            channel_address: None,
            custom_fields: HashMap::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the deliverable channel address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.channel_address = Some(address.into());
        self
    }

    /// Sets a custom field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.custom_fields.insert(name.into(), value);
        self
    }

    /// Returns true if the contact has an address a message can be sent to.
    #[must_use]
    pub fn has_deliverable_address(&self) -> bool {
        self.channel_address
            .as_deref()
            .is_some_and(|a| !a.is_empty())
    }

    /// Looks up a single attribute by token name.
    ///
    /// Built-in attributes (`name`, `email`, `address`) take precedence over
    /// custom fields of the same name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<JsonValue> {
        match name {
            "name" => self.display_name.clone().map(JsonValue::String),
            "email" => self.email.clone().map(JsonValue::String),
            "address" => self.channel_address.clone().map(JsonValue::String),
            other => self.custom_fields.get(other).cloned(),
        }
    }

    /// Returns the flattened attribute map.
    ///
    /// This is the data that template tokens and condition fields resolve
    /// against: built-ins first, then custom fields (built-ins win on
    /// collision).
    #[must_use]
    pub fn attributes(&self) -> HashMap<String, JsonValue> {
        let mut map: HashMap<String, JsonValue> = self.custom_fields.clone();
        if let Some(name) = &self.display_name {
            map.insert("name".to_string(), JsonValue::String(name.clone()));
        }
        if let Some(email) = &self.email {
            map.insert("email".to_string(), JsonValue::String(email.clone()));
        }
        if let Some(address) = &self.channel_address {
            map.insert("address".to_string(), JsonValue::String(address.clone()));
        }
        map
    }
}
