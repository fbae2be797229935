//! Channel connector trait and related types.
//!
//! The connector is a capability the engine receives, not one it constructs:
//! production wires a real provider client, tests substitute an in-memory
//! fake without global state.

use crate::credential::ChannelCredentials;
use crate::error::DeliveryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A message identifier issued by the provider on successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMessageId(pub String);

impl ProviderMessageId {
    /// Creates a provider message ID from the provider's raw identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A structured component of a pre-approved message template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateComponent {
    /// Component kind understood by the provider (e.g. "header", "body").
    pub component_type: String,
    /// Component parameters, passed through to the provider verbatim.
    #[serde(default)]
    pub parameters: Vec<JsonValue>,
}

impl TemplateComponent {
    /// Creates a component with no parameters.
    #[must_use]
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: JsonValue) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Capability for delivering messages to an external contact address.
///
/// All sends return a provider message identifier on success. Any error is
/// treated by the engine as fatal to the current execution.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Sends a plain text message.
    async fn send_text(
        &self,
        credentials: &ChannelCredentials,
        address: &str,
        body: &str,
    ) -> Result<ProviderMessageId, DeliveryError>;

    /// Sends a pre-approved template message.
    async fn send_template(
        &self,
        credentials: &ChannelCredentials,
        address: &str,
        template_id: &str,
        language: &str,
        components: &[TemplateComponent],
    ) -> Result<ProviderMessageId, DeliveryError>;

    /// Sends a media message with an optional caption.
    async fn send_media(
        &self,
        credentials: &ChannelCredentials,
        address: &str,
        media_url: &str,
        caption: Option<&str>,
    ) -> Result<ProviderMessageId, DeliveryError>;
}
