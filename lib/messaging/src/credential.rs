//! Channel credentials.
//!
//! Credentials identify the sending account at the provider. The access
//! token never appears in Debug output or logs.

use serde::{Deserialize, Serialize};

/// Credentials for one messaging-channel sender account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredentials {
    /// Provider-side identifier of the sending account.
    pub sender_id: String,
    /// Access token authorizing sends from this account.
    pub access_token: String,
}

impl ChannelCredentials {
    /// Creates credentials for a sender account.
    #[must_use]
    pub fn new(sender_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCredentials")
            .field("sender_id", &self.sender_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
