//! Error types for the messaging crate.

use std::fmt;

/// Errors from message delivery operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection to the provider failed.
    ConnectionFailed { reason: String },
    /// The provider rejected the credentials.
    AuthenticationFailed { reason: String },
    /// The destination address was rejected as undeliverable.
    InvalidAddress { address: String },
    /// The provider rejected the message.
    ProviderRejected {
        code: Option<u32>,
        message: String,
    },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Timeout waiting for the provider.
    Timeout,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "connection failed: {reason}")
            }
            Self::AuthenticationFailed { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            Self::InvalidAddress { address } => {
                write!(f, "undeliverable address: {address}")
            }
            Self::ProviderRejected { code, message } => {
                if let Some(code) = code {
                    write!(f, "provider rejected message ({code}): {message}")
                } else {
                    write!(f, "provider rejected message: {message}")
                }
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::Timeout => write!(f, "delivery timed out"),
        }
    }
}

impl std::error::Error for DeliveryError {}
