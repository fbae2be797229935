//! Messaging-channel boundary for the copper-pigeon platform.
//!
//! The workflow engine delivers messages through an opaque channel provider.
//! This crate defines that boundary:
//!
//! - **Connector**: the `ChannelConnector` trait (text, template, and media
//!   sends, each returning a provider message identifier)
//! - **Credentials**: per-organization sender credentials, redacted in logs
//! - **Errors**: provider-level delivery failures, fatal to the execution
//!   that requested the send

pub mod connector;
pub mod credential;
pub mod error;

pub use connector::{ChannelConnector, ProviderMessageId, TemplateComponent};
pub use credential::ChannelCredentials;
pub use error::DeliveryError;
