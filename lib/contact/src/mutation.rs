//! Contact mutation boundary.
//!
//! Workflow action nodes request tag and field changes through this trait.
//! The engine treats these calls as fire-and-forget: failures are logged by
//! the caller, never propagated as execution failures.

use crate::error::MutationError;
use async_trait::async_trait;
use copper_pigeon_core::{ContactId, TagId};
use serde_json::Value as JsonValue;

/// Capability for mutating contact data owned by an external collaborator.
#[async_trait]
pub trait ContactMutator: Send + Sync {
    /// Applies the given tags to a contact.
    async fn add_tags(&self, contact_id: ContactId, tag_ids: &[TagId])
    -> Result<(), MutationError>;

    /// Removes the given tags from a contact.
    async fn remove_tags(
        &self,
        contact_id: ContactId,
        tag_ids: &[TagId],
    ) -> Result<(), MutationError>;

    /// Updates a custom field on a contact.
    async fn update_field(
        &self,
        contact_id: ContactId,
        field_name: &str,
        value: &JsonValue,
    ) -> Result<(), MutationError>;
}
