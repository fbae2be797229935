//! Error types for the contact crate.

use copper_pigeon_core::ContactId;
use std::fmt;

/// Errors from contact mutation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The contact does not exist.
    ContactNotFound { contact_id: ContactId },
    /// The collaborator rejected the mutation.
    Rejected { reason: String },
    /// The collaborator could not be reached.
    Unavailable { reason: String },
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContactNotFound { contact_id } => {
                write!(f, "contact not found: {contact_id}")
            }
            Self::Rejected { reason } => {
                write!(f, "mutation rejected: {reason}")
            }
            Self::Unavailable { reason } => {
                write!(f, "contact store unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for MutationError {}
