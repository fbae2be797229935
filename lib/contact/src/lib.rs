//! Contact domain types for the copper-pigeon platform.
//!
//! This crate provides:
//!
//! - **Profiles**: the attribute view of a contact that node executors read
//!   (template rendering, condition evaluation, deliverable address)
//! - **Mutations**: the boundary through which workflow actions request
//!   tag and custom-field changes without owning contact storage

pub mod error;
pub mod mutation;
pub mod profile;

pub use error::MutationError;
pub use mutation::ContactMutator;
pub use profile::ContactProfile;
