//! Core domain types and utilities for the copper-pigeon platform.
//!
//! This crate provides the foundational identifier types and error handling
//! used throughout the copper-pigeon workflow automation engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ContactId, ExecutionId, OrganizationId, TagId, WorkflowId};
