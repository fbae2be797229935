//! Storage implementations for the copper-pigeon platform.
//!
//! Two implementations of the workflow/execution storage traits:
//!
//! - **Memory**: mutex-guarded maps for tests and single-process use; the
//!   guarded insert runs under one lock, making it the in-process
//!   serialization point for concurrent execution creation
//! - **Postgres**: sqlx-backed durable store where the guarded insert is an
//!   advisory-locked check-and-insert inside one transaction

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgExecutionStore, PgWorkflowStore, run_migrations};
