//! Trigger evaluation for the copper-pigeon platform.
//!
//! Given a normalized business event, this crate decides which active
//! workflows should start a new execution and whether the contact is
//! currently eligible to (re-)enter each one:
//!
//! - **Events**: the normalized `TriggerEvent` handed over by the ingestion
//!   layer (never persisted here)
//! - **Evaluation**: per-workflow matching of trigger type and configured
//!   filters, with an inspectable reason for every non-match
//! - **Re-entry**: per-contact eligibility rules (active-execution blocking,
//!   lifetime caps)

pub mod evaluator;
pub mod event;
pub mod reentry;

pub use evaluator::{TriggerEvaluation, TriggerOutcome, TriggerService};
pub use event::TriggerEvent;
pub use reentry::can_contact_enter_workflow;
