//! Resumption scheduler for the copper-pigeon platform.
//!
//! The engine computes wake times and persists waiting executions; it never
//! sleeps or holds timers. This crate is the time-driven caller on the other
//! side of that contract: it periodically sweeps the execution store for
//! waiting executions whose wake time has elapsed and invokes the engine's
//! resume entry point for each.

pub mod error;
pub mod resumer;

pub use error::SchedulerError;
pub use resumer::ResumptionScheduler;
