//! Dead-air / check-in supervisor (C7, spec §4.9).
//!
//! Tracks per-call silence windows and decides when to inject a check-in
//! ("are you still there?") or terminate the call after too many
//! unanswered check-ins or an overlong call duration.

pub mod engine;
pub mod error;
pub mod lexicon;
pub mod types;

pub use engine::DeadAirSupervisor;
pub use error::{DeadAirError, Result};
pub use types::{DeadAirAction, DeadAirState, DeadAirTimings, EndReason};
