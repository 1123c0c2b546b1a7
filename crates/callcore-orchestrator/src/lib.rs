//! Per-call concurrent task graph (§5): STT ingest (C2), the Turn
//! Orchestrator (C3/C4), the TTS Player (C5), the Barge-In Supervisor (C6),
//! and the Dead-Air Supervisor timer (C7), wired together with bounded
//! channels for the lifetime of one call.

pub mod barge_in;
pub mod call_task;
pub mod dead_air_task;
pub mod error;
pub mod sentence;
pub mod stt_ingest;
pub mod turn;
pub mod tts_player;

pub use call_task::{spawn, CallDependencies, CallTaskHandle};
pub use error::{OrchestratorError, Result};
pub use turn::{TurnOrchestrator, TurnOutcome};
