use serde::{Deserialize, Serialize};

/// Per-call silence state (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadAirState {
    AgentSpeaking,
    AwaitingUser,
    UserSpeaking,
}

/// Tunables for the silence state machine. Mirrors
/// `callcore_core::config::DeadAirConfig` plus the two timeout variants
/// the state machine needs (the config section only carries the shared
/// defaults; the hold-on timeout is a flow/session-level setting).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeadAirTimings {
    pub silence_timeout_normal_secs: u64,
    pub silence_timeout_hold_on_secs: u64,
    pub min_checkin_interval_secs: u64,
    pub max_checkins: u32,
    pub max_call_duration_secs: u64,
}

impl Default for DeadAirTimings {
    fn default() -> Self {
        Self {
            silence_timeout_normal_secs: 7,
            silence_timeout_hold_on_secs: 25,
            min_checkin_interval_secs: 3,
            max_checkins: 3,
            max_call_duration_secs: 1500,
        }
    }
}

/// Outcome of a supervisor tick, to be acted on by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadAirAction {
    /// No action this tick.
    None,
    /// Emit a check-in utterance and resume listening.
    CheckIn,
    /// Terminate the call.
    EndCall(EndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    MaxCheckinsExhausted,
    MaxCallDurationExceeded,
}
