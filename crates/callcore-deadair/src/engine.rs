use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::lexicon;
use crate::types::{DeadAirAction, DeadAirState, DeadAirTimings, EndReason};

struct Inner {
    state: DeadAirState,
    call_start: Instant,
    /// When the current silence window started, `None` while not silent.
    silence_start: Option<Instant>,
    last_checkin_time: Option<Instant>,
    checkin_count: u32,
    max_checkins_reached: bool,
    last_was_hold_on: bool,
    /// Webhook execution pauses the silence timer (§4.9). Stores the instant
    /// the pause began so elapsed durations can be shifted forward on resume.
    paused_at: Option<Instant>,
    ended: bool,
}

/// Per-call silence state machine (§4.9). One instance lives for the
/// lifetime of a `Session`; `tick()` is driven by a periodic timer in the
/// orchestrator's per-call task set.
pub struct DeadAirSupervisor {
    timings: DeadAirTimings,
    inner: Mutex<Inner>,
}

impl DeadAirSupervisor {
    pub fn new(timings: DeadAirTimings) -> Self {
        let now = Instant::now();
        Self {
            timings,
            inner: Mutex::new(Inner {
                state: DeadAirState::AgentSpeaking,
                call_start: now,
                silence_start: None,
                last_checkin_time: None,
                checkin_count: 0,
                max_checkins_reached: false,
                last_was_hold_on: false,
                paused_at: None,
                ended: false,
            }),
        }
    }

    /// Agent starts speaking — cancels any running silence window.
    pub fn on_agent_speaking_start(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = DeadAirState::AgentSpeaking;
        inner.silence_start = None;
    }

    /// Agent stops speaking — starts the silence timer (unless paused).
    #[instrument(skip(self))]
    pub fn on_agent_speaking_stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = DeadAirState::AwaitingUser;
        if inner.paused_at.is_none() {
            inner.silence_start = Some(Instant::now());
        }
    }

    /// User starts speaking — cancels the silence timer.
    pub fn on_user_speaking_start(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = DeadAirState::UserSpeaking;
        inner.silence_start = None;
    }

    /// User stops speaking. `was_checkin_response` marks that this
    /// utterance answered a just-issued check-in; `text` is classified
    /// against the "hold on" lexicon for the next silence window's timeout.
    #[instrument(skip(self, text))]
    pub fn on_user_speaking_end(&self, text: &str, was_checkin_response: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = DeadAirState::AwaitingUser;
        inner.last_was_hold_on = lexicon::is_hold_on(text);
        // Silence timer does not restart until the agent next stops speaking.
        inner.silence_start = None;

        if was_checkin_response && !lexicon::is_acknowledgment_only(text) {
            inner.checkin_count = 0;
            inner.max_checkins_reached = false;
        }
    }

    /// Suspend/resume the silence timer around webhook execution.
    pub fn set_executing_webhook(&self, executing: bool) {
        let mut inner = self.inner.lock().unwrap();
        if executing {
            if inner.paused_at.is_none() {
                inner.paused_at = Some(Instant::now());
            }
        } else if let Some(paused_at) = inner.paused_at.take() {
            let pause_duration = paused_at.elapsed();
            if let Some(start) = inner.silence_start.as_mut() {
                *start += pause_duration;
            }
            if let Some(last) = inner.last_checkin_time.as_mut() {
                *last += pause_duration;
            }
        }
    }

    /// Advance the state machine. Call periodically (e.g. every 500ms-1s)
    /// from the per-call supervisor task.
    #[instrument(skip(self))]
    pub fn tick(&self) -> DeadAirAction {
        let mut inner = self.inner.lock().unwrap();
        if inner.ended {
            return DeadAirAction::None;
        }

        let now = Instant::now();

        if now.duration_since(inner.call_start) >= Duration::from_secs(self.timings.max_call_duration_secs) {
            inner.ended = true;
            info!("max call duration exceeded");
            return DeadAirAction::EndCall(EndReason::MaxCallDurationExceeded);
        }

        if inner.paused_at.is_some() || inner.state != DeadAirState::AwaitingUser {
            return DeadAirAction::None;
        }

        let Some(silence_start) = inner.silence_start else {
            return DeadAirAction::None;
        };

        let timeout = if inner.last_was_hold_on {
            self.timings.silence_timeout_hold_on_secs
        } else {
            self.timings.silence_timeout_normal_secs
        };
        let min_interval = self.timings.min_checkin_interval_secs;

        let anchor = inner.last_checkin_time.unwrap_or(silence_start);
        let due_at = anchor + Duration::from_secs(timeout.max(min_interval));
        if now < due_at {
            return DeadAirAction::None;
        }
        if let Some(last) = inner.last_checkin_time {
            if now.duration_since(last) < Duration::from_secs(min_interval) {
                return DeadAirAction::None;
            }
        }

        if inner.checkin_count < self.timings.max_checkins {
            inner.checkin_count += 1;
            inner.last_checkin_time = Some(now);
            info!(count = inner.checkin_count, "emitting check-in");
            return DeadAirAction::CheckIn;
        }

        if !inner.max_checkins_reached {
            inner.max_checkins_reached = true;
            inner.last_checkin_time = Some(now);
            info!("max check-ins reached, starting final grace window");
            return DeadAirAction::None;
        }

        inner.ended = true;
        info!("call ended after exhausting check-ins");
        DeadAirAction::EndCall(EndReason::MaxCheckinsExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn fast_timings() -> DeadAirTimings {
        DeadAirTimings {
            silence_timeout_normal_secs: 0,
            silence_timeout_hold_on_secs: 0,
            min_checkin_interval_secs: 0,
            max_checkins: 2,
            max_call_duration_secs: 3600,
        }
    }

    #[test]
    fn checks_in_after_agent_stops_speaking() {
        let sup = DeadAirSupervisor::new(fast_timings());
        sup.on_agent_speaking_start();
        sup.on_agent_speaking_stop();
        sleep(Duration::from_millis(5));
        assert_eq!(sup.tick(), DeadAirAction::CheckIn);
    }

    #[test]
    fn no_checkin_while_user_speaking() {
        let sup = DeadAirSupervisor::new(fast_timings());
        sup.on_agent_speaking_stop();
        sup.on_user_speaking_start();
        sleep(Duration::from_millis(5));
        assert_eq!(sup.tick(), DeadAirAction::None);
    }

    #[test]
    fn ends_call_after_max_checkins_plus_one_period() {
        let sup = DeadAirSupervisor::new(fast_timings());
        sup.on_agent_speaking_stop();
        sleep(Duration::from_millis(2));
        assert_eq!(sup.tick(), DeadAirAction::CheckIn); // 1
        sleep(Duration::from_millis(2));
        assert_eq!(sup.tick(), DeadAirAction::CheckIn); // 2 == max
        sleep(Duration::from_millis(2));
        assert_eq!(sup.tick(), DeadAirAction::None); // grace window starts
        sleep(Duration::from_millis(2));
        assert_eq!(
            sup.tick(),
            DeadAirAction::EndCall(EndReason::MaxCheckinsExhausted)
        );
    }

    #[test]
    fn webhook_suspends_silence_timer() {
        let sup = DeadAirSupervisor::new(DeadAirTimings {
            silence_timeout_normal_secs: 0,
            ..fast_timings()
        });
        sup.on_agent_speaking_stop();
        sup.set_executing_webhook(true);
        sleep(Duration::from_millis(5));
        sup.set_executing_webhook(false);
        // Right after resume there should be ~0 elapsed silence accounted.
        assert_eq!(sup.tick(), DeadAirAction::CheckIn); // timeout=0 fires immediately regardless
    }

    #[test]
    fn meaningful_checkin_response_resets_counter() {
        let sup = DeadAirSupervisor::new(fast_timings());
        sup.on_agent_speaking_stop();
        sleep(Duration::from_millis(2));
        assert_eq!(sup.tick(), DeadAirAction::CheckIn);
        sup.on_user_speaking_start();
        sup.on_user_speaking_end("I'm still here, go ahead", true);
        sup.on_agent_speaking_stop();
        sleep(Duration::from_millis(2));
        assert_eq!(sup.tick(), DeadAirAction::CheckIn);
    }
}
