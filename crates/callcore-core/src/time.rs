use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;

/// Wall-clock `now` expressed in US Eastern time, for volatile session
/// variables (§3/§4.3 step 3). Callers must recompute this once per turn —
/// never cache the result on the session.
pub fn eastern_now() -> DateTime<chrono_tz::Tz> {
    Utc::now().with_timezone(&New_York)
}

/// Formats `eastern_now()` the way it's injected into the system prompt's
/// volatile tier, e.g. "Monday, July 28, 2026, 2:45 PM ET".
pub fn eastern_now_display() -> String {
    format!("{} ET", eastern_now().format("%A, %B %-d, %Y, %-I:%M %p"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_et_suffix() {
        let s = eastern_now_display();
        assert!(s.ends_with("ET"));
    }
}
