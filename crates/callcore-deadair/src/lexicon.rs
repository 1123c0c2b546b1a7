//! Small, English-only word lists driving two of §4.9's classifications.
//! Whether these should be language-aware is an open question (§9); this
//! implementation keeps the fixed list.

const HOLD_ON_PHRASES: &[&str] = &[
    "hold on",
    "wait",
    "one moment",
    "give me a second",
    "hang on",
    "just a sec",
    "one sec",
    "hold please",
];

const ACKNOWLEDGMENT_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "ok", "okay", "sure", "alright", "mhm", "uh-huh", "right", "got it",
];

/// True if `text` matches the "hold on" lexicon (§4.9's `T` selector).
pub fn is_hold_on(text: &str) -> bool {
    let lower = text.to_lowercase();
    HOLD_ON_PHRASES.iter().any(|p| lower.contains(p))
}

/// True if `text` is a short acknowledgment-only reply ("yes"/"ok"/…)
/// rather than a meaningful response to a check-in.
pub fn is_acknowledgment_only(text: &str) -> bool {
    let trimmed = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    if trimmed.is_empty() {
        return true;
    }
    let word_count = trimmed.split_whitespace().count();
    if word_count > 3 {
        return false;
    }
    trimmed
        .split_whitespace()
        .all(|w| ACKNOWLEDGMENT_WORDS.contains(&w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hold_on_phrases() {
        assert!(is_hold_on("hold on a second"));
        assert!(is_hold_on("Just a sec, let me check"));
        assert!(!is_hold_on("my income is 50000"));
    }

    #[test]
    fn classifies_acknowledgment_only_replies() {
        assert!(is_acknowledgment_only("yeah"));
        assert!(is_acknowledgment_only("ok sure"));
        assert!(!is_acknowledgment_only("yes my account number is 12345"));
        assert!(!is_acknowledgment_only(""));
    }
}
