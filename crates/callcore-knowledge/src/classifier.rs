//! Factual/lookup vs. pleasantry classification (§4.8). The orchestrator
//! only pays for a retrieval round-trip when the turn looks like it is
//! actually asking for information.

const LOOKUP_MARKERS: &[&str] = &[
    "what", "when", "where", "how much", "how many", "how long", "which",
    "do you have", "is there", "can i", "does it", "price", "cost", "hours",
    "location", "address", "policy", "available", "tell me about",
];

const PLEASANTRY_MARKERS: &[&str] = &[
    "hello", "hi", "hey", "thanks", "thank you", "bye", "goodbye", "ok",
    "okay", "sure", "yes", "no", "great", "good morning", "good afternoon",
];

/// True if `text` reads as a factual/lookup question rather than a
/// pleasantry or short acknowledgment.
pub fn is_factual_query(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    if lower.split_whitespace().count() <= 2
        && PLEASANTRY_MARKERS.iter().any(|p| lower == *p || lower.starts_with(p))
    {
        return false;
    }
    if lower.ends_with('?') {
        return true;
    }
    LOOKUP_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_questions_as_factual() {
        assert!(is_factual_query("What are your hours on Sunday?"));
        assert!(is_factual_query("How much does the premium plan cost"));
    }

    #[test]
    fn classifies_pleasantries_as_non_factual() {
        assert!(!is_factual_query("hello"));
        assert!(!is_factual_query("thanks"));
        assert!(!is_factual_query("ok"));
        assert!(!is_factual_query(""));
    }
}
