//! Service alias resolution and key-prefix pattern fallback (§4.10).

/// Canonicalizes a spoken/configured provider name to its service id.
pub fn canonical_service_name(requested: &str) -> String {
    let lower = requested.to_ascii_lowercase();
    match lower.as_str() {
        "xai" | "x.ai" => "grok".to_string(),
        "gpt" | "gpt-4" | "gpt-5" => "openai".to_string(),
        "claude" => "anthropic".to_string(),
        "google" => "gemini".to_string(),
        _ => lower,
    }
}

/// The prefix a generic fallback key must start with to be accepted for
/// `service_name`, used when no key is stored under the exact service name.
pub fn known_prefix(service_name: &str) -> Option<&'static [&'static str]> {
    match service_name {
        "openai" => Some(&["sk-", "sk-proj-"]),
        "grok" => Some(&["xai-"]),
        "anthropic" => Some(&["sk-ant-"]),
        "gemini" => Some(&["AIza"]),
        "elevenlabs" => Some(&["sk_"]),
        _ => None,
    }
}

pub fn matches_known_prefix(service_name: &str, value: &str) -> bool {
    known_prefix(service_name)
        .map(|prefixes| prefixes.iter().any(|p| value.starts_with(p)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_documented_aliases() {
        assert_eq!(canonical_service_name("xai"), "grok");
        assert_eq!(canonical_service_name("x.ai"), "grok");
        assert_eq!(canonical_service_name("gpt-4"), "openai");
        assert_eq!(canonical_service_name("claude"), "anthropic");
        assert_eq!(canonical_service_name("google"), "gemini");
    }

    #[test]
    fn passes_through_unknown_names() {
        assert_eq!(canonical_service_name("deepgram"), "deepgram");
    }

    #[test]
    fn prefix_match_accepts_generic_openai_key() {
        assert!(matches_known_prefix("openai", "sk-proj-abc123"));
        assert!(!matches_known_prefix("openai", "xai-abc123"));
    }
}
