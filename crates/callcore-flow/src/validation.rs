use std::sync::OnceLock;

use regex::Regex;

use crate::types::InputType;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]").expect("static regex"))
}

/// Validates and normalizes raw user text for a `collect_input` node
/// (§4.4.4). Returns the value to store on success.
pub fn validate(input_type: InputType, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match input_type {
        InputType::Text => Some(trimmed.to_string()),
        InputType::Email => email_re().is_match(trimmed).then(|| trimmed.to_string()),
        InputType::Phone => {
            let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
            (phone_re().is_match(trimmed) && digits.len() >= 7).then_some(digits)
        }
        InputType::Number => callcore_core::numeric::parse_numeric_shorthand(trimmed)
            .map(|n| n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_plausible_email() {
        assert_eq!(
            validate(InputType::Email, "alex@example.com"),
            Some("alex@example.com".to_string())
        );
    }

    #[test]
    fn rejects_email_without_at_sign() {
        assert_eq!(validate(InputType::Email, "not an email"), None);
    }

    #[test]
    fn normalizes_phone_to_digits() {
        assert_eq!(
            validate(InputType::Phone, "(555) 123-4567"),
            Some("5551234567".to_string())
        );
    }

    #[test]
    fn parses_number_shorthand() {
        assert_eq!(validate(InputType::Number, "10k"), Some("10000".to_string()));
    }
}
