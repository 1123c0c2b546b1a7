use regex::Regex;
use std::sync::OnceLock;

fn shorthand_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$?([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kKmM])?$").expect("static regex")
    })
}

/// Parses numeric shorthand commonly spoken in call transcripts:
/// `10k` -> 10000, `$10,000` -> 10000, `1.2m` -> 1_200_000.
///
/// Used by `logic_split` numeric comparisons and variable extraction
/// normalization. Returns `None` for anything that isn't plainly numeric.
pub fn parse_numeric_shorthand(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let caps = shorthand_re().captures(trimmed)?;
    let digits: String = caps[1].chars().filter(|c| *c != ',').collect();
    let base: f64 = digits.parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "k" => 1_000.0,
        Some(ref s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some(base * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_thousands_suffix() {
        assert_eq!(parse_numeric_shorthand("10k"), Some(10_000.0));
    }

    #[test]
    fn parses_dollar_with_commas() {
        assert_eq!(parse_numeric_shorthand("$10,000"), Some(10_000.0));
    }

    #[test]
    fn parses_millions_with_fraction() {
        assert_eq!(parse_numeric_shorthand("1.2m"), Some(1_200_000.0));
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert_eq!(parse_numeric_shorthand("not a number"), None);
    }
}
