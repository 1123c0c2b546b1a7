use std::collections::HashMap;

use callcore_core::types::VariableValue;

use crate::types::Operator;

/// Evaluates a single `logic_split` condition (§4.4.4) against
/// `session_variables`. Numeric operators accept the shorthand
/// (`10k`, `$10,000`, `1.2m`) via `VariableValue::as_f64`.
pub fn evaluate(
    variables: &HashMap<String, VariableValue>,
    variable_name: &str,
    op: Operator,
    rhs: &str,
) -> bool {
    let lhs = variables.get(variable_name);

    match op {
        Operator::Exists => lhs.is_some_and(|v| v.is_truthy_present()),
        Operator::NotExists => !lhs.is_some_and(|v| v.is_truthy_present()),
        Operator::Equals => lhs
            .map(|v| v.as_display_string().eq_ignore_ascii_case(rhs))
            .unwrap_or(false),
        Operator::NotEquals => lhs
            .map(|v| !v.as_display_string().eq_ignore_ascii_case(rhs))
            .unwrap_or(true),
        Operator::Contains => lhs
            .map(|v| {
                v.as_display_string()
                    .to_lowercase()
                    .contains(&rhs.to_lowercase())
            })
            .unwrap_or(false),
        Operator::StartsWith => lhs
            .map(|v| {
                v.as_display_string()
                    .to_lowercase()
                    .starts_with(&rhs.to_lowercase())
            })
            .unwrap_or(false),
        Operator::EndsWith => lhs
            .map(|v| {
                v.as_display_string()
                    .to_lowercase()
                    .ends_with(&rhs.to_lowercase())
            })
            .unwrap_or(false),
        Operator::GreaterThan => numeric_compare(lhs, rhs, |l, r| l > r),
        Operator::LessThan => numeric_compare(lhs, rhs, |l, r| l < r),
        Operator::GreaterThanOrEqual => numeric_compare(lhs, rhs, |l, r| l >= r),
        Operator::LessThanOrEqual => numeric_compare(lhs, rhs, |l, r| l <= r),
    }
}

fn numeric_compare(
    lhs: Option<&VariableValue>,
    rhs: &str,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let Some(l) = lhs.and_then(|v| v.as_f64()) else {
        return false;
    };
    let Some(r) = callcore_core::numeric::parse_numeric_shorthand(rhs) else {
        return false;
    };
    cmp(l, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, VariableValue)]) -> HashMap<String, VariableValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn equals_is_case_insensitive() {
        let v = vars(&[("plan", VariableValue::from("Gold"))]);
        assert!(evaluate(&v, "plan", Operator::Equals, "gold"));
    }

    #[test]
    fn greater_than_accepts_shorthand_on_both_sides() {
        let v = vars(&[("income", VariableValue::from("50k"))]);
        assert!(evaluate(&v, "income", Operator::GreaterThan, "10000"));
        assert!(!evaluate(&v, "income", Operator::GreaterThan, "1.2m"));
    }

    #[test]
    fn exists_rejects_empty_string() {
        let v = vars(&[("name", VariableValue::from(""))]);
        assert!(!evaluate(&v, "name", Operator::Exists, ""));
        assert!(evaluate(&v, "name", Operator::NotExists, ""));
    }

    #[test]
    fn missing_variable_fails_comparisons_but_satisfies_not_exists() {
        let v: HashMap<String, VariableValue> = HashMap::new();
        assert!(!evaluate(&v, "missing", Operator::Equals, "x"));
        assert!(evaluate(&v, "missing", Operator::NotExists, ""));
    }
}
