use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque call identifier handed to us by the telephony carrier.
///
/// Used verbatim as the cross-worker store key suffix (`call:<id>`,
/// `playbacks:<id>`, `session_ready:<id>`) — never reformatted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifies the persisted agent definition a session was created from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifies the account that owns an agent (and its provider keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A session variable's value. `customer_name`/`callerName` and every other
/// extracted or logic-split variable is stored as one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    String(String),
    Number(f64),
    Bool(bool),
    Json(serde_json::Value),
}

impl VariableValue {
    /// Render the value for `{{var}}` substitution and prompt injection.
    pub fn as_display_string(&self) -> String {
        match self {
            VariableValue::String(s) => s.clone(),
            VariableValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            VariableValue::Bool(b) => b.to_string(),
            VariableValue::Json(v) => v.to_string(),
        }
    }

    /// Best-effort numeric coercion, used by `logic_split` operators and
    /// monetary-shorthand normalization.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariableValue::Number(n) => Some(*n),
            VariableValue::String(s) => crate::numeric::parse_numeric_shorthand(s),
            VariableValue::Bool(_) | VariableValue::Json(_) => None,
        }
    }

    pub fn is_truthy_present(&self) -> bool {
        match self {
            VariableValue::String(s) => !s.trim().is_empty(),
            VariableValue::Json(serde_json::Value::Null) => false,
            _ => true,
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::String(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::String(s)
    }
}

impl From<f64> for VariableValue {
    fn from(n: f64) -> Self {
        VariableValue::Number(n)
    }
}

impl From<bool> for VariableValue {
    fn from(b: bool) -> Self {
        VariableValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_string_formats_whole_numbers_without_trailing_zero() {
        let v = VariableValue::Number(24000.0);
        assert_eq!(v.as_display_string(), "24000");
    }

    #[test]
    fn numeric_shorthand_coerces_from_string() {
        let v = VariableValue::String("2k".to_string());
        assert_eq!(v.as_f64(), Some(2000.0));
    }

    #[test]
    fn truthy_present_rejects_empty_string() {
        assert!(!VariableValue::String(String::new()).is_truthy_present());
        assert!(VariableValue::String("no".to_string()).is_truthy_present());
    }
}
