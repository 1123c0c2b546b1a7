use std::collections::HashMap;
use std::time::Duration;

use callcore_core::types::VariableValue;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{instrument, warn};

use crate::error::{FlowError, Result};
use crate::types::FunctionData;

const RESERVED_KEYS: &[&str] = &[
    "success",
    "message",
    "error",
    "status",
    "response_type",
    "tool_calls_results",
    "raw_response",
];

pub struct WebhookOutcome {
    /// The (possibly unwrapped) JSON response, stored at the node's
    /// `response_variable`.
    pub response: Value,
    /// Non-reserved fields promoted to top-level `session_variables`.
    pub promoted_variables: HashMap<String, VariableValue>,
    /// Set when a mandatory variable was missing before invocation; the
    /// caller must return this message without advancing (§4.7 step 1).
    pub requires_reprompt: Option<String>,
}

/// Executes a `function` node's webhook (§4.7).
#[instrument(skip_all, fields(url = %node.webhook_url))]
pub async fn execute(
    client: &reqwest::Client,
    node: &FunctionData,
    session_variables: &HashMap<String, VariableValue>,
    call_id: &str,
    user_message: &str,
) -> Result<WebhookOutcome> {
    for spec in &node.extract_variables {
        if !spec.mandatory {
            continue;
        }
        let present = session_variables
            .get(&spec.name)
            .is_some_and(VariableValue::is_truthy_present);
        if !present {
            let message = spec
                .reprompt_text
                .clone()
                .unwrap_or_else(|| format!("Could you tell me {}?", spec.description));
            return Ok(WebhookOutcome {
                response: Value::Null,
                promoted_variables: HashMap::new(),
                requires_reprompt: Some(message),
            });
        }
    }

    let body = build_body(&node.webhook_body, session_variables, call_id, user_message);
    let raw = invoke(client, node, &body).await?;
    let parsed = parse_response(&raw);
    let unwrapped = unwrap_nested(parsed);

    let mut promoted = HashMap::new();
    promote_variables(&unwrapped, &mut promoted);

    Ok(WebhookOutcome {
        response: unwrapped,
        promoted_variables: promoted,
        requires_reprompt: None,
    })
}

/// Step 2: build the request body. JSON-Schema-shaped `webhook_body`
/// (`type: object` + `properties`) copies named properties from
/// `session_variables` (missing → `null`); otherwise treat it as a
/// template and substitute `{{user_message}}`, `{{call_id}}`, `{{var}}`.
fn build_body(
    template: &Value,
    session_variables: &HashMap<String, VariableValue>,
    call_id: &str,
    user_message: &str,
) -> Value {
    if let Value::Object(obj) = template {
        let is_json_schema = obj.get("type").and_then(Value::as_str) == Some("object")
            && obj.contains_key("properties");
        if is_json_schema {
            let mut out = serde_json::Map::new();
            if let Some(Value::Object(props)) = obj.get("properties") {
                for name in props.keys() {
                    let value = session_variables
                        .get(name)
                        .map(|v| v.as_display_string())
                        .map(Value::String)
                        .unwrap_or(Value::Null);
                    out.insert(name.clone(), value);
                }
            }
            return Value::Object(out);
        }
    }

    substitute_template(template, session_variables, call_id, user_message)
}

fn substitute_template(
    template: &Value,
    session_variables: &HashMap<String, VariableValue>,
    call_id: &str,
    user_message: &str,
) -> Value {
    match template {
        Value::String(s) => {
            let mut out = s.replace("{{user_message}}", user_message);
            out = out.replace("{{call_id}}", call_id);
            for (name, value) in session_variables {
                out = out.replace(&format!("{{{{{name}}}}}"), &value.as_display_string());
            }
            Value::String(out)
        }
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        substitute_template(v, session_variables, call_id, user_message),
                    )
                })
                .collect(),
        ),
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| substitute_template(v, session_variables, call_id, user_message))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Step 3: invoke with the configured method/headers; retry once with a
/// longer timeout on a timeout only.
async fn invoke(client: &reqwest::Client, node: &FunctionData, body: &Value) -> Result<String> {
    let attempt = |timeout_secs: u64| {
        let mut builder = client
            .request(
                node.webhook_method.parse().unwrap_or(reqwest::Method::POST),
                node.webhook_url.as_str(),
            )
            .timeout(Duration::from_secs(timeout_secs))
            .json(body);
        for (k, v) in &node.webhook_headers {
            builder = builder.header(k, v);
        }
        builder
    };

    match attempt(node.webhook_timeout_secs).send().await {
        Ok(resp) => Ok(resp.text().await.unwrap_or_default()),
        Err(err) if err.is_timeout() => {
            warn!("webhook timed out, retrying with a longer timeout");
            let longer = node.webhook_timeout_secs.saturating_mul(2).max(30);
            let resp = attempt(longer)
                .send()
                .await
                .map_err(|e| FlowError::Webhook(e.to_string()))?;
            Ok(resp.text().await.unwrap_or_default())
        }
        Err(err) => Err(FlowError::Webhook(err.to_string())),
    }
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\s*(\{[\s\S]*?\})\s*```").expect("static regex"))
}

fn brace_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("static regex"))
}

/// Step 4: strict JSON, then a regex-extracted `{...}` span, then a raw
/// string wrapped as `{"raw_response": ...}`.
fn parse_response(raw: &str) -> Value {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        return v;
    }
    if let Some(m) = brace_span_re().find(raw) {
        if let Ok(v) = serde_json::from_str::<Value>(m.as_str()) {
            return v;
        }
    }
    serde_json::json!({ "raw_response": raw })
}

/// Also recognizes nested payloads: `data`, `result`, or the first
/// `tool_calls_results[].result` containing a fenced JSON block.
fn unwrap_nested(value: Value) -> Value {
    let Value::Object(obj) = &value else {
        return value;
    };

    if let Some(data) = obj.get("data") {
        return data.clone();
    }
    if let Some(result) = obj.get("result") {
        if result.is_object() {
            return result.clone();
        }
    }
    if let Some(Value::Array(results)) = obj.get("tool_calls_results") {
        if let Some(first) = results.first() {
            if let Some(Value::String(text)) = first.get("result") {
                if let Some(caps) = fenced_json_re().captures(text) {
                    if let Ok(v) = serde_json::from_str::<Value>(&caps[1]) {
                        return v;
                    }
                }
            }
        }
    }

    value
}

/// Step 5: promote every non-reserved field to a session variable.
fn promote_variables(value: &Value, out: &mut HashMap<String, VariableValue>) {
    let Value::Object(obj) = value else {
        return;
    };
    for (key, v) in obj {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let converted = match v {
            Value::String(s) => VariableValue::String(s.clone()),
            Value::Number(n) => VariableValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::Bool(b) => VariableValue::Bool(*b),
            other => VariableValue::Json(other.clone()),
        };
        out.insert(key.clone(), converted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_json_schema_body_from_session_variables() {
        let mut vars = HashMap::new();
        vars.insert("income".to_string(), VariableValue::from("50000"));
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "income": {"type": "string"}, "plan": {"type": "string"} }
        });
        let body = build_body(&schema, &vars, "call-1", "hi");
        assert_eq!(body["income"], "50000");
        assert_eq!(body["plan"], Value::Null);
    }

    #[test]
    fn substitutes_template_placeholders() {
        let vars = HashMap::new();
        let template = serde_json::json!({ "text": "{{user_message}} for {{call_id}}" });
        let body = build_body(&template, &vars, "call-1", "hello");
        assert_eq!(body["text"], "hello for call-1");
    }

    #[test]
    fn parses_strict_json_response() {
        let v = parse_response(r#"{"success": true, "plan": "gold"}"#);
        assert_eq!(v["plan"], "gold");
    }

    #[test]
    fn extracts_brace_span_from_noisy_response() {
        let v = parse_response("Here you go: {\"plan\": \"gold\"} thanks");
        assert_eq!(v["plan"], "gold");
    }

    #[test]
    fn wraps_unparseable_body_as_raw_response() {
        let v = parse_response("not json at all");
        assert_eq!(v["raw_response"], "not json at all");
    }

    #[test]
    fn unwraps_data_field() {
        let v = serde_json::json!({ "data": { "plan": "gold" } });
        assert_eq!(unwrap_nested(v)["plan"], "gold");
    }

    #[test]
    fn promotes_non_reserved_fields_only() {
        let v = serde_json::json!({ "success": true, "plan": "gold" });
        let mut out = HashMap::new();
        promote_variables(&v, &mut out);
        assert!(!out.contains_key("success"));
        assert_eq!(out["plan"].as_display_string(), "gold");
    }
}
