use std::collections::HashMap;
use std::time::Duration;

use callcore_core::config::TRANSITION_EVAL_TIMEOUT_MS;
use callcore_core::types::VariableValue;
use callcore_providers::provider::{ChatRequest, LlmProvider, Message, Role};
use tracing::{instrument, warn};

use crate::error::Result;
use crate::types::{ConversationTurn, Node, Transition};

const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Advance(String),
    Stay,
}

/// Evaluates which transition (if any) fires for `node` this turn (§4.4.3).
#[instrument(skip_all, fields(node_id = %node.id))]
pub async fn evaluate(
    llm: &dyn LlmProvider,
    model: &str,
    node: &Node,
    history: &[ConversationTurn],
    session_variables: &HashMap<String, VariableValue>,
    webhook_response: Option<&serde_json::Value>,
) -> Result<TransitionOutcome> {
    if let crate::types::NodeData::Conversation(d) = &node.data {
        if let Some(next) = &d.auto_transition_after_response {
            return Ok(TransitionOutcome::Advance(next.clone()));
        }
        if let Some(next) = &d.auto_transition_to {
            return Ok(TransitionOutcome::Advance(next.clone()));
        }
    }

    let transitions = node.data.transitions();
    if transitions.is_empty() {
        return Ok(TransitionOutcome::Stay);
    }

    let eligible: Vec<&Transition> = transitions
        .iter()
        .filter(|t| {
            t.check_variables.iter().all(|name| {
                session_variables
                    .get(name)
                    .is_some_and(VariableValue::is_truthy_present)
            })
        })
        .collect();

    if eligible.is_empty() {
        return Ok(TransitionOutcome::Stay);
    }

    let prompt = build_prompt(&eligible, history, webhook_response);
    let req = ChatRequest {
        model: model.to_string(),
        system: "You route a phone call between scripted nodes. Reply with only the \
                 integer index of the transition that matches the conversation, or -1 \
                 if none apply."
            .to_string(),
        system_prompt: None,
        messages: vec![Message {
            role: Role::User,
            content: prompt,
        }],
        max_tokens: 10,
        stream: false,
    };

    let timeout = Duration::from_millis(TRANSITION_EVAL_TIMEOUT_MS);
    let idx = match tokio::time::timeout(timeout, llm.send(&req)).await {
        Ok(Ok(resp)) => parse_index(&resp.content),
        Ok(Err(err)) => {
            warn!(%err, "transition eval call failed, staying on node");
            None
        }
        Err(_) => {
            warn!("transition eval timed out, staying on node");
            None
        }
    };

    match idx {
        Some(i) if i >= 0 && (i as usize) < eligible.len() => {
            Ok(TransitionOutcome::Advance(eligible[i as usize].next_node.clone()))
        }
        _ => {
            if let Some(t) = eligible.iter().find(|t| is_default_condition(&t.condition)) {
                Ok(TransitionOutcome::Advance(t.next_node.clone()))
            } else {
                Ok(TransitionOutcome::Stay)
            }
        }
    }
}

fn is_default_condition(condition: &str) -> bool {
    let c = condition.trim().to_lowercase();
    c.is_empty() || c == "default" || c == "else"
}

fn build_prompt(
    transitions: &[&Transition],
    history: &[ConversationTurn],
    webhook_response: Option<&serde_json::Value>,
) -> String {
    let mut out = String::new();
    out.push_str("Recent conversation:\n");
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in &history[start..] {
        let speaker = match &turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        out.push_str(&format!("{speaker}: {}\n", turn.text));
    }
    if let Some(resp) = webhook_response {
        out.push_str(&format!("\nWebhook response:\n{resp}\n"));
    }
    out.push_str("\nCandidate transitions:\n");
    for (i, t) in transitions.iter().enumerate() {
        out.push_str(&format!("{i}: {}\n", t.condition));
    }
    out
}

/// First integer token in the reply, handling a bare `-1`.
fn parse_index(content: &str) -> Option<i64> {
    let trimmed = content.trim();
    let mut digits = String::new();
    let mut chars = trimmed.chars().peekable();
    if let Some('-') = chars.peek() {
        digits.push('-');
        chars.next();
    }
    for c in chars {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            break;
        }
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_index() {
        assert_eq!(parse_index("2"), Some(2));
        assert_eq!(parse_index("-1"), Some(-1));
        assert_eq!(parse_index("  3\n"), Some(3));
    }

    #[test]
    fn default_condition_recognizes_common_spellings() {
        assert!(is_default_condition(""));
        assert!(is_default_condition("Default"));
        assert!(is_default_condition(" else "));
        assert!(!is_default_condition("income > 50k"));
    }
}
