use std::collections::HashMap;
use std::time::Duration;

use callcore_core::config::EXTRACTION_TIMEOUT_MS;
use callcore_core::types::VariableValue;
use callcore_providers::provider::{ChatRequest, LlmProvider, Message, Role};
use tracing::{instrument, warn};

use crate::types::{ConversationTurn, ExtractVariableSpec};

const HISTORY_WINDOW: usize = 10;
const NOT_FOUND: &str = "NOT_FOUND";

/// Runs LLM-driven extraction for every spec in `specs` that isn't already
/// satisfied (§4.4.5). Returns only the variables that were newly found;
/// callers merge this into `session_variables`. Always keeps
/// `customer_name`/`callerName` in sync.
#[instrument(skip_all)]
pub async fn extract_variables(
    llm: &dyn LlmProvider,
    model: &str,
    specs: &[ExtractVariableSpec],
    history: &[ConversationTurn],
    session_variables: &HashMap<String, VariableValue>,
) -> HashMap<String, VariableValue> {
    let mut updates = HashMap::new();

    for spec in specs {
        let already_present = session_variables
            .get(&spec.name)
            .is_some_and(VariableValue::is_truthy_present);
        if already_present && !spec.allow_update {
            continue;
        }

        let prompt = build_prompt(spec, history, session_variables);
        let req = ChatRequest {
            model: model.to_string(),
            system: "Extract one field from a phone call transcript. Reply with only \
                     the value, or NOT_FOUND if it was never stated. Never invent a \
                     value the caller did not state."
                .to_string(),
            system_prompt: None,
            messages: vec![Message {
                role: Role::User,
                content: prompt,
            }],
            max_tokens: 60,
            stream: false,
        };

        if let Some(value) = send_with_retry(llm, &req, &spec.name).await {
            if value != NOT_FOUND && !value.is_empty() {
                updates.insert(spec.name.clone(), VariableValue::String(value));
            }
        }
    }

    sync_customer_name_alias(&mut updates, session_variables);
    updates
}

async fn send_with_retry(
    llm: &dyn LlmProvider,
    req: &ChatRequest,
    variable_name: &str,
) -> Option<String> {
    let timeout = Duration::from_millis(EXTRACTION_TIMEOUT_MS);
    for attempt in 0..2 {
        match tokio::time::timeout(timeout, llm.send(req)).await {
            Ok(Ok(resp)) => return Some(resp.content.trim().to_string()),
            Ok(Err(err)) => {
                warn!(%err, variable_name, attempt, "extraction call failed");
            }
            Err(_) => {
                warn!(variable_name, attempt, "extraction call timed out");
            }
        }
    }
    None
}

fn build_prompt(
    spec: &ExtractVariableSpec,
    history: &[ConversationTurn],
    session_variables: &HashMap<String, VariableValue>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Field to extract: {} — {}\n",
        spec.name, spec.description
    ));
    if let Some(hint) = &spec.extraction_hint {
        out.push_str(&format!("Hint: {hint}\n"));
    }
    out.push_str(
        "Rules: do not invent values the caller did not state; perform any arithmetic \
         the description asks for explicitly; normalize monetary amounts to plain \
         integers; treat short agreement (\"sure\", \"yeah\") as confirming what the \
         assistant just proposed; interpret digit run-ons like \"20, uh, 4000\" as \
         \"24000\"; map morning/afternoon/evening to AM/PM.\n",
    );
    if !session_variables.is_empty() {
        out.push_str("\nKnown variables:\n");
        for (name, value) in session_variables {
            out.push_str(&format!("- {name}: {}\n", value.as_display_string()));
        }
    }
    out.push_str("\nRecent conversation:\n");
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in &history[start..] {
        let speaker = match &turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        out.push_str(&format!("{speaker}: {}\n", turn.text));
    }
    out
}

/// `customer_name` and `callerName` are always kept bidirectionally equal
/// whenever either is set (§3, §4.4.5).
fn sync_customer_name_alias(
    updates: &mut HashMap<String, VariableValue>,
    existing: &HashMap<String, VariableValue>,
) {
    const A: &str = "customer_name";
    const B: &str = "callerName";

    if let Some(v) = updates.get(A).cloned() {
        updates.entry(B.to_string()).or_insert(v);
    } else if let Some(v) = updates.get(B).cloned() {
        updates.entry(A.to_string()).or_insert(v);
    } else if let Some(v) = existing.get(A).cloned() {
        updates.entry(B.to_string()).or_insert(v);
    } else if let Some(v) = existing.get(B).cloned() {
        updates.entry(A.to_string()).or_insert(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syncs_customer_name_to_caller_name() {
        let mut updates = HashMap::new();
        updates.insert("customer_name".to_string(), VariableValue::from("Alex"));
        let existing = HashMap::new();
        sync_customer_name_alias(&mut updates, &existing);
        assert_eq!(
            updates.get("callerName").unwrap().as_display_string(),
            "Alex"
        );
    }

    #[test]
    fn does_not_override_an_explicit_update() {
        let mut updates = HashMap::new();
        updates.insert("customer_name".to_string(), VariableValue::from("Alex"));
        updates.insert("callerName".to_string(), VariableValue::from("Alexandra"));
        sync_customer_name_alias(&mut updates, &HashMap::new());
        assert_eq!(
            updates.get("callerName").unwrap().as_display_string(),
            "Alexandra"
        );
    }
}
