use callcore_providers::provider::Role;

use crate::error::{FlowError, Result};
use crate::types::{AgentConfig, ConversationTurn, NodeData, WhoSpeaksFirst};

/// Picks the node whose transitions/processing should run for this turn
/// (§4.4.1). Does not itself advance the flow — that's transition
/// evaluation's job once this node has processed the turn.
pub fn select_active_node(
    agent_config: &AgentConfig,
    history: &[ConversationTurn],
    current_node_id: Option<&str>,
) -> Result<String> {
    let is_first_turn = history.len() <= 1;

    if is_first_turn {
        if let Some(id) = current_node_id {
            return Ok(id.to_string());
        }
        let who_speaks_first = agent_config
            .start_node()
            .and_then(|n| match &n.data {
                NodeData::Start { who_speaks_first } => Some(*who_speaks_first),
                _ => None,
            })
            .unwrap_or(WhoSpeaksFirst::Ai);

        let node = match who_speaks_first {
            WhoSpeaksFirst::User => agent_config
                .call_flow
                .iter()
                .find(|n| n.data.is_interactive()),
            WhoSpeaksFirst::Ai => agent_config
                .call_flow
                .iter()
                .find(|n| n.data.is_conversation()),
        };
        return node.map(|n| n.id.clone()).ok_or(FlowError::NoCallFlow);
    }

    if let Some(id) = current_node_id {
        return Ok(id.to_string());
    }

    history
        .iter()
        .rev()
        .find_map(|t| match &t.role {
            Role::Assistant => t.node_id.clone(),
            _ => None,
        })
        .ok_or(FlowError::NoCallFlow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationData, Node};

    fn flow() -> AgentConfig {
        AgentConfig {
            id: "agent-1".into(),
            agent_type: crate::types::AgentType::CallFlow,
            system_prompt: String::new(),
            settings: crate::types::AgentSettings {
                stt_provider: None,
                llm_provider: "anthropic".into(),
                tts_provider: None,
                llm_model: "claude".into(),
                temperature: 0.7,
                max_tokens: 512,
                voice_settings: serde_json::json!({}),
                dead_air_settings: None,
                provider_settings: serde_json::json!({}),
            },
            call_flow: vec![
                Node {
                    id: "start".into(),
                    label: None,
                    data: NodeData::Start {
                        who_speaks_first: WhoSpeaksFirst::Ai,
                    },
                },
                Node {
                    id: "greet".into(),
                    label: None,
                    data: NodeData::Conversation(ConversationData {
                        mode: None,
                        content: "Hi there".into(),
                        goal: None,
                        dynamic_rephrase: false,
                        rephrase_prompt: None,
                        extract_variables: vec![],
                        auto_transition_to: None,
                        auto_transition_after_response: None,
                        skip_mandatory_precheck: false,
                        use_parallel_llm: false,
                        transitions: vec![],
                    }),
                },
            ],
            knowledge_base: false,
        }
    }

    #[test]
    fn first_turn_picks_first_conversation_node_when_ai_speaks_first() {
        let cfg = flow();
        let id = select_active_node(&cfg, &[], None).unwrap();
        assert_eq!(id, "greet");
    }

    #[test]
    fn first_turn_with_explicit_current_node_is_respected() {
        let cfg = flow();
        let id = select_active_node(&cfg, &[], Some("greet")).unwrap();
        assert_eq!(id, "greet");
    }

    #[test]
    fn subsequent_turn_reads_last_assistant_node_id() {
        let cfg = flow();
        let history = vec![
            ConversationTurn::assistant("Hi there", Some("greet".to_string())),
            ConversationTurn::user("hello"),
        ];
        let id = select_active_node(&cfg, &history, None).unwrap();
        assert_eq!(id, "greet");
    }
}
