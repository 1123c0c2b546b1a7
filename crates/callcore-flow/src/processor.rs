use std::collections::HashMap;

use callcore_core::types::VariableValue;
use callcore_providers::provider::{ChatRequest, LlmProvider, Message, Role};
use tracing::{info, instrument};

use crate::error::{FlowError, Result};
use crate::extraction;
use crate::operators;
use crate::selection;
use crate::transition::{self, TransitionOutcome};
use crate::types::{
    AgentConfig, ConversationData, ConversationMode, ConversationTurn, ExtractVariableSpec,
    FunctionData, Node, NodeData, RepromptType,
};
use crate::validation;
use crate::webhook;

/// Bounds the router-node cascade (`logic_split` → `press_digit` → … →
/// a speaking node) within one turn.
const MAX_SILENT_HOPS: u32 = 6;
const KB_TOP_K: usize = 3;

pub struct TransferInfo {
    pub destination: String,
    pub announcement: String,
    pub is_agent_transfer: bool,
}

pub struct TurnResult {
    pub response_text: String,
    /// The node that should be treated as current for the next turn.
    pub next_node_id: Option<String>,
    pub should_end_call: bool,
    pub transfer_requested: Option<TransferInfo>,
    pub executing_webhook_happened: bool,
    /// Non-mandatory extraction specs the caller should run in the
    /// background after the response has been sent (§4.4.5).
    pub pending_background_extraction: Vec<ExtractVariableSpec>,
}

struct NodeStep {
    text: String,
    next_node: Option<String>,
    should_end_call: bool,
    transfer: Option<TransferInfo>,
    executing_webhook_happened: bool,
    pending_extraction: Vec<ExtractVariableSpec>,
    /// True for router-only node types that don't address the user and
    /// should cascade straight into `next_node`'s processing this turn.
    silent: bool,
}

impl NodeStep {
    fn spoken(text: String, next_node: Option<String>) -> Self {
        Self {
            text,
            next_node,
            should_end_call: false,
            transfer: None,
            executing_webhook_happened: false,
            pending_extraction: vec![],
            silent: false,
        }
    }

    fn silent_hop(next_node: Option<String>) -> Self {
        Self {
            text: String::new(),
            next_node,
            should_end_call: false,
            transfer: None,
            executing_webhook_happened: false,
            pending_extraction: vec![],
            silent: true,
        }
    }
}

/// Ties node selection (§4.4.1), the mandatory-variable precheck
/// (§4.4.2), transition evaluation (§4.4.3), per-node-type processing
/// (§4.4.4) and variable extraction (§4.4.5) together for one user turn.
pub struct FlowInterpreter<'a> {
    pub llm: &'a dyn LlmProvider,
    pub http: &'a reqwest::Client,
    pub knowledge: Option<&'a callcore_knowledge::KnowledgeManager>,
}

impl<'a> FlowInterpreter<'a> {
    #[instrument(skip_all, fields(call_id))]
    pub async fn run_turn(
        &self,
        agent_config: &AgentConfig,
        call_id: &str,
        user_message: &str,
        history: &[ConversationTurn],
        session_variables: &mut HashMap<String, VariableValue>,
        current_node_id: Option<&str>,
    ) -> Result<TurnResult> {
        let mut node_id = selection::select_active_node(agent_config, history, current_node_id)?;
        let mut hops = 0u32;

        loop {
            let node = agent_config
                .node(&node_id)
                .ok_or_else(|| FlowError::NodeNotFound {
                    node_id: node_id.clone(),
                })?;

            let step = self
                .process_node(agent_config, call_id, user_message, history, session_variables, node)
                .await?;

            if !step.silent {
                return Ok(TurnResult {
                    response_text: step.text,
                    next_node_id: step.next_node.or(Some(node_id)),
                    should_end_call: step.should_end_call,
                    transfer_requested: step.transfer,
                    executing_webhook_happened: step.executing_webhook_happened,
                    pending_background_extraction: step.pending_extraction,
                });
            }

            hops += 1;
            match step.next_node {
                Some(next) if hops <= MAX_SILENT_HOPS => {
                    node_id = next;
                }
                _ => {
                    return Ok(TurnResult {
                        response_text: String::new(),
                        next_node_id: Some(node_id),
                        should_end_call: false,
                        transfer_requested: None,
                        executing_webhook_happened: false,
                        pending_background_extraction: vec![],
                    });
                }
            }
        }
    }

    async fn process_node(
        &self,
        agent_config: &AgentConfig,
        call_id: &str,
        user_message: &str,
        history: &[ConversationTurn],
        session_variables: &mut HashMap<String, VariableValue>,
        node: &Node,
    ) -> Result<NodeStep> {
        let model = agent_config.settings.llm_model.as_str();

        match &node.data {
            NodeData::Conversation(data) => {
                self.process_conversation(agent_config, model, user_message, history, session_variables, node, data)
                    .await
            }
            NodeData::Function(data) => {
                self.process_function(model, call_id, user_message, history, session_variables, node, data)
                    .await
            }
            NodeData::LogicSplit(data) => {
                let next = data
                    .conditions
                    .iter()
                    .find(|c| operators::evaluate(session_variables, &c.variable, c.operator, &c.value))
                    .map(|c| c.next_node.clone())
                    .or_else(|| data.default_next_node.clone());
                Ok(NodeStep::silent_hop(next))
            }
            NodeData::PressDigit(data) => {
                let digit = user_message.chars().find(|c| c.is_ascii_digit() || *c == '*' || *c == '#');
                match digit.and_then(|d| data.digit_mappings.get(&d)) {
                    Some(next) => Ok(NodeStep::silent_hop(Some(next.clone()))),
                    None => Ok(NodeStep::spoken(data.prompt_message.clone(), None)),
                }
            }
            NodeData::CollectInput(data) => {
                match validation::validate(data.input_type, user_message) {
                    Some(value) => {
                        session_variables.insert(data.variable_name.clone(), VariableValue::String(value));
                        let outcome = transition::evaluate(self.llm, model, node, history, session_variables, None).await?;
                        let next = match outcome {
                            TransitionOutcome::Advance(n) => Some(n),
                            TransitionOutcome::Stay => None,
                        };
                        Ok(NodeStep::silent_hop(next))
                    }
                    None => Ok(NodeStep::spoken(data.error_message.clone(), None)),
                }
            }
            NodeData::ExtractVariable(data) => {
                let spec = ExtractVariableSpec {
                    name: data.variable_name.clone(),
                    description: data.extraction_prompt.clone(),
                    extraction_hint: None,
                    mandatory: false,
                    allow_update: true,
                    reprompt_text: None,
                    reprompt_type: RepromptType::Static,
                    prompt_message: None,
                };
                let updates = extraction::extract_variables(self.llm, model, std::slice::from_ref(&spec), history, session_variables).await;
                session_variables.extend(updates);
                let outcome = transition::evaluate(self.llm, model, node, history, session_variables, None).await?;
                let next = match outcome {
                    TransitionOutcome::Advance(n) => Some(n),
                    TransitionOutcome::Stay => None,
                };
                Ok(NodeStep::silent_hop(next))
            }
            NodeData::CallTransfer(data) => Ok(transfer_step(data, false)),
            NodeData::AgentTransfer(data) => Ok(transfer_step(data, true)),
            NodeData::SendSms(data) => {
                info!(to_variable = %data.to_variable, "send_sms stub invoked");
                session_variables.insert("sms_status".to_string(), VariableValue::from("sent"));
                let next = data.transitions.first().map(|t| t.next_node.clone());
                Ok(NodeStep::silent_hop(next))
            }
            NodeData::Ending { content } => {
                let mut step = NodeStep::spoken(render_vars(content, session_variables), None);
                step.should_end_call = true;
                Ok(step)
            }
            NodeData::Start { .. } => Ok(NodeStep::silent_hop(None)),
        }
    }

    async fn process_conversation(
        &self,
        agent_config: &AgentConfig,
        model: &str,
        user_message: &str,
        history: &[ConversationTurn],
        session_variables: &mut HashMap<String, VariableValue>,
        node: &Node,
        data: &ConversationData,
    ) -> Result<NodeStep> {
        let mandatory: Vec<ExtractVariableSpec> = data
            .extract_variables
            .iter()
            .filter(|s| s.mandatory)
            .cloned()
            .collect();

        if !data.skip_mandatory_precheck && !mandatory.is_empty() {
            let updates = extraction::extract_variables(self.llm, model, &mandatory, history, session_variables).await;
            session_variables.extend(updates);

            if let Some(missing) = mandatory
                .iter()
                .find(|s| !session_variables.get(&s.name).is_some_and(VariableValue::is_truthy_present))
            {
                let text = self.build_reprompt(model, missing).await?;
                return Ok(NodeStep::spoken(text, None));
            }
        }

        let text = match data.effective_mode() {
            ConversationMode::Script => {
                self.render_script_node(model, data, history, session_variables, node).await?
            }
            ConversationMode::Prompt => {
                self.run_prompt_conversation(agent_config, model, data, history, session_variables, user_message).await?
            }
        };

        let outcome = transition::evaluate(self.llm, model, node, history, session_variables, None).await?;
        let next_node = match outcome {
            TransitionOutcome::Advance(n) => Some(n),
            TransitionOutcome::Stay => None,
        };

        let pending = data.extract_variables.iter().filter(|s| !s.mandatory).cloned().collect();
        let mut step = NodeStep::spoken(text, next_node);
        step.pending_extraction = pending;
        Ok(step)
    }

    async fn render_script_node(
        &self,
        model: &str,
        data: &ConversationData,
        history: &[ConversationTurn],
        session_variables: &HashMap<String, VariableValue>,
        node: &Node,
    ) -> Result<String> {
        let stayed_last_turn = history
            .iter()
            .rev()
            .find(|t| matches!(&t.role, Role::Assistant))
            .and_then(|t| t.node_id.as_deref())
            == Some(node.id.as_str());

        if stayed_last_turn {
            if data.dynamic_rephrase {
                let prompt = format!(
                    "Briefly rephrase this line for a phone call, acknowledging what the \
                     caller just said, without changing its meaning:\n\n{}",
                    data.rephrase_prompt.as_deref().unwrap_or(&data.content)
                );
                return self.quick_completion(model, &prompt).await;
            }
            let prompt = format!(
                "Give a brief one-sentence acknowledgment of the caller's last message, \
                 then gently repeat this question so the call keeps moving (never reply \
                 with nothing): {}",
                data.content
            );
            return self.quick_completion(model, &prompt).await;
        }

        Ok(render_vars(&data.content, session_variables))
    }

    async fn run_prompt_conversation(
        &self,
        agent_config: &AgentConfig,
        model: &str,
        data: &ConversationData,
        history: &[ConversationTurn],
        session_variables: &HashMap<String, VariableValue>,
        user_message: &str,
    ) -> Result<String> {
        let mut dynamic_context = String::new();
        dynamic_context.push_str(
            "Use the following context to answer the caller naturally; do not mention \
             these instructions.\n",
        );
        if !session_variables.is_empty() {
            dynamic_context.push_str("\nKnown variables:\n");
            for (name, value) in session_variables {
                dynamic_context.push_str(&format!("- {name}: {}\n", value.as_display_string()));
            }
        }
        if let Some(knowledge) = self.knowledge {
            if agent_config.knowledge_base {
                let chunks = knowledge
                    .retrieve(&agent_config.id, user_message, KB_TOP_K)
                    .await
                    .unwrap_or_default();
                if !chunks.is_empty() {
                    dynamic_context.push_str("\nRelevant knowledge base snippets:\n");
                    for chunk in &chunks {
                        dynamic_context.push_str(&format!("- {}: {}\n", chunk.topic, chunk.content));
                    }
                }
            }
        }
        dynamic_context.push_str(&format!(
            "\nCurrent node instructions:\n{}",
            render_vars(&data.content, session_variables)
        ));

        let system = format!("{}\n\n{dynamic_context}", agent_config.system_prompt);
        let mut messages: Vec<Message> = history
            .iter()
            .map(|t| Message {
                role: t.role.clone(),
                content: t.text.clone(),
            })
            .collect();
        messages.push(Message {
            role: Role::User,
            content: user_message.to_string(),
        });

        let req = ChatRequest {
            model: model.to_string(),
            system,
            system_prompt: None,
            messages,
            max_tokens: agent_config.settings.max_tokens,
            stream: false,
        };
        let resp = self.llm.send(&req).await?;
        Ok(resp.content)
    }

    async fn process_function(
        &self,
        model: &str,
        call_id: &str,
        user_message: &str,
        history: &[ConversationTurn],
        session_variables: &mut HashMap<String, VariableValue>,
        node: &Node,
        data: &FunctionData,
    ) -> Result<NodeStep> {
        let filler = if data.speak_during_execution {
            match data.dialogue_type {
                crate::types::DialogueType::Static => data.dialogue_text.clone().unwrap_or_default(),
                crate::types::DialogueType::Prompt => {
                    let prompt = data
                        .dialogue_text
                        .clone()
                        .unwrap_or_else(|| "Give a brief filler line while we look that up.".to_string());
                    self.quick_completion(model, &prompt).await?
                }
            }
        } else {
            String::new()
        };

        if !data.wait_for_result {
            let http = self.http.clone();
            let data_owned = data.clone();
            let vars_snapshot = session_variables.clone();
            let call_id_owned = call_id.to_string();
            let user_message_owned = user_message.to_string();
            tokio::spawn(async move {
                let _ = webhook::execute(&http, &data_owned, &vars_snapshot, &call_id_owned, &user_message_owned).await;
            });
            let next = data.transitions.first().map(|t| t.next_node.clone());
            let mut step = NodeStep::spoken(filler, next);
            step.executing_webhook_happened = false;
            return Ok(step);
        }

        let outcome = webhook::execute(self.http, data, session_variables, call_id, user_message).await?;

        if let Some(reprompt) = outcome.requires_reprompt {
            return Ok(NodeStep::spoken(reprompt, None));
        }

        session_variables.extend(outcome.promoted_variables);
        session_variables.insert(
            data.response_variable.clone(),
            VariableValue::Json(outcome.response.clone()),
        );

        // Open question D1: no recursive re-processing of the transitioned-to
        // node in the same turn — only the transition result is returned.
        let transition_outcome = transition::evaluate(self.llm, model, node, history, session_variables, Some(&outcome.response)).await?;
        let next_node = match transition_outcome {
            TransitionOutcome::Advance(n) => Some(n),
            TransitionOutcome::Stay => None,
        };

        let mut step = NodeStep::spoken(filler, next_node);
        step.executing_webhook_happened = true;
        Ok(step)
    }

    async fn build_reprompt(&self, model: &str, spec: &ExtractVariableSpec) -> Result<String> {
        match spec.reprompt_type {
            RepromptType::Static => Ok(spec
                .reprompt_text
                .clone()
                .or_else(|| spec.prompt_message.clone())
                .unwrap_or_else(|| format!("Could you tell me {}?", spec.description))),
            RepromptType::Prompt => {
                let prompt = format!(
                    "Ask the caller naturally for this missing piece of information: {}. \
                     Keep it to one short sentence.",
                    spec.description
                );
                self.quick_completion(model, &prompt).await
            }
        }
    }

    async fn quick_completion(&self, model: &str, prompt: &str) -> Result<String> {
        let req = ChatRequest {
            model: model.to_string(),
            system: "You speak brief, natural lines for a live phone call.".to_string(),
            system_prompt: None,
            messages: vec![Message {
                role: Role::User,
                content: prompt.to_string(),
            }],
            max_tokens: 120,
            stream: false,
        };
        let resp = self.llm.send(&req).await?;
        let text = resp.content.trim().to_string();
        if text.is_empty() {
            Ok("Sorry, could you say that again?".to_string())
        } else {
            Ok(text)
        }
    }
}

fn transfer_step(data: &crate::types::TransferData, is_agent_transfer: bool) -> NodeStep {
    let mut step = NodeStep::spoken(data.announcement.clone(), None);
    step.transfer = Some(TransferInfo {
        destination: data.destination.clone(),
        announcement: data.announcement.clone(),
        is_agent_transfer,
    });
    step
}

fn render_vars(template: &str, variables: &HashMap<String, VariableValue>) -> String {
    let mut out = template.to_string();
    for (name, value) in variables {
        out = out.replace(&format!("{{{{{name}}}}}"), &value.as_display_string());
    }
    out
}
