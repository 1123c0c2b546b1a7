//! Turn Orchestrator (C3, §4.3): on each final user utterance, produces an
//! agent response as an ordered stream of sentences delivered to the TTS
//! Player, running the webhook guard and barge-in interceptor first.

use std::time::{Duration, Instant};

use callcore_core::types::VariableValue;
use callcore_flow::{AgentType, ConversationTurn, FlowInterpreter, TransferInfo};
use callcore_providers::provider::{ChatRequest, LlmProvider, Message, Role};
use callcore_session::Session;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::sentence::SentenceSplitter;

/// §4.3 step 1: how long to wait for a previous turn's webhook flag to
/// clear before proceeding anyway.
const WEBHOOK_GUARD_TIMEOUT: Duration = Duration::from_secs(15);
const WEBHOOK_GUARD_POLL: Duration = Duration::from_millis(100);

pub struct TurnOutcome {
    pub should_end_call: bool,
    pub transfer_requested: Option<TransferInfo>,
}

pub struct TurnOrchestrator<'a> {
    pub llm: &'a dyn LlmProvider,
    pub http: &'a reqwest::Client,
    pub knowledge: Option<&'a callcore_knowledge::KnowledgeManager>,
}

impl<'a> TurnOrchestrator<'a> {
    /// Runs one full turn (§4.3 steps 1-5 plus post-turn maintenance).
    /// `user_message` has already been validated as a final STT transcript.
    #[instrument(skip_all, fields(call_id = %session.call_id))]
    pub async fn handle_utterance(
        &self,
        session: &Session,
        user_message: &str,
        sentence_tx: &mpsc::Sender<String>,
    ) -> Result<TurnOutcome> {
        self.wait_for_webhook_guard(session).await;

        if session
            .silence_greeting_triggered
            .swap(false, std::sync::atomic::Ordering::Relaxed)
        {
            return self.handle_barge_in_on_greeting(session, sentence_tx).await;
        }

        self.refresh_volatile_variables(session);

        {
            let mut history = session.conversation_history.lock().unwrap();
            let already_appended = history
                .last()
                .map(|t| matches!(&t.role, Role::User) && t.text == user_message)
                .unwrap_or(false);
            if !already_appended {
                history.push(ConversationTurn::user(user_message));
            }
        }

        session.dead_air.on_agent_speaking_start();

        let outcome = match session.agent_config.agent_type {
            AgentType::SinglePrompt => self.run_single_prompt_turn(session, sentence_tx).await?,
            AgentType::CallFlow => self.run_call_flow_turn(session, user_message, sentence_tx).await?,
        };

        session.dead_air.on_agent_speaking_stop();
        Ok(outcome)
    }

    /// §4.3 step 1.
    async fn wait_for_webhook_guard(&self, session: &Session) {
        let start = Instant::now();
        while session.executing_webhook.load(std::sync::atomic::Ordering::Relaxed) {
            if start.elapsed() >= WEBHOOK_GUARD_TIMEOUT {
                warn!("webhook guard timed out, proceeding with possibly-stale node position");
                break;
            }
            sleep(WEBHOOK_GUARD_POLL).await;
        }
    }

    /// §4.3 step 2 / §4.6: treats this utterance as interrupting a
    /// just-issued silence greeting rather than a normal turn.
    async fn handle_barge_in_on_greeting(
        &self,
        session: &Session,
        sentence_tx: &mpsc::Sender<String>,
    ) -> Result<TurnOutcome> {
        {
            let mut history = session.conversation_history.lock().unwrap();
            let pop = history
                .last()
                .map(|t| matches!(&t.role, Role::Assistant) && (t.is_silence_greeting || t.looks_like_silence_greeting()))
                .unwrap_or(false);
            if pop {
                history.pop();
            }
        }

        let greeting_node_id = {
            let current = session.current_node_id.lock().unwrap().clone();
            current
                .or_else(|| {
                    session
                        .agent_config
                        .start_node()
                        .and_then(|n| n.data.transitions().first())
                        .map(|t| t.next_node.clone())
                })
                .or_else(|| {
                    session
                        .agent_config
                        .call_flow
                        .iter()
                        .find(|n| {
                            n.label.as_deref().map(|l| {
                                let lower = l.to_lowercase();
                                ["greeting", "intro", "introduction", "start"]
                                    .iter()
                                    .any(|kw| lower.contains(kw))
                            }).unwrap_or(false)
                        })
                        .map(|n| n.id.clone())
                })
        };

        let text = greeting_node_id
            .as_deref()
            .and_then(|id| session.agent_config.node(id))
            .map(|n| render_node_text(n, &session.session_variables.lock().unwrap()))
            .unwrap_or_default();

        if !text.is_empty() {
            self.stream_text(&text, sentence_tx).await;
            session
                .conversation_history
                .lock()
                .unwrap()
                .push(ConversationTurn::assistant(text, greeting_node_id));
        }

        Ok(TurnOutcome {
            should_end_call: false,
            transfer_requested: None,
        })
    }

    /// §4.3 step 3.
    fn refresh_volatile_variables(&self, session: &Session) {
        session.session_variables.lock().unwrap().insert(
            "now".to_string(),
            VariableValue::String(callcore_core::time::eastern_now_display()),
        );
    }

    /// §4.3.1 / §4.3.2.
    async fn run_single_prompt_turn(
        &self,
        session: &Session,
        sentence_tx: &mpsc::Sender<String>,
    ) -> Result<TurnOutcome> {
        let system_prompt = session.cached_system_prompt.lock().unwrap().clone();
        let system_text = system_prompt
            .as_ref()
            .map(|p| p.to_plain_text())
            .unwrap_or_else(|| session.agent_config.system_prompt.clone());

        let messages: Vec<Message> = session
            .conversation_history
            .lock()
            .unwrap()
            .iter()
            .map(|t| Message {
                role: t.role.clone(),
                content: t.text.clone(),
            })
            .collect();

        let req = ChatRequest {
            model: session.agent_config.settings.llm_model.clone(),
            system: system_text,
            system_prompt,
            messages,
            max_tokens: session.agent_config.settings.max_tokens,
            stream: true,
        };

        let (tx, mut rx) = mpsc::channel(32);
        let mut splitter = SentenceSplitter::new();
        let mut assembled = String::new();
        let mut first_token_at: Option<Instant> = None;
        let turn_start = Instant::now();

        let send_fut = self.llm.send_stream(&req, tx);
        let drain_fut = async {
            while let Some(event) = rx.recv().await {
                match event {
                    callcore_providers::StreamEvent::TextDelta { text } => {
                        if first_token_at.is_none() {
                            first_token_at = Some(Instant::now());
                        }
                        assembled.push_str(&text);
                        for sentence in splitter.push(&text) {
                            let _ = sentence_tx.send(sentence).await;
                        }
                    }
                    callcore_providers::StreamEvent::Thinking { .. } => {}
                    callcore_providers::StreamEvent::Done { .. } => break,
                    callcore_providers::StreamEvent::Error { message } => {
                        warn!(%message, "llm stream error");
                        break;
                    }
                }
            }
        };

        let (send_result, ()) = tokio::join!(send_fut, drain_fut);
        send_result?;

        if let Some(tail) = splitter.finish() {
            let _ = sentence_tx.send(tail).await;
        }

        if let Some(first) = first_token_at {
            info!(latency_ms = (first - turn_start).as_millis() as u64, "first token latency");
        }

        session
            .conversation_history
            .lock()
            .unwrap()
            .push(ConversationTurn::assistant(assembled, None));
        session.record_turn_stats(req.max_tokens as u64);

        Ok(TurnOutcome {
            should_end_call: false,
            transfer_requested: None,
        })
    }

    /// §4.4: delegates to the flow interpreter, then streams its response
    /// text as sentences (one "sentence" when the node spoke a single
    /// short line, several when a script/prompt node's content warrants
    /// splitting) so the TTS Player sees a uniform interface regardless of
    /// agent type.
    async fn run_call_flow_turn(
        &self,
        session: &Session,
        user_message: &str,
        sentence_tx: &mpsc::Sender<String>,
    ) -> Result<TurnOutcome> {
        let interpreter = FlowInterpreter {
            llm: self.llm,
            http: self.http,
            knowledge: self.knowledge,
        };

        let history_snapshot = session.conversation_history.lock().unwrap().clone();
        let current_node_id = session.current_node_id.lock().unwrap().clone();
        let mut variables = session.session_variables.lock().unwrap().clone();

        let result = interpreter
            .run_turn(
                &session.agent_config,
                &session.call_id,
                user_message,
                &history_snapshot,
                &mut variables,
                current_node_id.as_deref(),
            )
            .await?;

        *session.session_variables.lock().unwrap() = variables;
        session.sync_customer_name_alias();
        *session.current_node_id.lock().unwrap() = result.next_node_id.clone();
        session
            .executing_webhook
            .store(result.executing_webhook_happened, std::sync::atomic::Ordering::Relaxed);

        if !result.response_text.is_empty() {
            self.stream_text(&result.response_text, sentence_tx).await;
            session.conversation_history.lock().unwrap().push(ConversationTurn::assistant(
                result.response_text.clone(),
                result.next_node_id.clone(),
            ));
        }

        if !result.pending_background_extraction.is_empty() {
            let model = session.agent_config.settings.llm_model.as_str();
            let snapshot = session.session_variables.lock().unwrap().clone();
            let updates = callcore_flow::extract_variables(
                self.llm,
                model,
                &result.pending_background_extraction,
                &history_snapshot,
                &snapshot,
            )
            .await;
            session.session_variables.lock().unwrap().extend(updates);
            session.sync_customer_name_alias();
        }

        if result.should_end_call {
            session.should_end_call.store(true, std::sync::atomic::Ordering::Relaxed);
        }

        Ok(TurnOutcome {
            should_end_call: result.should_end_call,
            transfer_requested: result.transfer_requested,
        })
    }

    async fn stream_text(&self, text: &str, sentence_tx: &mpsc::Sender<String>) {
        let mut splitter = SentenceSplitter::new();
        for sentence in splitter.push(text) {
            let _ = sentence_tx.send(sentence).await;
        }
        if let Some(tail) = splitter.finish() {
            let _ = sentence_tx.send(tail).await;
        }
    }
}

fn render_node_text(node: &callcore_flow::Node, variables: &std::collections::HashMap<String, VariableValue>) -> String {
    let content = match &node.data {
        callcore_flow::NodeData::Conversation(data) => data.content.clone(),
        callcore_flow::NodeData::Ending { content } => content.clone(),
        _ => String::new(),
    };
    render_vars(&content, variables)
}

fn render_vars(template: &str, variables: &std::collections::HashMap<String, VariableValue>) -> String {
    let mut out = template.to_string();
    for (name, value) in variables {
        out = out.replace(&format!("{{{{{name}}}}}"), &value.as_display_string());
    }
    out
}
