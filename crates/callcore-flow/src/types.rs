use std::collections::HashMap;

use callcore_providers::provider::Role;
use serde::{Deserialize, Serialize};

/// Which side speaks first on a fresh call (`start` node, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoSpeaksFirst {
    Ai,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    Script,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueType {
    Static,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepromptType {
    Static,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Text,
    Email,
    Phone,
    Number,
}

/// `logic_split` comparison operators (§4.4.4), applied to `session_variables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Exists,
    NotExists,
    StartsWith,
    EndsWith,
}

/// `{condition, nextNode, check_variables?}` (§3). Eligible only if every
/// name in `check_variables` is present and non-null in `session_variables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub condition: String,
    pub next_node: String,
    #[serde(default)]
    pub check_variables: Vec<String>,
}

/// `{name, description, extraction_hint?, mandatory?, allow_update?,
/// reprompt_text?, reprompt_type, prompt_message?}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractVariableSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub extraction_hint: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub allow_update: bool,
    #[serde(default)]
    pub reprompt_text: Option<String>,
    #[serde(default = "default_reprompt_type")]
    pub reprompt_type: RepromptType,
    #[serde(default)]
    pub prompt_message: Option<String>,
}

fn default_reprompt_type() -> RepromptType {
    RepromptType::Static
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationData {
    /// Auto-detected when absent: `script` if `script` content is set and
    /// no `goal`, else `prompt`.
    #[serde(default)]
    pub mode: Option<ConversationMode>,
    /// `script` or `content` field of the source node — same meaning.
    pub content: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub dynamic_rephrase: bool,
    #[serde(default)]
    pub rephrase_prompt: Option<String>,
    #[serde(default)]
    pub extract_variables: Vec<ExtractVariableSpec>,
    #[serde(default)]
    pub auto_transition_to: Option<String>,
    /// Unconditional transition target evaluated *after* the user has
    /// spoken and their response was captured (§4.4.3 item 1): distinct
    /// from `auto_transition_to`, which skips evaluation immediately
    /// without waiting for a user turn at all.
    #[serde(default)]
    pub auto_transition_after_response: Option<String>,
    #[serde(default)]
    pub skip_mandatory_precheck: bool,
    #[serde(default)]
    pub use_parallel_llm: bool,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl ConversationData {
    /// Resolves the effective mode per the auto-detection rule (§3's
    /// "auto-detected when absent"): `prompt` when a `goal` is set and no
    /// explicit mode was given, `script` otherwise.
    pub fn effective_mode(&self) -> ConversationMode {
        match self.mode {
            Some(m) => m,
            None if self.goal.is_some() => ConversationMode::Prompt,
            None => ConversationMode::Script,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionData {
    pub webhook_url: String,
    #[serde(default = "default_webhook_method")]
    pub webhook_method: String,
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,
    pub webhook_body: serde_json::Value,
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
    #[serde(default = "default_webhook_max_retries")]
    pub webhook_max_retries: u32,
    #[serde(default = "default_response_variable")]
    pub response_variable: String,
    #[serde(default)]
    pub speak_during_execution: bool,
    #[serde(default)]
    pub dialogue_text: Option<String>,
    #[serde(default = "default_dialogue_type")]
    pub dialogue_type: DialogueType,
    #[serde(default = "default_true")]
    pub wait_for_result: bool,
    #[serde(default)]
    pub extract_variables: Vec<ExtractVariableSpec>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

fn default_webhook_method() -> String {
    "POST".to_string()
}
fn default_webhook_timeout_secs() -> u64 {
    10
}
fn default_webhook_max_retries() -> u32 {
    1
}
fn default_response_variable() -> String {
    "webhook_response".to_string()
}
fn default_dialogue_type() -> DialogueType {
    DialogueType::Static
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicCondition {
    pub variable: String,
    pub operator: Operator,
    pub value: String,
    pub next_node: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicSplitData {
    pub conditions: Vec<LogicCondition>,
    #[serde(default)]
    pub default_next_node: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressDigitData {
    pub prompt_message: String,
    /// Single-character `[0-9*#]` keys.
    pub digit_mappings: HashMap<char, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectInputData {
    pub input_type: InputType,
    pub variable_name: String,
    pub prompt_message: String,
    #[serde(default = "default_error_message")]
    pub error_message: String,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

fn default_error_message() -> String {
    "Sorry, I didn't catch that — could you say that again?".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractVariableData {
    pub variable_name: String,
    pub extraction_prompt: String,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferData {
    pub destination: String,
    pub announcement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSmsData {
    pub message_template: String,
    pub to_variable: String,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    Start {
        #[serde(rename = "whoSpeaksFirst")]
        who_speaks_first: WhoSpeaksFirst,
    },
    Conversation(ConversationData),
    Function(FunctionData),
    LogicSplit(LogicSplitData),
    PressDigit(PressDigitData),
    CollectInput(CollectInputData),
    ExtractVariable(ExtractVariableData),
    CallTransfer(TransferData),
    AgentTransfer(TransferData),
    Ending {
        content: String,
    },
    SendSms(SendSmsData),
}

impl NodeData {
    /// Transitions this node type carries, if any. `logic_split`,
    /// `press_digit` and `collect_input`'s routing isn't a `Transition`
    /// list (it's condition/digit/validation-keyed) so they return `&[]`.
    pub fn transitions(&self) -> &[Transition] {
        match self {
            NodeData::Conversation(d) => &d.transitions,
            NodeData::Function(d) => &d.transitions,
            NodeData::ExtractVariable(d) => &d.transitions,
            NodeData::CollectInput(d) => &d.transitions,
            NodeData::SendSms(d) => &d.transitions,
            _ => &[],
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            NodeData::Conversation(_)
                | NodeData::CollectInput(_)
                | NodeData::PressDigit(_)
                | NodeData::ExtractVariable(_)
        )
    }

    pub fn is_conversation(&self) -> bool {
        matches!(self, NodeData::Conversation(_))
    }
}

/// A node in the call-flow graph (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub data: NodeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    SinglePrompt,
    CallFlow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub stt_provider: Option<String>,
    pub llm_provider: String,
    #[serde(default)]
    pub tts_provider: Option<String>,
    pub llm_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub voice_settings: serde_json::Value,
    #[serde(default)]
    pub dead_air_settings: Option<callcore_deadair::DeadAirTimings>,
    #[serde(default)]
    pub provider_settings: serde_json::Value,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

/// Snapshot of the agent definition captured at session start (§3); never
/// refreshed mid-call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub agent_type: AgentType,
    pub system_prompt: String,
    pub settings: AgentSettings,
    #[serde(default)]
    pub call_flow: Vec<Node>,
    #[serde(default)]
    pub knowledge_base: bool,
}

impl AgentConfig {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.call_flow.iter().find(|n| n.id == id)
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.call_flow
            .iter()
            .find(|n| matches!(n.data, NodeData::Start { .. }))
    }
}

/// One turn of conversation history (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    /// Flow-mode turns only: the node that produced/consumed this turn.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Set only by the dead-air supervisor's greeting injection path
    /// (open question D3) — distinguishes a real silence-greeting turn
    /// from anything that merely looks like one under the length/`?`
    /// heuristic.
    #[serde(default)]
    pub is_silence_greeting: bool,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            node_id: None,
            is_silence_greeting: false,
        }
    }

    pub fn assistant(text: impl Into<String>, node_id: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            node_id,
            is_silence_greeting: false,
        }
    }

    /// Heuristic fallback for D3: short and interrogative.
    pub fn looks_like_silence_greeting(&self) -> bool {
        self.text.len() <= 50 && self.text.contains('?')
    }
}
