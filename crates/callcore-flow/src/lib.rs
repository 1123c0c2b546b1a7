//! Flow interpreter: selects the active call-flow node, runs the
//! mandatory-variable precheck and transition evaluation, dispatches
//! per-node-type processing (script/prompt conversation, webhooks,
//! logic splits, DTMF, input collection, extraction, transfer, SMS,
//! ending), and surfaces the non-mandatory background extraction work
//! the caller should run after the response has gone out.

mod error;
mod extraction;
mod operators;
mod processor;
mod selection;
mod transition;
mod types;
mod validation;
mod webhook;

pub use error::{FlowError, Result};
pub use extraction::extract_variables;
pub use processor::{FlowInterpreter, TransferInfo, TurnResult};
pub use types::{
    AgentConfig, AgentSettings, AgentType, CollectInputData, ConversationData, ConversationMode,
    ConversationTurn, DialogueType, ExtractVariableData, ExtractVariableSpec, FunctionData,
    InputType, LogicCondition, LogicSplitData, Node, NodeData, Operator, PressDigitData,
    RepromptType, SendSmsData, Transition, TransferData, WhoSpeaksFirst,
};
