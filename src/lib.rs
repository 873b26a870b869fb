//! Scripted multi-turn conversation workflows for messaging platforms.
//!
//! A workflow is an ordered graph of steps; each step asks a question,
//! validates the user's answer, and routes to the next step. The engine
//! tracks per-user progress (collected answers, error escalation,
//! completion) and selects the outbound messages for every turn.
//!
//! - [`inbound`]: webhook batch translation into normalized events
//! - [`workflow`]: the step state machine and turn-processing engine
//! - [`messages`]: typed outbound message model and text splitting
//! - [`conversation`]: per-user progress records and the store contract
//! - [`platform`]: Send/Profile API client and the delivery seam
//! - [`bot`]: batch driver wiring the pieces together

pub mod bot;
pub mod config;
pub mod conversation;
pub mod error;
pub mod inbound;
pub mod messages;
pub mod platform;
pub mod workflow;

pub use bot::Bot;
pub use config::BotConfig;
pub use conversation::{Conversation, ConversationStore, MemoryConversationStore};
pub use error::BotError;
pub use inbound::{translate, EventKind, InboundContent, InboundEvent};
pub use messages::{split_text_message, Button, Message, TEXT_OUT_LIMIT};
pub use platform::{MessageSender, MessengerClient};
pub use workflow::{
    ConversationWorkflow, MessengerBotWorkflow, PropertyMap, QuestionSource, ResponseHandler,
    SpecialReply, Step, StepOutcome, Validator, WILDCARD,
};
