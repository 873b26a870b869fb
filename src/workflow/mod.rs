pub mod messenger;
pub mod step;
pub mod validators;

pub use messenger::MessengerBotWorkflow;
pub use step::{
    PropertyMap, QuestionProducer, QuestionSource, ResponseHandler, Step, StepOutcome,
    Validator, WILDCARD,
};

use crate::conversation::{Conversation, ConversationStore};
use crate::error::BotError;
use crate::inbound::InboundEvent;
use crate::messages::Message;
use indexmap::IndexMap;

/// Result of a special-message hook.
#[derive(Debug)]
pub enum SpecialReply {
    /// Nothing special about this event; continue normal processing.
    None,
    /// Short-circuit the turn with these messages.
    Messages(Vec<Message>),
    /// Short-circuit and hand the engine a replacement conversation,
    /// e.g. after a restart. The hook has already persisted it.
    Restart {
        conversation: Conversation,
        messages: Vec<Message>,
    },
}

/// A conversation workflow: an insertion-ordered step graph plus the
/// turn-processing algorithm and its overridable hook points.
///
/// The first inserted step is the default (start) step; the last is the
/// final step, whose reaching marks the conversation complete.
///
/// Callers must serialize turns per user id: `process_conversation`
/// reads and writes several conversation fields with a single save at
/// the end, so interleaving two events for the same user corrupts
/// progress. Different users are independent.
pub trait ConversationWorkflow: Send + Sync {
    /// The ordered step graph.
    fn steps(&self) -> &IndexMap<String, Step>;

    /// Invalid turns at or above this count escalate to the trolling
    /// message.
    fn trolling_threshold(&self) -> u32;

    /// The store used for the end-of-turn save (and by restart hooks).
    fn store(&self) -> &dyn ConversationStore;

    /// Reject event types the workflow does not accept. A non-empty
    /// return short-circuits the turn before any conversation mutation.
    fn check_disallowed_message_type(
        &self,
        _event: &InboundEvent,
        _conversation: &Conversation,
    ) -> Vec<Message> {
        Vec::new()
    }

    /// Intercept special content (e.g. a restart command) before
    /// validation. Runs after the type guard; responsible for its own
    /// persistence.
    fn preprocess_special_messages(
        &self,
        _event: &InboundEvent,
        _conversation: &Conversation,
    ) -> Result<SpecialReply, BotError> {
        Ok(SpecialReply::None)
    }

    /// Produce a special response after a valid turn, overriding the
    /// step's own outbound messages.
    fn process_special_messages(
        &self,
        _event: &InboundEvent,
        _conversation: &Conversation,
    ) -> Vec<Message> {
        Vec::new()
    }

    /// The escalation response for repeated invalid input.
    fn trolling_message(&self) -> Vec<Message> {
        vec![Message::text(
            "Read the last message we sent out carefully and try again.",
        )]
    }

    /// Machine name of the workflow's start step (first inserted key).
    fn default_step_key(&self) -> Result<&str, BotError> {
        self.steps()
            .keys()
            .next()
            .map(String::as_str)
            .ok_or_else(|| BotError::Configuration("workflow has no steps".into()))
    }

    /// Machine name of the workflow's final step (last inserted key).
    fn final_step_key(&self) -> Result<&str, BotError> {
        self.steps()
            .keys()
            .last()
            .map(String::as_str)
            .ok_or_else(|| BotError::Configuration("workflow has no steps".into()))
    }

    /// Look up a step by machine name.
    fn step(&self, key: &str) -> Result<&Step, BotError> {
        self.steps()
            .get(key)
            .ok_or_else(|| BotError::UnknownStep(key.to_string()))
    }

    /// Advance a conversation by one inbound event and select the
    /// response to send.
    ///
    /// The order here is a contract: type guard, then the pre-validation
    /// hook (both short-circuit without the end-of-turn save), then step
    /// invocation with answer/error bookkeeping, transition, completion
    /// detection, response selection, and a single save covering every
    /// mutation of the turn.
    fn process_conversation(
        &self,
        conversation: &mut Conversation,
        event: &InboundEvent,
    ) -> Result<Vec<Message>, BotError> {
        let guard_response = self.check_disallowed_message_type(event, conversation);
        if !guard_response.is_empty() {
            return Ok(guard_response);
        }

        match self.preprocess_special_messages(event, conversation)? {
            SpecialReply::None => {}
            SpecialReply::Messages(messages) => {
                if !messages.is_empty() {
                    return Ok(messages);
                }
            }
            SpecialReply::Restart {
                conversation: replacement,
                messages,
            } => {
                *conversation = replacement;
                return Ok(messages);
            }
        }

        let mut goto_step = self.default_step_key()?.to_string();
        let mut pending_outbound: Option<Vec<Message>> = None;
        let mut response_valid = true;

        // A brand-new conversation has no last step: skip invocation and
        // fall through to the default step's question.
        if let Some(last_step) = conversation.last_step().map(str::to_string) {
            let this_step = self.step(&last_step)?;
            let outcome = this_step.process_response(event)?;

            if outcome.is_valid() {
                conversation.set_valid_answer(
                    outcome.step_machine_name(),
                    &outcome.incoming_content().answer_text(),
                    this_step.replaces_answer(),
                );
                conversation.reset_error_count();
            } else {
                response_valid = false;
                conversation.increment_error_count();
            }

            goto_step = outcome.goto_step().to_string();
            pending_outbound = outcome.into_outbound_messages();
        }

        conversation.set_last_step(goto_step.clone());
        if goto_step == self.final_step_key()? {
            conversation.set_complete(true);
        }

        // The post-validation hook only runs for valid turns.
        let special = if response_valid {
            self.process_special_messages(event, conversation)
        } else {
            Vec::new()
        };

        let response = if conversation.error_count() >= self.trolling_threshold() {
            self.trolling_message()
        } else if !special.is_empty() {
            special
        } else {
            match pending_outbound {
                Some(messages) if !messages.is_empty() => messages,
                _ => {
                    let current_step = self.step(&goto_step)?;
                    let mut properties = PropertyMap::new();
                    for (replacement, lookup) in current_step.required_properties() {
                        properties.insert(
                            replacement.clone(),
                            conversation.valid_answers().get(lookup).cloned(),
                        );
                    }
                    current_step.question_messages(&properties)
                }
            }
        };

        self.store().save(conversation)?;
        Ok(response)
    }
}
