use crate::error::BotError;
use crate::inbound::{InboundContent, InboundEvent};
use crate::messages::Message;
use std::collections::HashMap;

/// Handler key matched when no exact entry exists for the incoming
/// content.
pub const WILDCARD: &str = "*";

/// Property map passed to templated question producers: placeholder
/// token to the collected answer, `None` when the answer is missing.
pub type PropertyMap = HashMap<String, Option<String>>;

/// Decides whether an inbound event is an acceptable answer for a step.
pub trait Validator: Send + Sync {
    fn validate(&self, event: &InboundEvent) -> bool;
}

impl<F> Validator for F
where
    F: Fn(&InboundEvent) -> bool + Send + Sync,
{
    fn validate(&self, event: &InboundEvent) -> bool {
        self(event)
    }
}

/// Produces a step's question messages from a property map.
pub trait QuestionProducer: Send + Sync {
    fn produce(&self, properties: &PropertyMap) -> Vec<Message>;
}

impl<F> QuestionProducer for F
where
    F: Fn(&PropertyMap) -> Vec<Message> + Send + Sync,
{
    fn produce(&self, properties: &PropertyMap) -> Vec<Message> {
        self(properties)
    }
}

/// Where a step's question comes from: a fixed message list, or a
/// producer invoked with the resolved property map.
pub enum QuestionSource {
    Fixed(Vec<Message>),
    Producer(Box<dyn QuestionProducer>),
}

impl QuestionSource {
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn(&PropertyMap) -> Vec<Message> + Send + Sync + 'static,
    {
        Self::Producer(Box::new(producer))
    }
}

impl From<Message> for QuestionSource {
    fn from(message: Message) -> Self {
        Self::Fixed(vec![message])
    }
}

impl From<Vec<Message>> for QuestionSource {
    fn from(messages: Vec<Message>) -> Self {
        Self::Fixed(messages)
    }
}

/// Routing entry for one expected response: optional messages to send,
/// and the machine name of the step to go to next.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHandler {
    pub messages: Option<Vec<Message>>,
    pub goto_step: String,
}

impl ResponseHandler {
    pub fn goto(step: impl Into<String>) -> Self {
        Self {
            messages: None,
            goto_step: step.into(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }
}

/// One node of the conversation graph: asks a question, validates the
/// answer, decides the next node.
pub struct Step {
    machine_name: String,
    step_name: String,
    question: QuestionSource,
    required_properties: Vec<(String, String)>,
    validator: Box<dyn Validator>,
    invalid_response: Vec<Message>,
    response_handlers: HashMap<String, ResponseHandler>,
    replace_answer: bool,
}

impl Step {
    /// Create a step. The question must be a message, a non-empty list
    /// of messages, or a producer (`QuestionSource::from_fn`).
    pub fn new(
        step_name: impl Into<String>,
        machine_name: impl Into<String>,
        question: impl Into<QuestionSource>,
    ) -> Result<Self, BotError> {
        let machine_name = machine_name.into();
        let question = question.into();
        if let QuestionSource::Fixed(messages) = &question {
            if messages.is_empty() {
                return Err(BotError::InvalidInput(format!(
                    "step '{machine_name}' requires at least one question message"
                )));
            }
        }
        Ok(Self {
            machine_name,
            step_name: step_name.into(),
            question,
            required_properties: Vec::new(),
            validator: Box::new(|_: &InboundEvent| true),
            invalid_response: Vec::new(),
            response_handlers: HashMap::new(),
            replace_answer: false,
        })
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_invalid_response(mut self, messages: Vec<Message>) -> Self {
        self.invalid_response = messages;
        self
    }

    pub fn with_handler(
        mut self,
        content: impl Into<String>,
        handler: ResponseHandler,
    ) -> Self {
        self.response_handlers.insert(content.into(), handler);
        self
    }

    /// Overwrite rather than append when merging this step's answer into
    /// the conversation's collected answers.
    pub fn with_replace_answer(mut self) -> Self {
        self.replace_answer = true;
        self
    }

    /// Declare a placeholder for the templated question. When `lookup`
    /// is omitted the answer name is the placeholder with one leading
    /// `%`, `@`, or `:` sigil stripped.
    pub fn with_required_property(
        mut self,
        replacement: impl Into<String>,
        lookup: Option<&str>,
    ) -> Self {
        let replacement = replacement.into();
        let lookup = match lookup {
            Some(name) => name.to_string(),
            None => replacement
                .strip_prefix(|c| matches!(c, '%' | '@' | ':'))
                .unwrap_or(&replacement)
                .to_string(),
        };
        self.required_properties.push((replacement, lookup));
        self
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn required_properties(&self) -> &[(String, String)] {
        &self.required_properties
    }

    pub fn replaces_answer(&self) -> bool {
        self.replace_answer
    }

    pub fn invalid_response(&self) -> &[Message] {
        &self.invalid_response
    }

    /// Render the question messages for this step.
    pub fn question_messages(&self, properties: &PropertyMap) -> Vec<Message> {
        match &self.question {
            QuestionSource::Fixed(messages) => messages.clone(),
            QuestionSource::Producer(producer) => producer.produce(properties),
        }
    }

    pub fn validate_response(&self, event: &InboundEvent) -> bool {
        self.validator.validate(event)
    }

    /// Evaluate one inbound event against this step.
    ///
    /// Invalid responses retry the same step with the invalid-response
    /// messages. Valid responses route through the handler matching the
    /// content exactly, falling back to the wildcard handler; a step with
    /// neither is misconfigured.
    pub fn process_response(&self, event: &InboundEvent) -> Result<StepOutcome, BotError> {
        let (is_valid, outbound_messages, goto_step) = if !self.validate_response(event) {
            (
                false,
                Some(self.invalid_response.clone()),
                self.machine_name.clone(),
            )
        } else {
            let handler = match event
                .content
                .routing_key()
                .and_then(|key| self.response_handlers.get(key))
            {
                Some(handler) => handler,
                None => self.response_handlers.get(WILDCARD).ok_or_else(|| {
                    BotError::Configuration(format!(
                        "step '{}' has no response handler for the incoming content and no wildcard fallback",
                        self.machine_name
                    ))
                })?,
            };
            (true, handler.messages.clone(), handler.goto_step.clone())
        };

        Ok(StepOutcome {
            step_machine_name: self.machine_name.clone(),
            incoming_content: event.content.clone(),
            is_valid,
            outbound_messages,
            goto_step,
        })
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.step_name)
    }
}

/// Immutable result of evaluating one inbound event against one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    step_machine_name: String,
    incoming_content: InboundContent,
    is_valid: bool,
    outbound_messages: Option<Vec<Message>>,
    goto_step: String,
}

impl StepOutcome {
    pub fn step_machine_name(&self) -> &str {
        &self.step_machine_name
    }

    pub fn incoming_content(&self) -> &InboundContent {
        &self.incoming_content
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn outbound_messages(&self) -> Option<&[Message]> {
        self.outbound_messages.as_deref()
    }

    pub fn goto_step(&self) -> &str {
        &self.goto_step
    }

    pub fn into_outbound_messages(self) -> Option<Vec<Message>> {
        self.outbound_messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::InboundContent;

    fn text_event(text: &str) -> InboundEvent {
        InboundEvent {
            sender: "123".into(),
            recipient: "page".into(),
            timestamp: 0,
            content: InboundContent::Text(text.into()),
        }
    }

    fn postback_event(payload: &str) -> InboundEvent {
        InboundEvent {
            sender: "123".into(),
            recipient: "page".into(),
            timestamp: 0,
            content: InboundContent::Postback(payload.into()),
        }
    }

    fn ask_step() -> Step {
        Step::new("Ask", "ask", Message::text("Sure?"))
            .unwrap()
            .with_validator(|event: &InboundEvent| {
                matches!(event.content, InboundContent::Postback(_))
            })
            .with_invalid_response(vec![Message::text("Tap a button.")])
            .with_handler("ask_Yes", ResponseHandler::goto("done"))
            .with_handler(
                WILDCARD,
                ResponseHandler::goto("fallback")
                    .with_messages(vec![Message::text("Moving on.")]),
            )
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let result = Step::new("Bad", "bad", Vec::<Message>::new());
        assert!(matches!(result, Err(BotError::InvalidInput(_))));
    }

    #[test]
    fn invalid_response_retries_same_step() {
        let step = ask_step();
        let outcome = step.process_response(&text_event("hello")).unwrap();
        assert!(!outcome.is_valid());
        assert_eq!(outcome.goto_step(), "ask");
        assert_eq!(
            outcome.outbound_messages(),
            Some(&[Message::text("Tap a button.")][..])
        );
        assert_eq!(outcome.step_machine_name(), "ask");
    }

    #[test]
    fn valid_response_routes_through_exact_handler() {
        let step = ask_step();
        let outcome = step.process_response(&postback_event("ask_Yes")).unwrap();
        assert!(outcome.is_valid());
        assert_eq!(outcome.goto_step(), "done");
        assert_eq!(outcome.outbound_messages(), None);
        assert_eq!(
            outcome.incoming_content(),
            &InboundContent::Postback("ask_Yes".into())
        );
    }

    #[test]
    fn unmatched_content_falls_back_to_wildcard() {
        let step = ask_step();
        let outcome = step
            .process_response(&postback_event("something_else"))
            .unwrap();
        assert!(outcome.is_valid());
        assert_eq!(outcome.goto_step(), "fallback");
        assert_eq!(
            outcome.outbound_messages(),
            Some(&[Message::text("Moving on.")][..])
        );
    }

    #[test]
    fn missing_wildcard_is_a_configuration_error() {
        let step = Step::new("Ask", "ask", Message::text("Sure?"))
            .unwrap()
            .with_handler("ask_Yes", ResponseHandler::goto("done"));
        let result = step.process_response(&postback_event("ask_No"));
        assert!(matches!(result, Err(BotError::Configuration(_))));
    }

    #[test]
    fn fixed_question_ignores_properties() {
        let step = ask_step();
        let mut properties = PropertyMap::new();
        properties.insert("%name".into(), Some("Ada".into()));
        assert_eq!(
            step.question_messages(&properties),
            vec![Message::text("Sure?")]
        );
    }

    #[test]
    fn produced_question_sees_properties() {
        let step = Step::new(
            "Greet",
            "greet",
            QuestionSource::from_fn(|properties: &PropertyMap| {
                let name = properties
                    .get("%name")
                    .and_then(|v| v.clone())
                    .unwrap_or_else(|| "friend".to_string());
                vec![Message::text(format!("Hi {name}!"))]
            }),
        )
        .unwrap();

        let mut properties = PropertyMap::new();
        properties.insert("%name".into(), Some("Ada".into()));
        assert_eq!(
            step.question_messages(&properties),
            vec![Message::text("Hi Ada!")]
        );

        properties.insert("%name".into(), None);
        assert_eq!(
            step.question_messages(&properties),
            vec![Message::text("Hi friend!")]
        );
    }

    #[test]
    fn required_property_strips_one_leading_sigil() {
        let step = Step::new("Greet", "greet", Message::text("Hi"))
            .unwrap()
            .with_required_property("%firstName", None)
            .with_required_property("@city", Some("homeTown"));
        assert_eq!(
            step.required_properties(),
            &[
                ("%firstName".to_string(), "firstName".to_string()),
                ("@city".to_string(), "homeTown".to_string()),
            ]
        );
    }

    #[test]
    fn display_uses_human_name() {
        let step = ask_step();
        assert_eq!(step.to_string(), "Ask");
    }
}
