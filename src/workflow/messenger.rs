//! The shipped messenger workflow: a short guided chat about bot
//! building, plus the start-over command, type guard, and trolling
//! escalation used by deployments as a template for their own graphs.

use super::step::{PropertyMap, ResponseHandler, Step, WILDCARD};
use super::validators::{
    generic_validation_fail_message, postback_validation_fail_message, AcceptAnyValidator,
    PostbackValidator, TextMessageValidator,
};
use super::{ConversationWorkflow, SpecialReply};
use crate::config::BotConfig;
use crate::conversation::{Conversation, ConversationStore};
use crate::error::BotError;
use crate::inbound::{EventKind, InboundEvent};
use crate::messages::{Button, Message};
use crate::platform::MessengerClient;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static START_OVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^start *over$").unwrap());

const ALLOWED_MESSAGE_TYPES: &[EventKind] = &[EventKind::Text, EventKind::Postback];

/// The default messenger-platform workflow.
pub struct MessengerBotWorkflow {
    steps: IndexMap<String, Step>,
    store: Arc<dyn ConversationStore>,
    trolling_threshold: u32,
}

impl MessengerBotWorkflow {
    pub fn new(store: Arc<dyn ConversationStore>, config: &BotConfig) -> Result<Self, BotError> {
        Ok(Self {
            steps: build_steps()?,
            store,
            trolling_threshold: config.trolling_threshold,
        })
    }

    /// Destroy the conversation and start a fresh one at the default
    /// step. Persists the replacement itself since it short-circuits the
    /// normal save path.
    fn start_over(&self, conversation: &Conversation) -> Result<SpecialReply, BotError> {
        let default_step = self.default_step_key()?.to_string();
        let user_id = conversation.user_id().to_string();
        self.store.delete(conversation)?;

        let mut fresh = self.store.get(&user_id)?;
        fresh.set_last_step(default_step.clone());
        self.store.save(&fresh)?;

        let messages = self
            .step(&default_step)?
            .question_messages(&PropertyMap::new());
        Ok(SpecialReply::Restart {
            conversation: fresh,
            messages,
        })
    }

    /// Fetch the user's first and last name from the platform profile
    /// API and store them as answers, overwriting earlier values. Falls
    /// back to empty values when the lookup fails.
    pub async fn prime_profile_name(
        &self,
        client: &MessengerClient,
        conversation: &mut Conversation,
    ) -> bool {
        let user_id = conversation.user_id().to_string();
        let profile = match client
            .user_info(&user_id, &["first_name", "last_name"])
            .await
        {
            Ok(profile) => profile,
            Err(error) => {
                tracing::error!("profile lookup for user {user_id} failed: {error:#}");
                Default::default()
            }
        };

        let first_name = profile.get("first_name").cloned().unwrap_or_default();
        let last_name = profile.get("last_name").cloned().unwrap_or_default();
        let found = !first_name.is_empty() && !last_name.is_empty();
        if !found {
            tracing::error!("failed to retrieve first or last name for user {user_id}");
        }
        conversation.set_valid_answer("firstName", &first_name, true);
        conversation.set_valid_answer("lastName", &last_name, true);
        found
    }
}

impl ConversationWorkflow for MessengerBotWorkflow {
    fn steps(&self) -> &IndexMap<String, Step> {
        &self.steps
    }

    fn trolling_threshold(&self) -> u32 {
        self.trolling_threshold
    }

    fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    fn check_disallowed_message_type(
        &self,
        event: &InboundEvent,
        _conversation: &Conversation,
    ) -> Vec<Message> {
        if ALLOWED_MESSAGE_TYPES.contains(&event.kind()) {
            return Vec::new();
        }
        vec![Message::text(
            "Whatever it is that you sent..we can't process it! Try again!",
        )]
    }

    fn preprocess_special_messages(
        &self,
        event: &InboundEvent,
        conversation: &Conversation,
    ) -> Result<SpecialReply, BotError> {
        if let Some(content) = event.content.routing_key() {
            if START_OVER_RE.is_match(content.trim()) {
                return self.start_over(conversation);
            }
        }
        Ok(SpecialReply::None)
    }

    fn trolling_message(&self) -> Vec<Message> {
        vec![
            Message::text("Hey there! I'm not following what you're trying to say."),
            Message::text(
                "Read the last message we sent out to get an idea of what kind of response we're expecting.",
            ),
            Message::text("You can also start over by sending us the text 'Start Over'."),
        ]
    }
}

fn build_steps() -> Result<IndexMap<String, Step>, BotError> {
    let mut steps = IndexMap::new();

    let welcome = Step::new("Welcome", "welcome", Message::text("Hi there!"))?
        .with_validator(TextMessageValidator)
        .with_invalid_response(vec![generic_validation_fail_message()])
        .with_handler(WILDCARD, ResponseHandler::goto("builtABot"));
    steps.insert("welcome".to_string(), welcome);

    let built_a_bot = Step::new(
        "Built A Bot",
        "builtABot",
        Message::button(
            "Glad you stopped by for a chat. Have you ever built a chat bot?",
            vec![
                Button::postback("Yep!", "builtABot_Yes"),
                Button::postback("Nope!", "builtABot_No"),
            ],
        ),
    )?
    .with_validator(PostbackValidator::new(["builtABot_Yes", "builtABot_No"]))
    .with_invalid_response(vec![postback_validation_fail_message()])
    .with_handler("builtABot_Yes", ResponseHandler::goto("veteranBuilder"))
    .with_handler("builtABot_No", ResponseHandler::goto("neverBuilt"));
    steps.insert("builtABot".to_string(), built_a_bot);

    let veteran_builder = Step::new(
        "Veteran Builder",
        "veteranBuilder",
        vec![
            Message::text(
                "Awesome. We'd love to get your constructive feedback on this module we've put together.",
            ),
            Message::text("Maybe even some contributions to our repo if you've got ideas!"),
            Message::button(
                "Click the button below to go to the next step!",
                vec![Button::postback("Final step", "veteranBuilder_final")],
            ),
        ],
    )?
    .with_validator(PostbackValidator::new(["veteranBuilder_final"]))
    .with_invalid_response(vec![postback_validation_fail_message()])
    .with_handler("veteranBuilder_final", ResponseHandler::goto("closing"));
    steps.insert("veteranBuilder".to_string(), veteran_builder);

    let never_built = Step::new(
        "Never Built",
        "neverBuilt",
        vec![
            Message::text(
                "No problem! We hope this module we put together helps you out in launching your own Facebook bot!",
            ),
            Message::button(
                "Click the button below to go to the next step!",
                vec![Button::postback("Final step", "neverBuilt_final")],
            ),
        ],
    )?
    .with_validator(PostbackValidator::new(["neverBuilt_final"]))
    .with_invalid_response(vec![postback_validation_fail_message()])
    .with_handler("neverBuilt_final", ResponseHandler::goto("closing"));
    steps.insert("neverBuilt".to_string(), never_built);

    let closing = Step::new(
        "Closing",
        "closing",
        vec![
            Message::text("Whether or not you've built a bot in the past,"),
            Message::text("drop us a line in Github with comments, thoughts, ideas, and/or feedback."),
            Message::text("Anyone is open to contribute to this project! :)"),
        ],
    )?
    .with_validator(AcceptAnyValidator)
    .with_invalid_response(vec![generic_validation_fail_message()]);
    steps.insert("closing".to_string(), closing);

    Ok(steps)
}
