//! Validator value-objects shared by workflow deployments, with their
//! canned failure messages.

use super::step::Validator;
use crate::inbound::{InboundContent, InboundEvent};
use crate::messages::Message;
use once_cell::sync::Lazy;
use regex::Regex;

static ZIP_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}(-)?([0-9]{4})?$").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{3}|(\([0-9]{3}\)))[-. ]?[0-9]{3}[-. ]?[0-9]{4}$").unwrap()
});

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").unwrap());

/// Accepts any event.
pub struct AcceptAnyValidator;

impl Validator for AcceptAnyValidator {
    fn validate(&self, _event: &InboundEvent) -> bool {
        true
    }
}

/// Accepts any free-text event.
pub struct TextMessageValidator;

impl Validator for TextMessageValidator {
    fn validate(&self, event: &InboundEvent) -> bool {
        matches!(event.content, InboundContent::Text(_))
    }
}

/// Accepts a postback whose payload is in the allowed list.
pub struct PostbackValidator {
    allowed_payloads: Vec<String>,
}

impl PostbackValidator {
    pub fn new<I, S>(allowed_payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_payloads: allowed_payloads.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for PostbackValidator {
    fn validate(&self, event: &InboundEvent) -> bool {
        match &event.content {
            InboundContent::Postback(payload) => {
                self.allowed_payloads.iter().any(|allowed| allowed == payload)
            }
            _ => false,
        }
    }
}

/// Accepts a US zip code, plain or zip+4.
pub struct ZipCodeValidator;

impl Validator for ZipCodeValidator {
    fn validate(&self, event: &InboundEvent) -> bool {
        match &event.content {
            InboundContent::Text(text) => ZIP_CODE_RE.is_match(text),
            _ => false,
        }
    }
}

/// Accepts a US phone number like 123-456-7890 or (123) 456 7890.
pub struct PhoneNumberValidator;

impl Validator for PhoneNumberValidator {
    fn validate(&self, event: &InboundEvent) -> bool {
        match &event.content {
            InboundContent::Text(text) => PHONE_RE.is_match(text),
            _ => false,
        }
    }
}

/// Accepts an email address. Rejects addresses containing characters
/// outside the basic multilingual plane, which the platform strips from
/// messages.
pub struct EmailValidator;

impl Validator for EmailValidator {
    fn validate(&self, event: &InboundEvent) -> bool {
        match &event.content {
            InboundContent::Text(text) => {
                EMAIL_RE.is_match(text) && !text.chars().any(|c| c as u32 > 0xFFFF)
            }
            _ => false,
        }
    }
}

pub fn generic_validation_fail_message() -> Message {
    Message::text("Sorry, I couldn't process that. Can you please try that step again?")
}

pub fn postback_validation_fail_message() -> Message {
    Message::text("To continue, just tap a button from the previous question.")
}

pub fn zip_code_validation_fail_message() -> Message {
    Message::text(
        "Sorry! That's not a zip code that we can accept. It should be in one of the following formats:\n12345\n12345-6789",
    )
}

pub fn phone_validation_fail_message() -> Message {
    Message::text(
        "Sorry! That's not a phone number that we can accept. It should be in the following format: 123-456-7890",
    )
}

pub fn email_validation_fail_message() -> Message {
    Message::text(
        "Sorry! That's not an email address that we can accept. It should be in the following format: yourname@example.com",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(content: InboundContent) -> InboundEvent {
        InboundEvent {
            sender: "123".into(),
            recipient: "page".into(),
            timestamp: 0,
            content,
        }
    }

    fn text(text: &str) -> InboundEvent {
        event(InboundContent::Text(text.into()))
    }

    #[test]
    fn text_validator_accepts_only_text() {
        let validator = TextMessageValidator;
        assert!(validator.validate(&text("anything")));
        assert!(!validator.validate(&event(InboundContent::Postback("p".into()))));
        assert!(!validator.validate(&event(InboundContent::Attachments(vec![json!({})]))));
    }

    #[test]
    fn postback_validator_checks_allowlist() {
        let validator = PostbackValidator::new(["step_Yes", "step_No"]);
        assert!(validator.validate(&event(InboundContent::Postback("step_Yes".into()))));
        assert!(!validator.validate(&event(InboundContent::Postback("step_Maybe".into()))));
        assert!(!validator.validate(&text("step_Yes")));
    }

    #[test]
    fn zip_code_validator_accepts_both_formats() {
        let validator = ZipCodeValidator;
        assert!(validator.validate(&text("12345")));
        assert!(validator.validate(&text("12345-6789")));
        assert!(!validator.validate(&text("1234")));
        assert!(!validator.validate(&text("12345-678")));
        assert!(!validator.validate(&text("zip 12345")));
    }

    #[test]
    fn phone_validator_accepts_common_formats() {
        let validator = PhoneNumberValidator;
        assert!(validator.validate(&text("123-456-7890")));
        assert!(validator.validate(&text("(123) 456-7890")));
        assert!(validator.validate(&text("1234567890")));
        assert!(!validator.validate(&text("123-45-7890")));
        assert!(!validator.validate(&text("call me")));
    }

    #[test]
    fn email_validator_accepts_plain_addresses() {
        let validator = EmailValidator;
        assert!(validator.validate(&text("yourname@example.com")));
        assert!(validator.validate(&text("a.b+c@sub.example.org")));
        assert!(!validator.validate(&text("no-at-sign.example.com")));
        assert!(!validator.validate(&text("spaces in@example.com")));
    }

    #[test]
    fn email_validator_rejects_astral_characters() {
        let validator = EmailValidator;
        assert!(!validator.validate(&text("name\u{1F600}@example.com")));
    }
}
