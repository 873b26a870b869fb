pub mod split;

pub use split::{split_text_message, TEXT_OUT_LIMIT};

use crate::error::BotError;
use serde_json::{json, Value};
use url::Url;

/// A button attached to a [`Message::Button`] template.
///
/// The platform accepts exactly two button types; anything else is
/// rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    /// Tapping sends a fixed payload string back as a postback event.
    Postback { title: String, payload: String },
    /// Tapping opens a web URL.
    Url { title: String, url: String },
}

impl Button {
    pub fn postback(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Postback {
            title: title.into(),
            payload: payload.into(),
        }
    }

    pub fn url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Build a button from a wire-level discriminant tag.
    ///
    /// `value` is the payload for `postback` buttons and the link for
    /// `web_url` buttons. Any other tag is rejected.
    pub fn from_tag(tag: &str, title: &str, value: &str) -> Result<Self, BotError> {
        match tag {
            "postback" => Ok(Self::postback(title, value)),
            "web_url" => Ok(Self::url(title, value)),
            other => Err(BotError::InvalidInput(format!(
                "'{other}' is not a valid button type"
            ))),
        }
    }

    /// The wire discriminant for this button.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Postback { .. } => "postback",
            Self::Url { .. } => "web_url",
        }
    }

    /// The button as a platform payload map, exposing exactly its public
    /// fields.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Postback { title, payload } => json!({
                "type": self.tag(),
                "title": title,
                "payload": payload,
            }),
            Self::Url { title, url } => json!({
                "type": self.tag(),
                "title": title,
                "url": url,
            }),
        }
    }
}

/// An outbound message in one of the platform's template shapes.
///
/// Immutable once constructed; [`Message::formatted`] renders the
/// structured payload the Send API expects.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text { text: String },
    Button { text: String, buttons: Vec<Button> },
    Generic { elements: Vec<Value> },
    List { elements: Vec<Value> },
    Video { url: String },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn button(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self::Button {
            text: text.into(),
            buttons,
        }
    }

    /// Generic template; `elements` are passed through to the platform
    /// verbatim.
    pub fn generic(elements: Vec<Value>) -> Self {
        Self::Generic { elements }
    }

    /// List template; `elements` are passed through to the platform
    /// verbatim.
    pub fn list(elements: Vec<Value>) -> Self {
        Self::List { elements }
    }

    /// Video attachment. The URL must be a syntactically valid absolute
    /// URL.
    pub fn video(url: impl Into<String>) -> Result<Self, BotError> {
        let url = url.into();
        if Url::parse(&url).is_err() {
            return Err(BotError::InvalidInput(format!(
                "invalid URL passed to video message: '{url}'"
            )));
        }
        Ok(Self::Video { url })
    }

    /// Render the platform-ready payload for this message.
    pub fn formatted(&self) -> Value {
        match self {
            Self::Text { text } => json!({ "text": text }),
            Self::Button { text, buttons } => {
                let buttons: Vec<Value> = buttons.iter().map(Button::to_value).collect();
                json!({
                    "attachment": {
                        "type": "template",
                        "payload": {
                            "template_type": "button",
                            "text": text,
                            "buttons": buttons,
                        },
                    },
                })
            }
            Self::Generic { elements } => template_payload("generic", elements),
            Self::List { elements } => template_payload("list", elements),
            Self::Video { url } => json!({
                "attachment": {
                    "type": "video",
                    "payload": { "url": url },
                },
            }),
        }
    }
}

fn template_payload(template_type: &str, elements: &[Value]) -> Value {
    json!({
        "attachment": {
            "type": "template",
            "payload": {
                "template_type": template_type,
                "elements": elements,
            },
        },
    })
}
