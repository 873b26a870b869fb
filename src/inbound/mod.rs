use crate::error::BotError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// The classified type of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Text,
    Postback,
    Attachment,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Postback => "postback",
            Self::Attachment => "attachment",
        }
    }
}

/// The content of an inbound event. The variant is the event type, so
/// type and content can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundContent {
    /// Free text typed by the user.
    Text(String),
    /// The payload string of a tapped postback button.
    Postback(String),
    /// Attachment descriptors, passed through as received.
    Attachments(Vec<Value>),
}

impl InboundContent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Text(_) => EventKind::Text,
            Self::Postback(_) => EventKind::Postback,
            Self::Attachments(_) => EventKind::Attachment,
        }
    }

    /// The string used to match response handlers. Attachments have no
    /// routing key and always fall through to the wildcard handler.
    pub fn routing_key(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Postback(payload) => Some(payload),
            Self::Attachments(_) => None,
        }
    }

    /// The content as collectable answer text. Attachment lists are
    /// JSON-encoded.
    pub fn answer_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Postback(payload) => payload.clone(),
            Self::Attachments(list) => {
                serde_json::to_string(list).unwrap_or_default()
            }
        }
    }
}

/// One normalized inbound event, ready for the workflow engine.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub sender: String,
    pub recipient: String,
    pub timestamp: i64,
    pub content: InboundContent,
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        self.content.kind()
    }
}

/// Raw webhook batch as delivered by the platform. Only the container
/// shape is enforced; the messaging events themselves are inspected
/// leniently, one by one.
#[derive(Debug, Deserialize)]
pub struct Batch {
    pub entry: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BatchEntry {
    #[serde(default)]
    pub messaging: Vec<Value>,
}

/// Classify a raw messaging event. Text wins over postback, postback
/// over attachments; anything else is undetermined.
pub fn kind_of(event: &Value) -> Option<EventKind> {
    if event
        .pointer("/message/text")
        .and_then(Value::as_str)
        .is_some()
    {
        Some(EventKind::Text)
    } else if event.get("postback").is_some_and(|v| !v.is_null()) {
        Some(EventKind::Postback)
    } else if event
        .pointer("/message/attachments")
        .is_some_and(|v| !v.is_null())
    {
        Some(EventKind::Attachment)
    } else {
        None
    }
}

/// Extract the content matching the event's classified kind, or `None`
/// when it cannot be determined.
pub fn content_of(event: &Value) -> Option<InboundContent> {
    match kind_of(event)? {
        EventKind::Text => event
            .pointer("/message/text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| InboundContent::Text(text.to_string())),
        EventKind::Postback => event
            .pointer("/postback/payload")
            .and_then(Value::as_str)
            .filter(|payload| !payload.is_empty())
            .map(|payload| InboundContent::Postback(payload.to_string())),
        EventKind::Attachment => event
            .pointer("/message/attachments")
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty())
            .map(|list| InboundContent::Attachments(list.clone())),
    }
}

fn party_id(event: &Value, key: &str) -> Option<String> {
    match event.pointer(&format!("/{key}/id"))? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Translate a raw webhook batch into per-sender ordered event lists.
///
/// The relative order of one sender's events is preserved within and
/// across batch entries; senders are independent of each other. Events
/// whose sender, type, or content cannot be determined are skipped with
/// a diagnostic rather than failing the batch.
pub fn translate(raw: &str) -> Result<IndexMap<String, Vec<InboundEvent>>, BotError> {
    let batch: Batch = serde_json::from_str(raw)
        .map_err(|e| BotError::MalformedPayload(e.to_string()))?;

    let mut events: IndexMap<String, Vec<InboundEvent>> = IndexMap::new();
    for entry in &batch.entry {
        for raw_event in &entry.messaging {
            let sender = party_id(raw_event, "sender");
            let content = content_of(raw_event);
            let (Some(sender), Some(content)) = (sender, content) else {
                tracing::warn!("omitting inbound event due to unexpected structure");
                continue;
            };

            events.entry(sender.clone()).or_default().push(InboundEvent {
                sender,
                recipient: party_id(raw_event, "recipient").unwrap_or_default(),
                timestamp: raw_event
                    .get("timestamp")
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                content,
            });
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_event(sender: &str, text: &str) -> Value {
        json!({
            "sender": { "id": sender },
            "recipient": { "id": "page_1" },
            "timestamp": 1_458_692_752_478_i64,
            "message": { "text": text },
        })
    }

    fn postback_event(sender: &str, payload: &str) -> Value {
        json!({
            "sender": { "id": sender },
            "recipient": { "id": "page_1" },
            "timestamp": 1_458_692_752_480_i64,
            "postback": { "payload": payload },
        })
    }

    fn batch(messaging: Vec<Value>) -> String {
        json!({ "entry": [{ "messaging": messaging }] }).to_string()
    }

    #[test]
    fn classifies_text_before_postback_and_attachment() {
        let mixed = json!({
            "sender": { "id": "u" },
            "message": { "text": "hi", "attachments": [{}] },
            "postback": { "payload": "p" },
        });
        assert_eq!(kind_of(&mixed), Some(EventKind::Text));
        assert_eq!(
            content_of(&mixed),
            Some(InboundContent::Text("hi".into()))
        );
    }

    #[test]
    fn classifies_postback_and_attachment() {
        let postback = postback_event("u", "step_Yes");
        assert_eq!(kind_of(&postback), Some(EventKind::Postback));
        assert_eq!(
            content_of(&postback),
            Some(InboundContent::Postback("step_Yes".into()))
        );

        let attachment = json!({
            "sender": { "id": "u" },
            "message": { "attachments": [{ "type": "image" }] },
        });
        assert_eq!(kind_of(&attachment), Some(EventKind::Attachment));
        match content_of(&attachment) {
            Some(InboundContent::Attachments(list)) => assert_eq!(list.len(), 1),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn undetermined_kind_is_none() {
        let unknown = json!({ "sender": { "id": "u" }, "delivery": {} });
        assert_eq!(kind_of(&unknown), None);
        assert_eq!(content_of(&unknown), None);
    }

    #[test]
    fn translate_groups_by_sender_preserving_order() {
        let raw = batch(vec![
            text_event("alice", "one"),
            text_event("bob", "hello"),
            text_event("alice", "two"),
        ]);
        let events = translate(&raw).unwrap();
        assert_eq!(events.len(), 2);
        let alice = &events["alice"];
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].content, InboundContent::Text("one".into()));
        assert_eq!(alice[1].content, InboundContent::Text("two".into()));
        assert_eq!(events["bob"].len(), 1);
    }

    #[test]
    fn translate_spans_multiple_entries() {
        let raw = json!({
            "entry": [
                { "messaging": [text_event("alice", "one")] },
                { "messaging": [text_event("alice", "two")] },
            ],
        })
        .to_string();
        let events = translate(&raw).unwrap();
        let alice = &events["alice"];
        assert_eq!(alice[0].content, InboundContent::Text("one".into()));
        assert_eq!(alice[1].content, InboundContent::Text("two".into()));
    }

    #[test]
    fn translate_skips_unusable_events() {
        let no_sender = json!({ "message": { "text": "hi" } });
        let no_content = json!({ "sender": { "id": "carol" }, "delivery": {} });
        let empty_text = json!({
            "sender": { "id": "carol" },
            "message": { "text": "" },
        });
        let raw = batch(vec![no_sender, no_content, empty_text, text_event("dave", "kept")]);
        let events = translate(&raw).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events["dave"].len(), 1);
    }

    #[test]
    fn translate_accepts_numeric_sender_ids() {
        let raw = batch(vec![json!({
            "sender": { "id": 12345 },
            "recipient": { "id": 67890 },
            "timestamp": 5,
            "message": { "text": "hi" },
        })]);
        let events = translate(&raw).unwrap();
        assert_eq!(events["12345"][0].recipient, "67890");
        assert_eq!(events["12345"][0].timestamp, 5);
    }

    #[test]
    fn translate_rejects_missing_entry_container() {
        let err = translate(r#"{"object": "page"}"#).unwrap_err();
        assert!(matches!(err, BotError::MalformedPayload(_)));

        let err = translate("not json").unwrap_err();
        assert!(matches!(err, BotError::MalformedPayload(_)));
    }

    #[test]
    fn entry_without_messaging_is_empty() {
        let raw = json!({ "entry": [{ "id": "page" }] }).to_string();
        let events = translate(&raw).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn answer_text_for_attachments_is_json() {
        let content = InboundContent::Attachments(vec![json!({"type": "image"})]);
        assert_eq!(content.answer_text(), r#"[{"type":"image"}]"#);
        assert_eq!(content.routing_key(), None);
    }
}
