use crate::config::BotConfig;
use crate::messages::Message;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Outbound delivery seam. Implement for any transport; the default
/// `send_all` gives the fire-and-forget-per-message behavior the engine
/// assumes: one failure is logged and never stops the rest of the turn's
/// messages.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &Message, user_id: &str) -> anyhow::Result<()>;

    async fn send_all(&self, messages: &[Message], user_id: &str) {
        for message in messages {
            if let Err(error) = self.send(message, user_id).await {
                tracing::error!("sending message to user {user_id} failed: {error:#}");
            }
        }
    }
}

/// Client for the messenger platform's Send and User Profile APIs.
pub struct MessengerClient {
    api_url: String,
    page_access_token: String,
    log_outgoing_post: bool,
    client: reqwest::Client,
}

impl MessengerClient {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            page_access_token: config.page_access_token.clone(),
            log_outgoing_post: config.log_outgoing_post,
            client: reqwest::Client::new(),
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Send one message to a user via the Send API.
    pub async fn send_message(&self, message: &Message, user_id: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "recipient": { "id": user_id },
            "message": message.formatted(),
        });
        if self.log_outgoing_post {
            tracing::debug!("sending outgoing POST (in JSON): {body}");
        }

        let url = format!(
            "{}?access_token={}",
            self.api_url("me/messages"),
            self.page_access_token
        );
        let resp = self.client.post(&url).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let data: Value = resp.json().await.unwrap_or_default();
            if let Some(error) = data.get("error") {
                log_platform_error("Send API", error);
            }
            anyhow::bail!("Send API request failed ({status})");
        }
        Ok(())
    }

    /// Fetch profile fields for a user from the User Profile API.
    pub async fn user_info(
        &self,
        user_id: &str,
        fields: &[&str],
    ) -> anyhow::Result<HashMap<String, String>> {
        let resp = self
            .client
            .get(self.api_url(user_id))
            .query(&[
                ("fields", fields.join(",").as_str()),
                ("access_token", self.page_access_token.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let data: Value = resp.json().await.unwrap_or_default();
            if let Some(error) = data.get("error") {
                log_platform_error("User Profile API", error);
            }
            anyhow::bail!("User Profile API request failed ({status})");
        }

        let data: Value = resp.json().await?;
        let mut info = HashMap::new();
        if let Some(map) = data.as_object() {
            for (field, value) in map {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                info.insert(field.clone(), value);
            }
        }
        Ok(info)
    }
}

#[async_trait]
impl MessageSender for MessengerClient {
    async fn send(&self, message: &Message, user_id: &str) -> anyhow::Result<()> {
        self.send_message(message, user_id).await
    }
}

fn log_platform_error(api: &str, error: &Value) {
    let message = error.get("message").and_then(Value::as_str).unwrap_or("");
    let error_type = error.get("type").and_then(Value::as_str).unwrap_or("");
    let code = error.get("code").map(ToString::to_string).unwrap_or_default();
    tracing::error!("{api} error: {message}. Type: {error_type}. Code: {code}.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn api_url_joins_paths() {
        let client = MessengerClient::new(&BotConfig::default());
        assert_eq!(
            client.api_url("me/messages"),
            "https://graph.facebook.com/v2.6/me/messages"
        );
        assert_eq!(client.api_url("12345"), "https://graph.facebook.com/v2.6/12345");
    }

    /// Sender that fails on request, recording each attempt.
    struct FlakySender {
        attempts: Mutex<Vec<String>>,
        fail_on: usize,
    }

    #[async_trait]
    impl MessageSender for FlakySender {
        async fn send(&self, message: &Message, _user_id: &str) -> anyhow::Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            let index = attempts.len();
            let label = match message {
                Message::Text { text } => text.clone(),
                other => format!("{other:?}"),
            };
            attempts.push(label);
            if index == self.fail_on {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_all_continues_past_failures() {
        let sender = FlakySender {
            attempts: Mutex::new(Vec::new()),
            fail_on: 0,
        };
        let messages = vec![
            Message::text("one"),
            Message::text("two"),
            Message::text("three"),
        ];
        sender.send_all(&messages, "123").await;
        let attempts = sender.attempts.lock().unwrap();
        assert_eq!(attempts.as_slice(), &["one", "two", "three"]);
    }
}
