use serde::Deserialize;

/// Bot settings: platform credentials, trolling escalation, and send-side
/// logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Base URL of the platform's graph API, with trailing slash.
    pub api_url: String,
    /// Page access token appended to Send and Profile API calls.
    pub page_access_token: String,
    /// Invalid-turn count at which the trolling message takes over.
    pub trolling_threshold: u32,
    /// Emit a debug log with the JSON body of every outgoing POST.
    pub log_outgoing_post: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com/v2.6/".to_string(),
            page_access_token: String::new(),
            trolling_threshold: 3,
            log_outgoing_post: false,
        }
    }
}

impl BotConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse bot config: {e}"))
    }
}
