use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Notifier, ParseMode};
use crate::config::{HttpConfig, TelegramConfig};
use crate::error::NotifyError;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API `sendMessage` to a single chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig, http: HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(http.timeout).build()?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token: cfg.token.clone(),
            chat_id: cfg.chat_id.clone(),
        })
    }

    /// Point at a different Bot API server (local bot-api, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    fn payload<'a>(&'a self, text: &'a str, mode: ParseMode) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: mode.as_api_str(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, mode: ParseMode) -> Result<(), NotifyError> {
        let rsp = self
            .client
            .post(self.endpoint())
            .json(&self.payload(text, mode))
            .send()
            .await?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }

        // The Bot API explains rejections (bad markup, unknown chat) in `description`.
        let description = match rsp.json::<ApiReply>().await {
            Ok(reply) => reply.description.unwrap_or_default(),
            Err(_) => String::new(),
        };
        Err(NotifyError::Api {
            status: status.as_u16(),
            description,
        })
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Deserialize)]
struct ApiReply {
    #[serde(default)]
    description: Option<String>,
}
