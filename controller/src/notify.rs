use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::traits::Notifier;

/// Percent-encodes a message for a query string, periods included.
pub fn encode_message(text: &str) -> String {
    urlencoding::encode(text).replace('.', "%2E")
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn send_url(&self, text: &str) -> String {
        format!(
            "{}/bot{}/sendMessage?chat_id={}&text={}",
            self.api_base,
            self.bot_token,
            urlencoding::encode(&self.chat_id),
            encode_message(text)
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .get(self.send_url(message))
            .send()
            .await
            .context("notification request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("notification gateway returned HTTP {status}");
        }
        Ok(())
    }
}

/// Used when no notification target is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        info!(target: "nightcharge::report", "{}", message.replace('\n', " | "));
        Ok(())
    }
}
