use crate::domain::ports::Notifier;
use crate::utils::error::{MenuError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts `{"chat_id", "text"}` to a chat gateway webhook.
pub struct WebhookNotifier {
    url: String,
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                chat_id: recipient,
                text,
            })
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MenuError::HttpStatus {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
