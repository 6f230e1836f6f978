use crate::domain::ports::{ChatMessage, LanguageModel};
use crate::utils::error::{MenuError, Result};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Default, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    response: String,
}

/// `{"result": {"response": "..."}, "success": true, "errors": []}`
#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
    result: CompletionResult,
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Client for the chat-completion gateway.
pub struct GatewayClient {
    endpoint: String,
    api_token: String,
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GatewayClient {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::new(2, Duration::from_secs(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&CompletionRequest { messages })
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Model gateway returned an error status");
            return Err(MenuError::HttpStatus {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let envelope: CompletionEnvelope = response
            .json()
            .await
            .map_err(|e| MenuError::malformed(format!("gateway envelope: {}", e)))?;

        if !envelope.success {
            return Err(MenuError::ModelRejected {
                errors: envelope
                    .errors
                    .iter()
                    .map(|e| match e {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            });
        }

        tracing::debug!(chars = envelope.result.response.len(), "Model reply received");
        Ok(envelope.result.response)
    }
}

#[async_trait]
impl LanguageModel for GatewayClient {
    async fn complete(&self, messages: &[ChatMessage], cancel: &CancellationToken) -> Result<String> {
        self.retry
            .run(cancel, "model request", is_transient, |_| async {
                tokio::select! {
                    _ = cancel.cancelled() => Err(MenuError::Cancelled),
                    result = self.send_once(messages) => result,
                }
            })
            .await
    }
}

/// Transport failures, 5xx and 429 from the gateway. Other 4xx will not change on retry.
fn is_transient(error: &MenuError) -> bool {
    match error {
        MenuError::Http(_) => true,
        MenuError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}
