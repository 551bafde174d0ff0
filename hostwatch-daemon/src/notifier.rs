//! Chat delivery over incoming webhooks.

use async_trait::async_trait;
use hostwatch_core::{InteractionHandle, Notifier, Result, WatchError};
use reqwest::multipart::{Form, Part};
use serde_json::json;
use std::time::Duration;

/// Message flag that hides an interaction reply from everyone but the caller.
const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Posts messages to webhook URLs; destinations are the URLs themselves.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WatchError::Notify(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = request
            .send()
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WatchError::Notify(format!("webhook returned {status}: {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, destination: &str, text: &str) -> Result<()> {
        self.send(self.client.post(destination).json(&json!({ "content": text })))
            .await
    }

    async fn respond(&self, interaction: &InteractionHandle, text: &str, ephemeral: bool) -> Result<()> {
        let mut body = json!({ "content": text });
        if ephemeral {
            body["flags"] = json!(EPHEMERAL_FLAG);
        }
        self.send(self.client.post(&interaction.0).json(&body)).await
    }

    async fn attach_file(
        &self,
        destination: &str,
        text: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<()> {
        let payload = json!({
            "content": text,
            "attachments": [{ "id": 0, "filename": filename }],
        });
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", Part::bytes(bytes).file_name(filename.to_string()));
        self.send(self.client.post(destination).multipart(form)).await
    }
}

/// Writes every message to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, destination: &str, text: &str) -> Result<()> {
        tracing::info!(destination, "{text}");
        Ok(())
    }

    async fn respond(&self, interaction: &InteractionHandle, text: &str, ephemeral: bool) -> Result<()> {
        tracing::info!(interaction = %interaction.0, ephemeral, "{text}");
        Ok(())
    }

    async fn attach_file(
        &self,
        destination: &str,
        text: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<()> {
        tracing::info!(destination, filename, size = bytes.len(), "{text}");
        Ok(())
    }
}
