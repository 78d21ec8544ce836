//! Delivery of change reports to a chat webhook.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Serialize;

use crate::error::NotifyError;
use crate::types::ChangeEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Posts `{"content": ...}` to a Discord-compatible webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl WebhookNotifier {
    /// The client is shared with the snapshot source, so both use the same
    /// request timeout and connection pool.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        debug!("Posting {} bytes to webhook", message.len());
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { content: message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        info!("Webhook notification sent");
        Ok(())
    }
}

/// Renders the events of one endpoint into webhook messages.
///
/// Each message starts with the bold endpoint name followed by one line per
/// event.  Messages are split on line boundaries so none exceeds `limit`
/// characters; a single line longer than that is sent on its own.
pub fn format_messages(endpoint: &str, events: &[ChangeEvent], limit: usize) -> Vec<String> {
    let header = format!("**{}**", endpoint);
    let mut messages = Vec::new();
    let mut current = header.clone();
    let mut lines_in_current = 0;

    for event in events {
        let line = event.to_string();
        let grown = current.chars().count() + 1 + line.chars().count();
        if lines_in_current > 0 && grown > limit {
            messages.push(std::mem::replace(&mut current, header.clone()));
            lines_in_current = 0;
        }
        current.push('\n');
        current.push_str(&line);
        lines_in_current += 1;
    }

    if lines_in_current > 0 {
        messages.push(current);
    }
    messages
}
