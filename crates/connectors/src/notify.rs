//! Reply delivery to the sender of a processed message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inbox_core::{ItemError, ItemId, NoteResult, ReplyTarget, FALLBACK_PROVIDER};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::NotifyConfig;
use crate::error::{ConnectorError, ConnectorResult};

/// Reply sent after an item is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyMessage {
    /// Note preview
    Saved {
        item_id: ItemId,
        title: String,
        folder: String,
        tags: Vec<String>,
        summary: String,
        related: Option<String>,
        note_path: String,
        ai_available: bool,
        degraded: bool,
    },
    /// Failure notice
    Failed {
        item_id: ItemId,
        stage: String,
        cause: String,
    },
}

impl ReplyMessage {
    pub fn saved(item_id: ItemId, result: &NoteResult) -> Self {
        Self::Saved {
            item_id,
            title: result.title.clone(),
            folder: result.folder.clone(),
            tags: result.tags.clone(),
            summary: result.summary.clone(),
            related: result.connections.first().cloned(),
            note_path: result.note_path.clone(),
            ai_available: result.ai_provider != FALLBACK_PROVIDER,
            degraded: result.degraded,
        }
    }

    pub fn failed(item_id: ItemId, error: &ItemError) -> Self {
        Self::Failed {
            item_id,
            stage: error.stage.label().to_string(),
            cause: error.cause.clone(),
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            Self::Saved { item_id, .. } | Self::Failed { item_id, .. } => *item_id,
        }
    }

    /// Chat-formatted text (Markdown emphasis).
    pub fn render(&self) -> String {
        match self {
            Self::Saved {
                title,
                folder,
                tags,
                summary,
                related,
                ai_available,
                degraded,
                ..
            } => {
                let mut lines = vec![
                    "✓ *Saved to Obsidian*".to_string(),
                    String::new(),
                    format!("*Title*: {}", title),
                ];
                if !folder.is_empty() {
                    lines.push(format!("*Folder*: {}", folder));
                }
                if !tags.is_empty() {
                    let tags: Vec<String> = tags.iter().map(|t| format!("#{}", t)).collect();
                    lines.push(format!("*Tags*: {}", tags.join(", ")));
                }
                if !summary.is_empty() {
                    lines.push(format!("\n*Summary*: {}", summary));
                }
                if let Some(related) = related {
                    lines.push(format!("\n*Related to*: {}", related));
                }
                if !ai_available {
                    lines.push("\n_Note: AI analysis was unavailable_".to_string());
                } else if *degraded {
                    lines.push("\n_Note: some content could not be processed_".to_string());
                }
                lines.join("\n")
            }
            Self::Failed {
                item_id,
                stage,
                cause,
            } => format!(
                "✗ *Could not save message*\n\n{} failed: {}\n\nItem {} can be retried.",
                stage, cause, item_id
            ),
        }
    }
}

/// Delivers replies through the chat transport.
#[async_trait]
pub trait ReplyNotifier: Send + Sync {
    async fn deliver(&self, target: &ReplyTarget, message: &ReplyMessage) -> ConnectorResult<()>;
}

/// Writes replies to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ReplyNotifier for LogNotifier {
    async fn deliver(&self, target: &ReplyTarget, message: &ReplyMessage) -> ConnectorResult<()> {
        info!(
            chat_id = target.chat_id,
            item_id = %message.item_id(),
            reply = %message.render(),
            "Reply"
        );
        Ok(())
    }
}

/// POSTs replies as JSON to the target's callback URL, or the configured
/// webhook. Targets with neither are logged.
pub struct WebhookNotifier {
    client: reqwest::Client,
    default_url: Option<String>,
    timeout: Duration,
    fallback: LogNotifier,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_url: config.webhook_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            fallback: LogNotifier,
        }
    }
}

#[async_trait]
impl ReplyNotifier for WebhookNotifier {
    async fn deliver(&self, target: &ReplyTarget, message: &ReplyMessage) -> ConnectorResult<()> {
        let Some(url) = target.callback_url.as_ref().or(self.default_url.as_ref()) else {
            return self.fallback.deliver(target, message).await;
        };

        let body = json!({
            "chat_id": target.chat_id,
            "reply_to_message_id": target.message_id,
            "text": message.render(),
            "message": message,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::from_http(e, self.timeout, ConnectorError::Delivery))?;

        if !response.status().is_success() {
            return Err(ConnectorError::Delivery(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        debug!(chat_id = target.chat_id, item_id = %message.item_id(), "Reply delivered");
        Ok(())
    }
}

/// Build the reply notifier for the configuration.
pub fn build_notifier(config: &NotifyConfig) -> Arc<dyn ReplyNotifier> {
    Arc::new(WebhookNotifier::new(config))
}
