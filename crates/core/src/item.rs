//! Queue item model: payload shapes, message metadata, and the status
//! lifecycle enforced by every store write.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::outcome::{ItemError, NoteResult};

/// Queue item identifier.
///
/// Assigned by the store at enqueue time. Ids grow monotonically, so they
/// also break ties between items that arrived in the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Processing status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> to` is one of the allowed lifecycle edges.
    ///
    /// Pending -> Processing (claim), Processing -> Completed | Failed
    /// (finalize), Processing -> Pending (staleness recovery) and
    /// Completed | Failed -> Pending (manual retry).
    pub fn can_transition_to(&self, to: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Pending)
                | (Completed, Pending)
                | (Failed, Pending)
        )
    }

    /// Returns an error unless `self -> to` is allowed.
    pub fn check_transition(&self, to: ItemStatus) -> Result<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition { from: *self, to })
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::validation(format!("unknown status: {}", other))),
        }
    }
}

/// Opaque reference to remote content (a file URL in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Formatting annotation kind on a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Visible URL in the text.
    Url,
    /// Hidden link: the text shows a label, the URL lives on the entity.
    TextLink,
    Bold,
    Italic,
    Code,
    Pre,
    Mention,
    Hashtag,
    #[serde(other)]
    Other,
}

/// Formatting annotation. Offsets and lengths count UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntity {
    pub offset: usize,
    pub length: usize,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Message payload. Every stage matches on this exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
        #[serde(default)]
        entities: Vec<TextEntity>,
    },
    Photo {
        file: ContentRef,
        #[serde(default)]
        caption: Option<String>,
    },
    Document {
        file: ContentRef,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
    },
    Voice {
        file: ContentRef,
        duration_secs: u32,
        #[serde(default)]
        mime_type: Option<String>,
    },
}

impl Payload {
    /// Short payload kind name used in logs, frontmatter and filenames.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Document { .. } => "document",
            Self::Voice { .. } => "voice",
        }
    }

    /// Remote content the pipeline must resolve, if any.
    pub fn content_ref(&self) -> Option<&ContentRef> {
        match self {
            Self::Text { .. } => None,
            Self::Photo { file, .. } | Self::Document { file, .. } | Self::Voice { file, .. } => {
                Some(file)
            }
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            Self::Photo { caption, .. } | Self::Document { caption, .. } => caption.as_deref(),
            Self::Text { .. } | Self::Voice { .. } => None,
        }
    }
}

/// Who sent the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Sender {
    #[validate(range(min = 1))]
    pub id: i64,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(length(max = 256))]
    pub display_name: Option<String>,
}

/// Where the processing result is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ReplyTarget {
    pub chat_id: i64,
    #[serde(default)]
    pub message_id: Option<i64>,
    /// Transport endpoint for replies. Falls back to the configured webhook.
    #[serde(default)]
    #[validate(url, length(max = 2048))]
    pub callback_url: Option<String>,
}

/// Metadata captured by the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub sender: Sender,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to: Option<ReplyTarget>,
}

/// A durable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub payload: Payload,
    pub metadata: MessageMetadata,
    pub status: ItemStatus,
    /// Present only when `status == Completed`.
    pub result: Option<NoteResult>,
    /// Present only when `status == Failed`.
    pub error: Option<ItemError>,
    pub attempt_count: u32,
    /// Processor run that last claimed the item.
    pub claimed_by: Option<Uuid>,
    pub arrival_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
