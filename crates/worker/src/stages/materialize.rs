use std::sync::Arc;

use async_trait::async_trait;
use connectors::note::attachment_file_name;
use connectors::{NoteDraft, NoteStore};
use inbox_core::{NoteAnalysis, Payload, QueueItem, StageKind};

use tracing::warn;

use super::extract::document_mime;
use super::{PartialNote, Stage, StageError};

/// Attachment saved for a note that is not written yet. Dropped while still
/// armed (the stage timed out), it schedules the file's removal.
struct PendingAttachment {
    notes: Arc<dyn NoteStore>,
    path: Option<String>,
}

impl PendingAttachment {
    /// Remove the file now; the note will not be written.
    async fn discard(mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = self.notes.remove(&path).await {
                warn!(path = %path, error = %e, "Failed to remove orphaned attachment");
            }
        }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PendingAttachment {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let notes = self.notes.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = notes.remove(&path).await {
                        warn!(path = %path, error = %e, "Failed to remove orphaned attachment");
                    }
                });
            }
            Err(_) => warn!(path = %path, "Orphaned attachment left in vault"),
        }
    }
}

/// Saves the attachment and writes the note.
pub struct MaterializeStage {
    notes: Arc<dyn NoteStore>,
    source: String,
}

impl MaterializeStage {
    pub fn new(notes: Arc<dyn NoteStore>, source: String) -> Self {
        Self { notes, source }
    }
}

/// File extension for a payload's attachment, dot included.
fn attachment_extension(payload: &Payload) -> String {
    match payload {
        Payload::Photo { .. } => ".jpg".to_string(),
        Payload::Voice { mime_type, .. } => match mime_type.as_deref() {
            Some("audio/mpeg") => ".mp3",
            Some("audio/mp4" | "audio/m4a") => ".m4a",
            _ => ".ogg",
        }
        .to_string(),
        Payload::Document {
            file_name,
            mime_type,
            ..
        } => {
            if let Some((_, ext)) = file_name.as_deref().and_then(|n| n.rsplit_once('.')) {
                if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return format!(".{}", ext.to_ascii_lowercase());
                }
            }
            match document_mime(file_name.as_deref(), mime_type.as_deref()).as_str() {
                "application/pdf" => ".pdf",
                "image/png" => ".png",
                "image/jpeg" => ".jpg",
                "text/plain" => ".txt",
                "text/markdown" => ".md",
                "application/json" => ".json",
                _ => ".bin",
            }
            .to_string()
        }
        Payload::Text { .. } => String::new(),
    }
}

fn original_file_name(payload: &Payload) -> Option<&str> {
    match payload {
        Payload::Document { file_name, .. } => file_name.as_deref(),
        _ => None,
    }
}

#[async_trait]
impl Stage for MaterializeStage {
    fn kind(&self) -> StageKind {
        StageKind::Materialize
    }

    async fn apply(
        &self,
        item: &QueueItem,
        mut partial: PartialNote,
    ) -> Result<PartialNote, StageError> {
        let received_at = item.metadata.received_at;

        let mut attachments = Vec::new();
        let mut pending = None;
        if let Some(data) = partial.content.clone() {
            let name = attachment_file_name(
                &self.source,
                item.payload.kind(),
                original_file_name(&item.payload),
                &attachment_extension(&item.payload),
                received_at,
            );
            let path = self.notes.save_attachment(data, &name).await?;
            pending = Some(PendingAttachment {
                notes: self.notes.clone(),
                path: Some(path.clone()),
            });
            partial.attachment = Some(path.clone());
            attachments.push(path);
        }

        let analysis = match &partial.analysis {
            Some(analysis) => analysis.clone(),
            None => NoteAnalysis::fallback(&partial.body, &self.source, received_at),
        };

        let draft = NoteDraft {
            title: analysis.title.clone(),
            analysis,
            body: partial.body.clone(),
            source_type: item.payload.kind().to_string(),
            created: received_at,
            sender: item.metadata.sender.clone(),
            attachments,
            article_url: partial.article_url.clone(),
            has_ocr: partial.has_ocr,
            ai_provider: partial.ai_provider.clone(),
            degraded: partial.is_degraded(),
        };

        match self.notes.write_note(&draft).await {
            Ok(note_path) => {
                if let Some(attachment) = pending {
                    attachment.keep();
                }
                partial.note_path = Some(note_path);
                Ok(partial)
            }
            Err(e) => {
                if let Some(attachment) = pending {
                    attachment.discard().await;
                }
                Err(e.into())
            }
        }
    }
}
