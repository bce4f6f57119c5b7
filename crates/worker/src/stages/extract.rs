use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use connectors::{ArticleFetcher, OcrEngine};
use inbox_core::text::{extract_urls, render_links};
use inbox_core::{Payload, QueueItem, StageKind};
use tracing::debug;

use super::{PartialNote, Stage, StageError};

const NO_TEXT_DETECTED: &str = "[Image with no text detected]";
const IMAGE_PLACEHOLDER: &str = "[Image]";
const VOICE_UNSUPPORTED: &str = "voice transcription is not available";

/// Turns the payload into note text: links made visible, articles
/// appended, OCR for images, placeholders for voice.
pub struct ExtractStage {
    ocr: Option<Arc<dyn OcrEngine>>,
    articles: Option<Arc<dyn ArticleFetcher>>,
    language: String,
}

impl ExtractStage {
    pub fn new(
        ocr: Option<Arc<dyn OcrEngine>>,
        articles: Option<Arc<dyn ArticleFetcher>>,
        language: String,
    ) -> Self {
        Self {
            ocr,
            articles,
            language,
        }
    }

    /// `None` when OCR is disabled.
    async fn ocr_text(&self, image: &Bytes) -> Result<Option<String>, StageError> {
        match &self.ocr {
            Some(ocr) => Ok(Some(ocr.extract(image, &self.language).await?)),
            None => Ok(None),
        }
    }
}

fn resolved(partial: &PartialNote) -> Result<Bytes, StageError> {
    partial
        .content
        .clone()
        .ok_or_else(|| StageError::unavailable("content was not resolved"))
}

fn image_body(caption: Option<&str>, ocr_text: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
        parts.push(caption.to_string());
    }
    match ocr_text.map(str::trim) {
        Some(text) if !text.is_empty() => parts.push(format!("## Extracted Text\n\n{}", text)),
        Some(_) => parts.push(NO_TEXT_DETECTED.to_string()),
        None if parts.is_empty() => parts.push(IMAGE_PLACEHOLDER.to_string()),
        None => {}
    }
    parts.join("\n\n")
}

fn voice_body(duration_secs: u32) -> String {
    format!("[Voice message - {} seconds]", duration_secs)
}

fn voice_title(item: &QueueItem) -> String {
    format!(
        "Voice Note - {}",
        item.metadata.received_at.format("%Y-%m-%d %H:%M")
    )
}

/// MIME type from the transport, or guessed from the file extension.
pub(crate) fn document_mime(file_name: Option<&str>, mime_type: Option<&str>) -> String {
    if let Some(mime) = mime_type.filter(|m| !m.is_empty() && *m != "application/octet-stream") {
        return mime.to_ascii_lowercase();
    }
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("txt" | "log") => "text/plain",
        Some("md" | "markdown") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/")
        || mime.ends_with("+json")
        || matches!(
            mime,
            "application/json" | "application/xml" | "application/yaml" | "application/x-yaml"
        )
}

fn join_caption(caption: Option<&str>, text: &str) -> String {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => format!("{}\n\n{}", caption, text.trim()),
        None => text.trim().to_string(),
    }
}

/// Text available without any collaborator.
fn base_body(item: &QueueItem) -> String {
    match &item.payload {
        Payload::Text { text, entities } => render_links(text, entities),
        Payload::Photo { caption, .. } => image_body(caption.as_deref(), None),
        Payload::Document {
            caption, file_name, ..
        } => join_caption(
            caption.as_deref(),
            &format!("[Document: {}]", file_name.as_deref().unwrap_or("unnamed")),
        ),
        Payload::Voice { duration_secs, .. } => voice_body(*duration_secs),
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn kind(&self) -> StageKind {
        StageKind::ExtractText
    }

    async fn apply(
        &self,
        item: &QueueItem,
        mut partial: PartialNote,
    ) -> Result<PartialNote, StageError> {
        match &item.payload {
            Payload::Text { text, entities } => {
                let rendered = render_links(text, entities);
                partial.body = rendered.clone();

                let urls = extract_urls(text, entities);
                if let (Some(articles), Some(url)) = (&self.articles, urls.first()) {
                    let article = articles.fetch(url).await?;
                    debug!(item_id = %item.id, url = %url, "Article appended");
                    partial.body = format!("{}\n\n---\n\n{}", rendered, article.to_markdown());
                    partial.title_hint = Some(article.title);
                    partial.article_url = Some(url.clone());
                }
            }
            Payload::Photo { caption, .. } => {
                let image = resolved(&partial)?;
                let ocr_text = self.ocr_text(&image).await?;
                partial.has_ocr = ocr_text.is_some();
                partial.body = image_body(caption.as_deref(), ocr_text.as_deref());
            }
            Payload::Document {
                caption,
                file_name,
                mime_type,
                ..
            } => {
                let data = resolved(&partial)?;
                let mime = document_mime(file_name.as_deref(), mime_type.as_deref());
                if mime.starts_with("image/") {
                    let ocr_text = self.ocr_text(&data).await?;
                    partial.has_ocr = ocr_text.is_some();
                    partial.body = image_body(caption.as_deref(), ocr_text.as_deref());
                } else if is_text_mime(&mime) {
                    partial.body = join_caption(caption.as_deref(), &String::from_utf8_lossy(&data));
                } else {
                    return Err(StageError::unavailable(format!("no extractor for {}", mime)));
                }
            }
            Payload::Voice { duration_secs, .. } => {
                partial.body = voice_body(*duration_secs);
                partial.title_hint = Some(voice_title(item));
                partial.degrade(StageKind::ExtractText, VOICE_UNSUPPORTED);
            }
        }
        Ok(partial)
    }

    fn recover(&self, item: &QueueItem, mut partial: PartialNote) -> PartialNote {
        partial.body = base_body(item);
        if matches!(item.payload, Payload::Voice { .. }) {
            partial.title_hint = Some(voice_title(item));
        }
        partial
    }
}
