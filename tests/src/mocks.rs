//! Mock collaborators for testing.
//!
//! Each mock implements the same connector trait as the shipped
//! implementation and records what the pipeline asked of it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use connectors::{
    AiAnalyzer, AnalysisContext, Article, ArticleFetcher, ConnectorError, ConnectorResult,
    ContentFetcher, NoteDraft, NoteStore, OcrEngine, ReplyMessage, ReplyNotifier,
};
use inbox_core::{ContentRef, NoteAnalysis, ReplyTarget};
use parking_lot::Mutex;

/// Content fetcher serving registered references.
///
/// Unknown references fail with `ContentUnavailable`, like a dead link.
#[derive(Default)]
pub struct MockContent {
    files: Mutex<HashMap<String, Bytes>>,
    fetched: Mutex<Vec<String>>,
}

impl MockContent {
    pub fn serve(&self, reference: &str, data: impl Into<Bytes>) {
        self.files.lock().insert(reference.to_string(), data.into());
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ContentFetcher for MockContent {
    async fn fetch(&self, reference: &ContentRef) -> ConnectorResult<Bytes> {
        self.fetched.lock().push(reference.as_str().to_string());
        self.files
            .lock()
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| {
                ConnectorError::ContentUnavailable(format!("{}: 404 Not Found", reference))
            })
    }
}

/// OCR engine returning fixed text, or failing.
pub struct MockOcr {
    text: Mutex<Result<String, String>>,
    calls: Mutex<usize>,
}

impl Default for MockOcr {
    fn default() -> Self {
        Self {
            text: Mutex::new(Ok(String::new())),
            calls: Mutex::new(0),
        }
    }
}

impl MockOcr {
    pub fn set_text(&self, text: &str) {
        *self.text.lock() = Ok(text.to_string());
    }

    pub fn set_failure(&self, cause: &str) {
        *self.text.lock() = Err(cause.to_string());
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl OcrEngine for MockOcr {
    async fn extract(&self, _image: &[u8], _language: &str) -> ConnectorResult<String> {
        *self.calls.lock() += 1;
        self.text.lock().clone().map_err(ConnectorError::Extraction)
    }
}

/// Article fetcher serving registered pages.
#[derive(Default)]
pub struct MockArticles {
    pages: Mutex<HashMap<String, Article>>,
}

impl MockArticles {
    pub fn serve(&self, url: &str, title: &str, text: &str) {
        self.pages.lock().insert(
            url.to_string(),
            Article {
                title: title.to_string(),
                text: text.to_string(),
                url: url.to_string(),
            },
        );
    }
}

#[async_trait]
impl ArticleFetcher for MockArticles {
    async fn fetch(&self, url: &str) -> ConnectorResult<Article> {
        self.pages
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| ConnectorError::Fetch(format!("{}: 404 Not Found", url)))
    }
}

/// Scriptable AI provider.
pub struct MockAnalyzer {
    reply: Mutex<Result<NoteAnalysis, String>>,
    delay: Mutex<Option<Duration>>,
    prompts: Mutex<Vec<(String, AnalysisContext)>>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self {
            reply: Mutex::new(Ok(NoteAnalysis {
                title: "Mock Analysis".to_string(),
                summary: "Summarized by the mock provider".to_string(),
                tags: vec!["Mock".to_string(), "testing".to_string()],
                suggested_folder: "Resources/Tests".to_string(),
                connections: vec!["Testing Notes".to_string()],
                entities: vec![],
            })),
            delay: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl MockAnalyzer {
    pub fn set_reply(&self, analysis: NoteAnalysis) {
        *self.reply.lock() = Ok(analysis);
    }

    pub fn set_failure(&self, cause: &str) {
        *self.reply.lock() = Err(cause.to_string());
    }

    /// Sleep before answering, to exercise stage timeouts.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn prompts(&self) -> Vec<(String, AnalysisContext)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl AiAnalyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(
        &self,
        content: &str,
        context: &AnalysisContext,
    ) -> ConnectorResult<NoteAnalysis> {
        self.prompts
            .lock()
            .push((content.to_string(), context.clone()));
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.lock().clone().map_err(ConnectorError::AiProvider)
    }
}

/// In-memory note store.
#[derive(Default)]
pub struct MockNotes {
    folders: Mutex<Vec<String>>,
    notes: Mutex<Vec<NoteDraft>>,
    attachments: Mutex<Vec<(String, Bytes)>>,
    failure: Mutex<Option<String>>,
    note_failure: Mutex<Option<String>>,
}

impl MockNotes {
    pub fn set_folders(&self, folders: &[&str]) {
        *self.folders.lock() = folders.iter().map(|f| f.to_string()).collect();
    }

    pub fn set_failure(&self, cause: &str) {
        *self.failure.lock() = Some(cause.to_string());
    }

    /// Fail only note writes; attachments still save.
    pub fn set_note_failure(&self, cause: &str) {
        *self.note_failure.lock() = Some(cause.to_string());
    }

    pub fn notes(&self) -> Vec<NoteDraft> {
        self.notes.lock().clone()
    }

    pub fn attachments(&self) -> Vec<String> {
        self.attachments
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn check(&self) -> ConnectorResult<()> {
        match self.failure.lock().as_ref() {
            Some(cause) => Err(ConnectorError::Persistence(cause.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NoteStore for MockNotes {
    async fn existing_folders(&self) -> ConnectorResult<Vec<String>> {
        Ok(self.folders.lock().clone())
    }

    async fn save_attachment(&self, data: Bytes, file_name: &str) -> ConnectorResult<String> {
        self.check()?;
        let path = format!("_attachments/{}", file_name);
        self.attachments.lock().push((path.clone(), data));
        Ok(path)
    }

    async fn write_note(&self, draft: &NoteDraft) -> ConnectorResult<String> {
        self.check()?;
        if let Some(cause) = self.note_failure.lock().clone() {
            return Err(ConnectorError::Persistence(cause));
        }
        let mut notes = self.notes.lock();
        notes.push(draft.clone());
        Ok(format!("Incoming/{}-{}.md", notes.len(), draft.title))
    }

    async fn remove(&self, path: &str) -> ConnectorResult<()> {
        self.attachments.lock().retain(|(name, _)| name != path);
        Ok(())
    }

    async fn ping(&self) -> ConnectorResult<()> {
        self.check()
    }
}

/// Notifier capturing every reply.
#[derive(Default)]
pub struct MockNotifier {
    replies: Mutex<Vec<(ReplyTarget, ReplyMessage)>>,
    fail: Mutex<bool>,
}

impl MockNotifier {
    pub fn replies(&self) -> Vec<(ReplyTarget, ReplyMessage)> {
        self.replies.lock().clone()
    }

    pub fn set_should_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl ReplyNotifier for MockNotifier {
    async fn deliver(&self, target: &ReplyTarget, message: &ReplyMessage) -> ConnectorResult<()> {
        if *self.fail.lock() {
            return Err(ConnectorError::Delivery("chat transport down".to_string()));
        }
        self.replies.lock().push((target.clone(), message.clone()));
        Ok(())
    }
}

/// All mocks, shared between the test and the collaborators it built.
#[derive(Clone, Default)]
pub struct Mocks {
    pub content: Arc<MockContent>,
    pub ocr: Arc<MockOcr>,
    pub articles: Arc<MockArticles>,
    pub analyzer: Arc<MockAnalyzer>,
    pub notes: Arc<MockNotes>,
    pub notifier: Arc<MockNotifier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_content_unknown_reference_fails() {
        let content = MockContent::default();
        content.serve("https://files.test/a.jpg", &b"jpeg"[..]);

        let ok = content
            .fetch(&ContentRef::new("https://files.test/a.jpg"))
            .await
            .unwrap();
        assert_eq!(&ok[..], b"jpeg");

        let err = content
            .fetch(&ContentRef::new("https://files.test/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::ContentUnavailable(_)));
        assert_eq!(content.fetched().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_notes_failure_mode() {
        let notes = MockNotes::default();
        notes.set_failure("disk full");
        assert!(notes.ping().await.is_err());
    }
}
