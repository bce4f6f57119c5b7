//! Pipeline stages.
//!
//! Stages never touch the queue item. Each receives the accumulated
//! [`PartialNote`] and returns the next one; the executor decides what a
//! failure means.

mod analyze;
mod extract;
mod materialize;
mod resolve;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use connectors::{
    AiAnalyzer, ArticleFetcher, ConnectorError, ContentFetcher, NoteStore, OcrEngine,
    ReplyNotifier,
};
use inbox_core::{
    limits::{DEFAULT_MAX_ANALYSIS_CHARS, DEFAULT_MAX_TAGS},
    Degradation, NoteAnalysis, NoteResult, QueueItem, StageKind, FALLBACK_PROVIDER,
};
use thiserror::Error;

pub use analyze::AnalyzeStage;
pub use extract::ExtractStage;
pub use materialize::MaterializeStage;
pub use resolve::ResolveStage;

/// Why a stage did not produce its output.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("{0}")]
    Unavailable(String),
}

impl StageError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Note under construction, threaded through the stages.
#[derive(Debug, Clone, Default)]
pub struct PartialNote {
    /// Resolved media bytes.
    pub content: Option<Bytes>,
    /// Text the note is built from.
    pub body: String,
    /// Overrides the analysis title (article title, voice note title).
    pub title_hint: Option<String>,
    pub article_url: Option<String>,
    pub has_ocr: bool,
    pub analysis: Option<NoteAnalysis>,
    /// Provider that produced `analysis`; `None` for the fallback.
    pub ai_provider: Option<String>,
    pub attachment: Option<String>,
    pub note_path: Option<String>,
    pub degradations: Vec<Degradation>,
}

impl PartialNote {
    /// Record a non-fatal stage failure.
    pub fn degrade(&mut self, stage: StageKind, cause: impl Into<String>) {
        self.degradations.push(Degradation {
            stage,
            cause: cause.into(),
        });
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn into_result(self) -> NoteResult {
        let degraded = self.is_degraded();
        let analysis = self.analysis.unwrap_or_default();
        NoteResult {
            title: analysis.title,
            tags: analysis.tags,
            folder: analysis.suggested_folder,
            summary: analysis.summary,
            connections: analysis.connections,
            entities: analysis.entities,
            note_path: self.note_path.unwrap_or_default(),
            ai_provider: self
                .ai_provider
                .unwrap_or_else(|| FALLBACK_PROVIDER.to_string()),
            degraded,
            degradations: self.degradations,
        }
    }
}

/// One step of the enrichment pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn apply(&self, item: &QueueItem, partial: PartialNote)
        -> Result<PartialNote, StageError>;

    /// Output used when a non-terminal failure is absorbed. Receives the
    /// note as it was before the failed attempt.
    fn recover(&self, _item: &QueueItem, partial: PartialNote) -> PartialNote {
        partial
    }
}

/// External collaborators the pipeline and resolver call.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentFetcher>,
    /// `None` when OCR is disabled.
    pub ocr: Option<Arc<dyn OcrEngine>>,
    /// `None` when article fetching is disabled.
    pub articles: Option<Arc<dyn ArticleFetcher>>,
    /// `None` when AI analysis is disabled.
    pub analyzer: Option<Arc<dyn AiAnalyzer>>,
    pub notes: Arc<dyn NoteStore>,
    pub notifier: Arc<dyn ReplyNotifier>,
}

/// Stage settings that come from collaborator configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Source label for notes, prompts and attachment names.
    pub source: String,
    pub ocr_language: String,
    pub max_tags: usize,
    pub max_analysis_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source: "telegram".to_string(),
            ocr_language: "eng".to_string(),
            max_tags: DEFAULT_MAX_TAGS,
            max_analysis_chars: DEFAULT_MAX_ANALYSIS_CHARS,
        }
    }
}

/// The four stages in execution order.
pub fn standard_stages(
    collaborators: &Collaborators,
    settings: &PipelineSettings,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ResolveStage::new(collaborators.content.clone())),
        Box::new(ExtractStage::new(
            collaborators.ocr.clone(),
            collaborators.articles.clone(),
            settings.ocr_language.clone(),
        )),
        Box::new(AnalyzeStage::new(
            collaborators.analyzer.clone(),
            collaborators.notes.clone(),
            settings,
        )),
        Box::new(MaterializeStage::new(
            collaborators.notes.clone(),
            settings.source.clone(),
        )),
    ]
}
