use std::sync::Arc;

use async_trait::async_trait;
use connectors::{AiAnalyzer, AnalysisContext, NoteStore};
use inbox_core::text::truncate_for_analysis;
use inbox_core::{sanitize_title, NoteAnalysis, QueueItem, StageKind};
use tracing::{debug, warn};

use super::{PartialNote, PipelineSettings, Stage, StageError};

/// Asks the AI provider for title, summary, tags and folder.
pub struct AnalyzeStage {
    analyzer: Option<Arc<dyn AiAnalyzer>>,
    notes: Arc<dyn NoteStore>,
    source: String,
    max_tags: usize,
    max_chars: usize,
}

impl AnalyzeStage {
    pub fn new(
        analyzer: Option<Arc<dyn AiAnalyzer>>,
        notes: Arc<dyn NoteStore>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            analyzer,
            notes,
            source: settings.source.clone(),
            max_tags: settings.max_tags,
            max_chars: settings.max_analysis_chars,
        }
    }

    fn fallback(&self, item: &QueueItem, partial: &PartialNote) -> NoteAnalysis {
        NoteAnalysis::fallback(&partial.body, &self.source, item.metadata.received_at)
            .sanitized(self.max_tags)
    }

    async fn context(&self, item: &QueueItem) -> AnalysisContext {
        let existing_folders = match self.notes.existing_folders().await {
            Ok(folders) => folders,
            Err(e) => {
                warn!(error = %e, "Could not list vault folders");
                Vec::new()
            }
        };
        AnalysisContext {
            source: self.source.clone(),
            content_type: item.payload.kind().to_string(),
            existing_folders,
        }
    }
}

fn with_title_hint(mut analysis: NoteAnalysis, partial: &PartialNote) -> NoteAnalysis {
    if let Some(hint) = partial.title_hint.as_deref().filter(|h| !h.trim().is_empty()) {
        analysis.title = sanitize_title(hint);
    }
    analysis
}

#[async_trait]
impl Stage for AnalyzeStage {
    fn kind(&self) -> StageKind {
        StageKind::Analyze
    }

    async fn apply(
        &self,
        item: &QueueItem,
        mut partial: PartialNote,
    ) -> Result<PartialNote, StageError> {
        let Some(analyzer) = &self.analyzer else {
            // Disabled provider: fallback analysis, nothing failed.
            let analysis = self.fallback(item, &partial);
            partial.analysis = Some(with_title_hint(analysis, &partial));
            return Ok(partial);
        };

        let content = truncate_for_analysis(&partial.body, self.max_chars);
        let context = self.context(item).await;
        let analysis = analyzer
            .analyze(&content, &context)
            .await?
            .sanitized(self.max_tags);

        debug!(
            item_id = %item.id,
            provider = analyzer.name(),
            title = %analysis.title,
            folder = %analysis.suggested_folder,
            "Analysis complete"
        );
        partial.analysis = Some(with_title_hint(analysis, &partial));
        partial.ai_provider = Some(analyzer.name().to_string());
        Ok(partial)
    }

    fn recover(&self, item: &QueueItem, mut partial: PartialNote) -> PartialNote {
        let analysis = self.fallback(item, &partial);
        partial.analysis = Some(with_title_hint(analysis, &partial));
        partial.ai_provider = None;
        partial
    }
}
