use std::sync::Arc;

use async_trait::async_trait;
use connectors::ContentFetcher;
use inbox_core::{QueueItem, StageKind};
use tracing::debug;

use super::{PartialNote, Stage, StageError};

/// Downloads the media behind photo, document and voice payloads.
pub struct ResolveStage {
    content: Arc<dyn ContentFetcher>,
}

impl ResolveStage {
    pub fn new(content: Arc<dyn ContentFetcher>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl Stage for ResolveStage {
    fn kind(&self) -> StageKind {
        StageKind::ResolveContent
    }

    async fn apply(
        &self,
        item: &QueueItem,
        mut partial: PartialNote,
    ) -> Result<PartialNote, StageError> {
        let Some(reference) = item.payload.content_ref() else {
            return Ok(partial);
        };

        let bytes = self.content.fetch(reference).await?;
        if bytes.is_empty() {
            return Err(StageError::unavailable("resolved content is empty"));
        }

        debug!(item_id = %item.id, bytes = bytes.len(), "Content resolved");
        partial.content = Some(bytes);
        Ok(partial)
    }
}
