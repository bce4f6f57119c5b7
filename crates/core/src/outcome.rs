//! Pipeline outcomes: what a finished item records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::item::ItemStatus;

/// Pipeline stage identity, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    ResolveContent,
    ExtractText,
    Analyze,
    Materialize,
    /// Not a pipeline stage: staleness recovery giving up on an item.
    Recovery,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolveContent => "resolve_content",
            Self::ExtractText => "extract_text",
            Self::Analyze => "analyze",
            Self::Materialize => "materialize",
            Self::Recovery => "recovery",
        }
    }

    /// Human-readable stage name used in failure notices.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResolveContent => "content resolution",
            Self::ExtractText => "text extraction",
            Self::Analyze => "ai analysis",
            Self::Materialize => "note persistence",
            Self::Recovery => "staleness recovery",
        }
    }

    /// Stages whose failure always fails the item.
    ///
    /// Analysis is terminal only when the AI fallback policy is off; the
    /// executor decides that case.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::ResolveContent | Self::Materialize)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A non-fatal stage failure recorded on a completed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: StageKind,
    pub cause: String,
}

/// Why an item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub stage: StageKind,
    pub cause: String,
}

impl ItemError {
    pub fn new(stage: StageKind, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage.label(), self.cause)
    }
}

/// What a completed item produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub title: String,
    pub tags: Vec<String>,
    pub folder: String,
    pub summary: String,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    /// Vault-relative path of the written note.
    pub note_path: String,
    pub ai_provider: String,
    pub degraded: bool,
    #[serde(default)]
    pub degradations: Vec<Degradation>,
}

/// Final result of running the pipeline over one claimed item.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed(NoteResult),
    Failed(ItemError),
}

impl PipelineOutcome {
    /// Status the resolver writes for this outcome.
    pub fn target_status(&self) -> ItemStatus {
        match self {
            Self::Completed(_) => ItemStatus::Completed,
            Self::Failed(_) => ItemStatus::Failed,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Completed(result) if result.degraded)
    }
}
