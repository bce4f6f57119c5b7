//! External collaborators of the enrichment pipeline.
//!
//! Each collaborator is an async trait so the worker can run against mocks.
//! The shipped implementations talk HTTP (content, articles, AI providers,
//! reply webhooks), spawn the tesseract CLI, and write an Obsidian vault on
//! local disk.

pub mod analyzer;
pub mod article;
pub mod config;
pub mod content;
pub mod error;
pub mod note;
pub mod notify;
pub mod ocr;
pub mod vault;

pub use analyzer::{build_analyzer, AiAnalyzer, AnalysisContext, ClaudeAnalyzer, OllamaAnalyzer};
pub use article::{Article, ArticleFetcher, HttpArticleFetcher};
pub use config::*;
pub use content::{ContentFetcher, HttpContentFetcher};
pub use error::{ConnectorError, ConnectorResult};
pub use note::NoteDraft;
pub use notify::{build_notifier, LogNotifier, ReplyMessage, ReplyNotifier, WebhookNotifier};
pub use ocr::{OcrEngine, TesseractOcr};
pub use vault::{NoteStore, VaultNoteStore};
