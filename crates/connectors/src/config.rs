//! Collaborator configuration.

use std::path::PathBuf;
use std::time::Duration;

use inbox_core::limits::{DEFAULT_MAX_TAGS, MAX_MEDIA_BYTES};
use serde::{Deserialize, Serialize};

/// Content download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Largest accepted download in bytes
    #[serde(default = "default_fetch_max_bytes")]
    pub max_bytes: usize,
    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fetch_max_bytes() -> usize {
    MAX_MEDIA_BYTES
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_fetch_max_bytes(),
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

/// AI provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    Ollama,
    Claude,
    /// Every item gets the fallback analysis.
    Disabled,
}

/// AI analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_provider")]
    pub provider: AiProviderKind,
    /// Provider endpoint. Defaults per provider when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name. Defaults per provider when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Required for Claude
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Tags kept after normalization
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    /// Request timeout in seconds
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ai_provider() -> AiProviderKind {
    AiProviderKind::Ollama
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_max_tags() -> usize {
    DEFAULT_MAX_TAGS
}

fn default_ai_timeout_secs() -> u64 {
    120
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_tags: default_max_tags(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// OCR configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tesseract language code (e.g., "eng", "eng+deu")
    #[serde(default = "default_ocr_language")]
    pub language: String,
    /// Path or name of the tesseract executable
    #[serde(default = "default_ocr_binary")]
    pub binary: String,
}

fn default_true() -> bool {
    true
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_ocr_binary() -> String {
    "tesseract".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: default_ocr_language(),
            binary: default_ocr_binary(),
        }
    }
}

/// Article fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Article text kept in the note, in chars
    #[serde(default = "default_article_max_chars")]
    pub max_chars: usize,
    /// Largest HTML page downloaded
    #[serde(default = "default_article_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_article_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_article_max_chars() -> usize {
    5000
}

fn default_article_max_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_article_timeout_secs() -> u64 {
    10
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_article_max_chars(),
            max_bytes: default_article_max_bytes(),
            timeout_secs: default_article_timeout_secs(),
        }
    }
}

/// How note filenames are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameStrategy {
    /// `2025-01-15 - Note title`
    #[default]
    Hybrid,
    /// `2025-01-15-142030`
    Timestamp,
    /// `Note title`
    AiTitle,
}

/// Where tags are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFormat {
    /// YAML list in the frontmatter
    #[default]
    Yaml,
    /// `#tag` line under the title
    Inline,
}

/// Obsidian vault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Vault root directory
    #[serde(default = "default_vault_path")]
    pub path: PathBuf,
    /// Folder under the vault root receiving new notes
    #[serde(default = "default_incoming_folder")]
    pub incoming_folder: String,
    /// Folder under the vault root receiving attachments
    #[serde(default = "default_media_folder")]
    pub media_folder: String,
    #[serde(default)]
    pub filename_strategy: FilenameStrategy,
    #[serde(default)]
    pub tag_format: TagFormat,
    /// Write notes into the analysis' suggested folder under the incoming folder
    #[serde(default)]
    pub use_suggested_folder: bool,
    /// Source label written to frontmatter and attachment names
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_vault_path() -> PathBuf {
    PathBuf::from("vault")
}

fn default_incoming_folder() -> String {
    "Incoming".to_string()
}

fn default_media_folder() -> String {
    "_attachments".to_string()
}

fn default_source() -> String {
    "telegram".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            incoming_folder: default_incoming_folder(),
            media_folder: default_media_folder(),
            filename_strategy: FilenameStrategy::default(),
            tag_format: TagFormat::default(),
            use_suggested_folder: false,
            source: default_source(),
        }
    }
}

/// Reply delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Send a preview of the saved note back to the sender
    #[serde(default = "default_true")]
    pub send_preview: bool,
    /// Used when the reply target carries no callback URL
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_notify_timeout_secs() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            send_preview: true,
            webhook_url: None,
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}
