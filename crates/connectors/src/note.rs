//! Markdown rendering for vault notes.

use chrono::{DateTime, Utc};
use inbox_core::{NoteAnalysis, Sender};
use serde::{Deserialize, Serialize};

use crate::config::{FilenameStrategy, TagFormat, VaultConfig};

/// Everything needed to write one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    /// Sanitized title, safe for filenames.
    pub title: String,
    pub analysis: NoteAnalysis,
    /// Main content: message text, OCR output, article.
    pub body: String,
    /// Payload kind the note was made from.
    pub source_type: String,
    pub created: DateTime<Utc>,
    pub sender: Sender,
    /// Vault-relative attachment paths to embed.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub article_url: Option<String>,
    #[serde(default)]
    pub has_ocr: bool,
    /// `None` when the fallback analysis was used.
    #[serde(default)]
    pub ai_provider: Option<String>,
    #[serde(default)]
    pub degraded: bool,
}

/// Note filename without extension.
pub fn note_file_stem(title: &str, created: DateTime<Utc>, strategy: FilenameStrategy) -> String {
    match strategy {
        FilenameStrategy::Hybrid => format!("{} - {}", created.format("%Y-%m-%d"), title),
        FilenameStrategy::Timestamp => created.format("%Y-%m-%d-%H%M%S").to_string(),
        FilenameStrategy::AiTitle => title.to_string(),
    }
}

/// Attachment filename: `<source>_<kind>_<timestamp>[_<original>]<ext>`.
pub fn attachment_file_name(
    source: &str,
    kind: &str,
    original_name: Option<&str>,
    extension: &str,
    now: DateTime<Utc>,
) -> String {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let original: Option<String> = original_name
        .map(|name| {
            let stem = std::path::Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            stem.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
                .take(30)
                .collect()
        })
        .filter(|s: &String| !s.is_empty());

    match original {
        Some(stem) => format!("{}_{}_{}_{}{}", source, kind, stamp, stem, extension),
        None => format!("{}_{}_{}{}", source, kind, stamp, extension),
    }
}

/// Render the full note: frontmatter, body, analysis and footer.
pub fn render_note(draft: &NoteDraft, config: &VaultConfig) -> String {
    let mut out = render_frontmatter(draft, config);
    out.push('\n');
    out.push_str(&render_body(draft, config));
    out
}

fn render_frontmatter(draft: &NoteDraft, config: &VaultConfig) -> String {
    let mut lines = vec!["---".to_string()];
    lines.push(format!("created: {}", draft.created.format("%Y-%m-%dT%H:%M:%S")));
    lines.push(format!("source: {}", yaml_scalar(&config.source)));
    lines.push(format!("source_type: {}", draft.source_type));
    lines.push(format!("sender_id: {}", draft.sender.id));
    if let Some(username) = &draft.sender.username {
        lines.push(format!("sender_username: {}", yaml_scalar(username)));
    }

    let tags = &draft.analysis.tags;
    if config.tag_format == TagFormat::Yaml && !tags.is_empty() {
        lines.push("tags:".to_string());
        lines.extend(tags.iter().map(|tag| format!("  - {}", yaml_scalar(tag))));
    }

    if !draft.analysis.suggested_folder.is_empty() {
        lines.push(format!(
            "suggested_folder: {}",
            yaml_scalar(&draft.analysis.suggested_folder)
        ));
    }

    match &draft.ai_provider {
        Some(provider) => {
            lines.push("ai_analyzed: true".to_string());
            lines.push(format!("ai_provider: {}", provider));
        }
        None => lines.push("ai_analyzed: false".to_string()),
    }
    if draft.degraded {
        lines.push("degraded: true".to_string());
    }
    if !draft.attachments.is_empty() {
        lines.push("has_media: true".to_string());
        lines.push(format!("media_type: {}", draft.source_type));
    }
    if draft.has_ocr {
        lines.push("has_ocr: true".to_string());
    }
    if let Some(url) = &draft.article_url {
        lines.push(format!("article_url: {}", yaml_scalar(url)));
    }

    lines.push("---".to_string());
    lines.join("\n")
}

fn render_body(draft: &NoteDraft, config: &VaultConfig) -> String {
    let analysis = &draft.analysis;
    let mut out = format!("\n# {}\n\n", draft.title);

    if config.tag_format == TagFormat::Inline && !analysis.tags.is_empty() {
        let inline: Vec<String> = analysis.tags.iter().map(|t| format!("#{}", t)).collect();
        out.push_str(&inline.join(" "));
        out.push_str("\n\n");
    }

    out.push_str(draft.body.trim_end());
    out.push_str("\n\n");

    if !draft.attachments.is_empty() {
        out.push_str("## Attachments\n\n");
        for path in &draft.attachments {
            out.push_str(&format!("![[{}]]\n\n", path));
        }
    }

    if draft.ai_provider.is_some() {
        out.push_str("---\n\n## AI Analysis\n\n");
        if !analysis.summary.is_empty() {
            out.push_str(&format!("**Summary**: {}\n\n", analysis.summary));
        }
        if !analysis.entities.is_empty() {
            out.push_str(&format!("**Key Entities**: {}\n\n", analysis.entities.join(", ")));
        }
        if !analysis.connections.is_empty() {
            out.push_str("**Suggested Connections**:\n");
            for connection in &analysis.connections {
                out.push_str(&format!("- {}\n", connection));
            }
            out.push('\n');
        }
    }

    out.push_str("---\n\n");
    out.push_str(&format!("**Source**: {} ({})\n", config.source, draft.source_type));
    out.push_str(&format!(
        "**Received**: {}\n",
        draft.created.format("%Y-%m-%d %H:%M:%S")
    ));
    out
}

/// Quote a YAML scalar when plain style would misparse it.
fn yaml_scalar(value: &str) -> String {
    const SPECIAL: &[char] = &[
        ':', '#', '\'', '"', '[', ']', '{', '}', ',', '&', '*', '!', '|', '>', '%', '@', '`',
    ];
    let needs_quotes = value.is_empty()
        || value.contains(SPECIAL)
        || value.starts_with(['-', '?', ' '])
        || value.ends_with(' ');
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
