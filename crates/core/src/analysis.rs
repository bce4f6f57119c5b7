//! AI analysis results and their sanitization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::MAX_TITLE_CHARS;

pub const DEFAULT_TITLE: &str = "Untitled Note";
pub const DEFAULT_FOLDER: &str = "Inbox";
pub const FALLBACK_PROVIDER: &str = "fallback";

/// Structured analysis returned by an AI provider.
///
/// Every field defaults, so partial provider responses still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteAnalysis {
    pub title: String,
    pub summary: String,
    #[serde(deserialize_with = "tags_from_list_or_csv")]
    pub tags: Vec<String>,
    pub suggested_folder: String,
    pub connections: Vec<String>,
    pub entities: Vec<String>,
}

impl NoteAnalysis {
    /// Fill empty fields, sanitize title and folder, and cap tags.
    pub fn sanitized(mut self, max_tags: usize) -> Self {
        self.title = sanitize_title(&self.title);
        self.suggested_folder = sanitize_folder(&self.suggested_folder);
        self.tags = normalize_tags(&self.tags, max_tags);
        self.summary = self.summary.trim().to_string();
        self.connections.retain(|c| !c.trim().is_empty());
        self.entities.retain(|e| !e.trim().is_empty());
        self
    }

    /// Analysis used when the AI provider is unavailable.
    ///
    /// The title comes from the first non-empty line of the content.
    pub fn fallback(content: &str, source: &str, now: DateTime<Utc>) -> Self {
        let first_line = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        let title: String = first_line
            .trim_start_matches('#')
            .trim()
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect();

        Self {
            title: sanitize_title(&title),
            summary: format!(
                "Content received from {} on {} (AI analysis unavailable)",
                source,
                now.format("%Y-%m-%d")
            ),
            tags: vec!["inbox".to_string(), "unprocessed".to_string()],
            suggested_folder: DEFAULT_FOLDER.to_string(),
            connections: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Parse a provider's free-form reply.
    ///
    /// Tries the whole reply as JSON, then a ```json fence, then any ```
    /// fence, then the outermost `{ ... }` span.
    pub fn parse_reply(reply: &str) -> Option<Self> {
        let reply = reply.trim();
        if let Ok(parsed) = serde_json::from_str(reply) {
            return Some(parsed);
        }

        let candidates = [
            fenced(reply, "```json"),
            fenced(reply, "```"),
            braced(reply),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(|candidate| serde_json::from_str(candidate.trim()).ok())
    }
}

fn fenced<'a>(reply: &'a str, opener: &str) -> Option<&'a str> {
    let start = reply.find(opener)? + opener.len();
    let end = reply[start..].find("```")?;
    Some(&reply[start..start + end])
}

fn braced(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn tags_from_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::List(tags)) => tags,
        Some(Tags::Csv(csv)) => csv.split(',').map(|t| t.trim().to_string()).collect(),
        None => Vec::new(),
    })
}

const TITLE_INVALID_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
const FOLDER_INVALID_CHARS: [char; 8] = ['\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a title safe for use as a filename.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if TITLE_INVALID_CHARS.contains(&c) { '-' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    let limited: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    let limited = limited.trim();

    if limited.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        limited.to_string()
    }
}

/// Normalize a vault folder path. Nested paths (`Knowledge/Tech`) are kept.
pub fn sanitize_folder(folder: &str) -> String {
    let replaced: String = folder
        .trim()
        .trim_matches('/')
        .chars()
        .map(|c| if FOLDER_INVALID_CHARS.contains(&c) { '-' } else { c })
        .collect();

    // No parent traversal out of the vault.
    let segments: Vec<&str> = replaced
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    if segments.is_empty() {
        DEFAULT_FOLDER.to_string()
    } else {
        segments.join("/")
    }
}

/// Lowercase, hyphenate, dedupe and cap tags.
pub fn normalize_tags(tags: &[String], max_tags: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len().min(max_tags));
    for tag in tags {
        let tag = tag
            .trim()
            .trim_start_matches('#')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
        if out.len() == max_tags {
            break;
        }
    }
    out
}
