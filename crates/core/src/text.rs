//! Text helpers shared by the extraction and analysis stages.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::item::{EntityKind, TextEntity};
use crate::limits::TRUNCATION_MARKER;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\])]+"#).expect("valid URL pattern"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Convert a UTF-16 offset into a byte offset within `text`.
///
/// Returns `None` if the offset is past the end or splits a surrogate pair.
pub fn utf16_to_byte(text: &str, offset: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units == offset {
            return Some(idx);
        }
        units += ch.len_utf16();
        if units > offset {
            return None;
        }
    }
    (units == offset).then_some(text.len())
}

fn entity_span(text: &str, entity: &TextEntity) -> Option<(usize, usize)> {
    let start = utf16_to_byte(text, entity.offset)?;
    let end = utf16_to_byte(text, entity.offset.checked_add(entity.length)?)?;
    (start <= end).then_some((start, end))
}

/// Rewrite hidden `text_link` entities as visible Markdown links.
///
/// Entities are applied from the end of the text backwards so earlier byte
/// offsets stay valid. Overlapping or out-of-range entities are skipped.
pub fn render_links(text: &str, entities: &[TextEntity]) -> String {
    let mut links: Vec<(&TextEntity, &str)> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::TextLink)
        .filter_map(|e| e.url.as_deref().map(|url| (e, url)))
        .collect();
    links.sort_by(|a, b| b.0.offset.cmp(&a.0.offset));

    let mut out = text.to_string();
    let mut floor = text.len();
    for (entity, url) in links {
        let Some((start, end)) = entity_span(text, entity) else {
            continue;
        };
        if end > floor {
            continue;
        }
        let label = &text[start..end];
        out.replace_range(start..end, &format!("[{}]({})", label, url));
        floor = start;
    }
    out
}

/// Collect http(s) URLs from the visible text and from link entities.
///
/// Order is first-seen, duplicates removed.
pub fn extract_urls(text: &str, entities: &[TextEntity]) -> Vec<String> {
    let from_text = URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION).to_string());

    let from_entities = entities.iter().filter_map(|entity| match entity.kind {
        EntityKind::Url => entity_span(text, entity).map(|(s, e)| text[s..e].to_string()),
        EntityKind::TextLink => entity.url.clone(),
        _ => None,
    });

    let mut urls: Vec<String> = Vec::new();
    for candidate in from_text.chain(from_entities) {
        let is_web = Url::parse(&candidate)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if is_web && !urls.contains(&candidate) {
            urls.push(candidate);
        }
    }
    urls
}

/// Cap content sent to the AI provider, appending a marker when cut.
pub fn truncate_for_analysis(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &content[..idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}
