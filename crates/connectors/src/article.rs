//! Article fetching for links shared in text messages.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ArticleConfig;
use crate::content::read_capped;
use crate::error::{ConnectorError, ConnectorResult};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; inbox-engine/1.0)";
const UNTITLED_ARTICLE: &str = "Untitled Article";
const ARTICLE_TRUNCATED: &str = "\n\n[Article truncated...]";

/// Readable text of a web page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl Article {
    /// Markdown section appended to the note body.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## {}\n\n**URL**: {}\n", self.title, self.url);
        if !self.text.is_empty() {
            out.push('\n');
            out.push_str(&self.text);
        }
        out
    }
}

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ConnectorResult<Article>;
}

/// Downloads a page and strips it to text with a few regexes.
pub struct HttpArticleFetcher {
    client: reqwest::Client,
    max_chars: usize,
    max_bytes: usize,
    timeout: Duration,
}

impl HttpArticleFetcher {
    pub fn new(config: &ArticleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_chars: config.max_chars,
            max_bytes: config.max_bytes,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> ConnectorResult<Article> {
        let timeout = self.timeout;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::from_http(e, timeout, ConnectorError::Fetch))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::Fetch(format!("{} returned {}", url, status)));
        }
        let body = read_capped(response, self.max_bytes, timeout, ConnectorError::Fetch).await?;
        let html = String::from_utf8_lossy(&body);

        let article = parse_article(&html, url, self.max_chars);
        debug!(url, title = %article.title, chars = article.text.len(), "Article fetched");
        Ok(article)
    }
}

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"));
static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .expect("valid og:title pattern")
});
static H1_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid h1 pattern"));
static NON_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|head|nav|footer|svg)\b[^>]*>.*?</(script|style|noscript|head|nav|footer|svg)>")
        .expect("valid non-content pattern")
});
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|article|section|blockquote|pre)\b[^>]*>")
        .expect("valid block pattern")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag pattern"));

/// Extract title and readable text from an HTML page.
pub fn parse_article(html: &str, url: &str, max_chars: usize) -> Article {
    let title = [&*TITLE_TAG, &*OG_TITLE, &*H1_TAG]
        .iter()
        .filter_map(|re| re.captures(html))
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize_inline(&strip_tags(m.as_str())))
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_ARTICLE.to_string());

    let without_noise = NON_CONTENT.replace_all(html, "");
    let without_comments = COMMENT.replace_all(&without_noise, "");
    let with_breaks = BLOCK_TAG.replace_all(&without_comments, "\n");
    let text = decode_entities(&ANY_TAG.replace_all(&with_breaks, ""));

    let paragraphs: Vec<String> = text
        .lines()
        .map(normalize_inline)
        .filter(|line| !line.is_empty())
        .collect();

    Article {
        title,
        text: truncate_chars(&paragraphs.join("\n\n"), max_chars),
        url: url.to_string(),
    }
}

fn strip_tags(fragment: &str) -> String {
    decode_entities(&ANY_TAG.replace_all(fragment, ""))
}

fn normalize_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ARTICLE_TRUNCATED),
        None => text.to_string(),
    }
}
