//! AI content analysis.
//!
//! Providers receive one prompt asking for a JSON object and reply with
//! free-form text; [`NoteAnalysis::parse_reply`] recovers the object.
//! Sanitization happens in the pipeline, not here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inbox_core::NoteAnalysis;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::{AiConfig, AiProviderKind};
use crate::error::{ConnectorError, ConnectorResult};

const MAX_PROMPT_FOLDERS: usize = 20;
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";
const OLLAMA_DEFAULT_MODEL: &str = "llama3.1:8b";
const CLAUDE_DEFAULT_URL: &str = "https://api.anthropic.com";
const CLAUDE_DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// What the provider is told about the content besides the text itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Where the message came from, e.g. "Telegram"
    pub source: String,
    /// Payload kind: text, photo, document, voice
    pub content_type: String,
    /// Vault folders the provider may reuse
    pub existing_folders: Vec<String>,
}

/// An AI provider that turns content into a structured analysis.
#[async_trait]
pub trait AiAnalyzer: Send + Sync {
    /// Provider name recorded on the note.
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        content: &str,
        context: &AnalysisContext,
    ) -> ConnectorResult<NoteAnalysis>;

    /// Cheap reachability check for the health endpoint.
    async fn ping(&self) -> ConnectorResult<()> {
        Ok(())
    }
}

/// Build the configured provider. `Disabled` yields `None`.
pub fn build_analyzer(config: &AiConfig) -> ConnectorResult<Option<Arc<dyn AiAnalyzer>>> {
    let analyzer: Arc<dyn AiAnalyzer> = match config.provider {
        AiProviderKind::Disabled => return Ok(None),
        AiProviderKind::Ollama => Arc::new(OllamaAnalyzer::new(config)),
        AiProviderKind::Claude => Arc::new(ClaudeAnalyzer::new(config)?),
    };
    info!(provider = analyzer.name(), "AI analyzer configured");
    Ok(Some(analyzer))
}

/// Prompt asking for the analysis JSON object.
pub fn build_prompt(content: &str, context: &AnalysisContext) -> String {
    let mut folders = String::new();
    if !context.existing_folders.is_empty() {
        let shown: Vec<&str> = context
            .existing_folders
            .iter()
            .take(MAX_PROMPT_FOLDERS)
            .map(String::as_str)
            .collect();
        folders = format!("\n- Existing vault folders: {}", shown.join(", "));
        if context.existing_folders.len() > MAX_PROMPT_FOLDERS {
            folders.push_str(" (more omitted)");
        }
    }

    format!(
        r#"You organize a personal knowledge base. Analyze the content below and describe it for filing.

Content:
{content}

Context:
- Source: {source}
- Content type: {content_type}{folders}

Reply with a single JSON object and nothing else:
{{
  "title": "specific, searchable title of 3 to 8 words",
  "summary": "2 to 3 sentences on what matters and why",
  "tags": ["3 to 5 broad reusable tags"],
  "suggested_folder": "folder path such as Knowledge/Tech, Ideas or Inbox",
  "connections": ["themes or questions this relates to"],
  "entities": ["people, organizations, technologies or concepts mentioned"]
}}

Prefer an existing folder when one fits."#,
        content = content,
        source = context.source,
        content_type = context.content_type,
        folders = folders,
    )
}

fn parse_analysis(provider: &str, reply: &str) -> ConnectorResult<NoteAnalysis> {
    NoteAnalysis::parse_reply(reply).ok_or_else(|| {
        ConnectorError::AiProvider(format!("{} reply was not a JSON analysis", provider))
    })
}

/// Local models through Ollama's generate API.
pub struct OllamaAnalyzer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

impl OllamaAnalyzer {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl AiAnalyzer for OllamaAnalyzer {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn analyze(
        &self,
        content: &str,
        context: &AnalysisContext,
    ) -> ConnectorResult<NoteAnalysis> {
        let request = json!({
            "model": self.model,
            "prompt": build_prompt(content, context),
            "stream": false,
            "format": "json",
            "options": { "temperature": self.temperature },
        });

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::from_http(e, self.timeout, ConnectorError::AiProvider))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ConnectorError::AiProvider(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        let generated: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::AiProvider(format!("Failed to parse response: {}", e)))?;

        debug!(
            model = %self.model,
            tokens = generated.eval_count.unwrap_or(0),
            "Ollama analysis received"
        );
        parse_analysis("ollama", &generated.response)
    }

    async fn ping(&self) -> ConnectorResult<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ConnectorError::AiProvider(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ConnectorError::AiProvider(format!(
                "Ollama returned {}",
                response.status()
            )))
        }
    }
}

/// Anthropic's messages API.
pub struct ClaudeAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeAnalyzer {
    pub fn new(config: &AiConfig) -> ConnectorResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConnectorError::Config("claude provider needs ai.api_key".into()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| CLAUDE_DEFAULT_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| CLAUDE_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl AiAnalyzer for ClaudeAnalyzer {
    fn name(&self) -> &str {
        "claude"
    }

    async fn analyze(
        &self,
        content: &str,
        context: &AnalysisContext,
    ) -> ConnectorResult<NoteAnalysis> {
        let request = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": build_prompt(content, context) }
            ],
        });

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::from_http(e, self.timeout, ConnectorError::AiProvider))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ConnectorError::AiProvider(format!(
                "Claude API error ({}): {}",
                status, body
            )));
        }

        let reply: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::AiProvider(format!("Failed to parse response: {}", e)))?;

        let text: String = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        parse_analysis("claude", &text)
    }
}
