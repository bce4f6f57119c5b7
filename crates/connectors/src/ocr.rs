//! Optical character recognition via the tesseract CLI.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{ConnectorError, ConnectorResult};

/// Extracts text from image bytes.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract(&self, image: &[u8], language: &str) -> ConnectorResult<String>;
}

/// Runs `tesseract stdin stdout -l <language>`.
pub struct TesseractOcr {
    binary: String,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary.clone(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn extract(&self, image: &[u8], language: &str) -> ConnectorResult<String> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConnectorError::Extraction(format!("could not start {}: {}", self.binary, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| ConnectorError::Extraction(format!("write to ocr stdin: {}", e)))?;
            // Closing stdin lets tesseract start reading.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ConnectorError::Extraction(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConnectorError::Extraction(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.len(), language, "OCR complete");
        Ok(text)
    }
}
