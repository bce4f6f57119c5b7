//! Size limits for inbound messages and pipeline content.
//!
//! The `#[validate]` derive requires literal values in attributes, so the
//! field limits on [`crate::inbound`] types repeat a few of these numbers.
//! Keep both in sync when modifying.

// === Receiver Limits ===

/// Maximum raw request body accepted by the receiver (256KB).
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// Maximum text message length in chars.
///
/// Chat transports cap messages at 4096 chars; forwarded content can be
/// longer after link expansion, so leave headroom.
pub const MAX_TEXT_CHARS: usize = 16 * 1024;

/// Maximum caption length in chars.
pub const MAX_CAPTION_CHARS: usize = 4096;

/// Maximum formatting entities per text message.
pub const MAX_ENTITIES: usize = 512;

/// Maximum content reference length (URL or opaque file id).
pub const MAX_CONTENT_REF_LEN: usize = 2048;

/// Maximum voice note duration in seconds (2 hours).
pub const MAX_VOICE_DURATION_SECS: u32 = 7200;

// === Pipeline Limits ===

/// Default cap on chars sent to the AI provider.
pub const DEFAULT_MAX_ANALYSIS_CHARS: usize = 10_000;

/// Marker appended to content truncated for analysis.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated for analysis...]";

/// Maximum note title length (chars).
pub const MAX_TITLE_CHARS: usize = 100;

/// Default number of tags kept from an analysis.
pub const DEFAULT_MAX_TAGS: usize = 5;

/// Maximum `-N` suffix tried when a note filename already exists.
pub const MAX_FILENAME_CONFLICTS: u32 = 1000;

/// Maximum fetched media size (50MB).
pub const MAX_MEDIA_BYTES: usize = 50 * 1024 * 1024;
