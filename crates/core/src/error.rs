//! Unified error types for the inbox engine.
//!
//! Error codes returned over HTTP:
//! - VALID_001-003: Inbound message validation
//! - AUTH_005: Sender not allowed
//! - ITEM_001-003: Queue item lookups and status transitions
//! - DB_001: Storage failures

use thiserror::Error;

use crate::item::{ItemId, ItemStatus};

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Invalid JSON / invalid format
    InvalidFormat,
    /// VALID_002: Message body exceeds the size limit
    MessageTooLarge,
    /// VALID_003: Message carries no usable content
    EmptyContent,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::MessageTooLarge => "VALID_002",
            Self::EmptyContent => "VALID_003",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MessageTooLarge => 413,
            _ => 400,
        }
    }
}

/// Unified error type for the inbox engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("sender not allowed: {0}")]
    Forbidden(String),

    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    /// The stored status no longer matched the expected one.
    #[error("status conflict on item {id}: expected {expected}, found {}", display_status(.actual))]
    Conflict {
        id: ItemId,
        expected: ItemStatus,
        actual: Option<ItemStatus>,
    },

    /// A finalize lost its compare-and-swap. Another writer touched an item
    /// this processor had claimed.
    #[error("internal consistency error on item {id}: {message}")]
    InternalConsistency { id: ItemId, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn display_status(status: &Option<ItemStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("missing")
}

impl Error {
    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn internal_consistency(id: ItemId, msg: impl Into<String>) -> Self {
        Self::InternalConsistency {
            id,
            message: msg.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::Validation(_) => 400,
            Self::Serialization(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::InvalidTransition { .. } => 409,
            Self::Conflict { .. } => 409,
            Self::InternalConsistency { .. } => 500,
            Self::Storage(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationWithCode { code, .. } => code,
            Self::Validation(_) | Self::Serialization(_) => "VALID_001",
            Self::Forbidden(_) => "AUTH_005",
            Self::NotFound(_) => "ITEM_001",
            Self::InvalidTransition { .. } => "ITEM_002",
            Self::Conflict { .. } => "ITEM_003",
            Self::Storage(_) => "DB_001",
            Self::InternalConsistency { .. } | Self::Config(_) | Self::Internal(_) => "INTERNAL",
        }
    }
}
