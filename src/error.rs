//! Structured error types shared by every component.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Addressing
    InvalidPath,

    // Resource construction
    InvalidResourceConfig,
    UnknownResource,
    DuplicateResource,

    // Pub/sub registry
    DuplicateSubscription,
    SubscriptionNotFound,

    // Runtime
    InvalidState,

    // Pass-through from collaborators
    Decode,
    Io,
    Internal,
}

/// Structured error with a code, a message and key/value context.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach a contextual key/value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// True when the error carries the given code.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    // Convenience constructors

    pub fn invalid_path(path: &str) -> Self {
        Self::new(ErrorCode::InvalidPath, format!("Invalid path: '{}'", path))
            .with_context("path", path)
    }

    pub fn invalid_config(id: &str, field: &str) -> Self {
        Self::new(
            ErrorCode::InvalidResourceConfig,
            format!("Resource {} has a missing or invalid '{}'", id, field),
        )
        .with_field(field)
        .with_context("id", id)
    }

    pub fn unknown_resource(kind: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::UnknownResource,
            format!("Unknown {}: {}", kind, id),
        )
        .with_context("kind", kind)
        .with_context("id", id)
    }

    pub fn duplicate_resource(kind: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateResource,
            format!("Duplicate {}: {}", kind, id),
        )
        .with_context("kind", kind)
        .with_context("id", id)
    }

    pub fn duplicate_subscription(id: impl fmt::Debug, channel: impl fmt::Debug) -> Self {
        Self::new(
            ErrorCode::DuplicateSubscription,
            format!("{:?} is already subscribed to {:?}", id, channel),
        )
        .with_context("id", format!("{:?}", id))
        .with_context("channel", format!("{:?}", channel))
    }

    pub fn subscription_not_found(id: impl fmt::Debug, channel: impl fmt::Debug) -> Self {
        Self::new(
            ErrorCode::SubscriptionNotFound,
            format!("{:?} is not subscribed to {:?}", id, channel),
        )
        .with_context("id", format!("{:?}", id))
        .with_context("channel", format!("{:?}", channel))
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, reason)
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Decode, err.to_string())
    }

    pub fn io(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Io, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Internal, err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io(&err).with_context("kind", format!("{:?}", err.kind()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::decode(&err)
            .with_context("format", "json")
            .with_context("line", err.line())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        let mut error = Error::decode(&err).with_context("format", "yaml");
        if let Some(location) = err.location() {
            error = error.with_context("line", location.line());
        }
        error
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(error) => error,
            Err(err) => Error::internal(err),
        }
    }
}

/// Result type for hearth operations.
pub type Result<T> = std::result::Result<T, Error>;
