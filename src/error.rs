//! Error taxonomy
//!
//! `RenderError` is what the browser layer reports. The orchestrator turns it
//! into a `ClassifiedError`, which is passed through unchanged from then on.

use serde::Serialize;
use thiserror::Error;

pub const TIMEOUT_MESSAGE: &str = "Timeout durante l'accesso al sito sorgente.";
pub const PARSE_FAILED_MESSAGE: &str = "Impossibile estrarre le news dal sito sorgente.";
pub const INTERNAL_MESSAGE: &str = "Errore interno del server.";

/// Stable error kinds exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "UPSTREAM_TIMEOUT")]
    UpstreamTimeout,
    #[serde(rename = "UPSTREAM_PARSE_FAILED")]
    UpstreamParseFailed,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorKind {
    /// HTTP status the request layer should answer with
    pub fn suggested_status(self) -> u16 {
        match self {
            ErrorKind::UpstreamTimeout => 504,
            ErrorKind::UpstreamParseFailed => 502,
            ErrorKind::Internal => 500,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ErrorKind::UpstreamParseFailed => "UPSTREAM_PARSE_FAILED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A failure tagged with its kind. Never reclassified once built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn upstream_timeout() -> Self {
        Self::new(ErrorKind::UpstreamTimeout, TIMEOUT_MESSAGE)
    }

    pub fn upstream_parse_failed() -> Self {
        Self::new(ErrorKind::UpstreamParseFailed, PARSE_FAILED_MESSAGE)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, INTERNAL_MESSAGE)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggested_status(&self) -> u16 {
        self.kind.suggested_status()
    }

    /// `{"error": <code>, "message": <message>}` body
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.kind.code(),
            "message": self.message,
        })
    }
}

/// Raw failure from the page-rendering collaborator
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Timeout while {0}")]
    Timeout(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl RenderError {
    /// Timeout by variant or by message
    pub fn is_timeout(&self) -> bool {
        match self {
            RenderError::Timeout(_) => true,
            other => other.to_string().to_lowercase().contains("timeout"),
        }
    }

    /// Map onto the client-facing taxonomy
    pub fn classify(&self) -> ClassifiedError {
        if self.is_timeout() {
            ClassifiedError::upstream_timeout()
        } else {
            ClassifiedError::upstream_parse_failed()
        }
    }
}

impl From<chromiumoxide::error::CdpError> for RenderError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        match err {
            chromiumoxide::error::CdpError::Timeout => {
                RenderError::Timeout("waiting for the browser".to_string())
            }
            other => RenderError::Browser(other.to_string()),
        }
    }
}
