//! Error taxonomy for the store, pipeline, and capability clients.
//!
//! `Transient` errors are eligible for bounded retry inside the client that
//! produced them; everything else propagates straight up and aborts the
//! current phase.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A project document, snapshot version, scene, or character that the
    /// operation requires is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted to initialize a project that already has a live document.
    #[error("project already exists: {0}")]
    AlreadyExists(String),

    /// A capability returned a response we could not make sense of.
    #[error("invalid response from {service}: {reason}")]
    Validation { service: String, reason: String },

    /// Network/timeout/5xx failure from a capability. Retryable.
    #[error("transient failure calling {service}: {reason}")]
    Transient { service: String, reason: String },

    /// Non-retryable capability failure (auth, bad request).
    #[error("{service} request failed: {reason}")]
    Terminal { service: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    pub(crate) fn validation(service: &str, reason: impl Into<String>) -> Self {
        Error::Validation {
            service: service.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transient(service: &str, reason: impl std::fmt::Display) -> Self {
        Error::Transient {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn terminal(service: &str, reason: impl std::fmt::Display) -> Self {
        Error::Terminal {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let err = Error::transient("image", "connection reset");
        assert!(err.is_transient());

        let err = Error::terminal("image", "401 unauthorized");
        assert!(!err.is_transient());

        assert!(!Error::NotFound("proj-1".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Validation {
            service: "llm".into(),
            reason: "no JSON object in reply".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid response from llm: no JSON object in reply"
        );
    }
}
