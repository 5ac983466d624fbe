//! Error types for library operations
//!
//! Tag and geometry errors are programming errors in the interpreter. They
//! are returned to the caller and also reported on the strict-warning
//! channel, whose policy the host picks at startup.

use serde::{Deserialize, Serialize};

use crate::core::Tag;

/// Error type for Glk API calls
#[derive(Debug, thiserror::Error)]
pub enum GlkError {
    #[error("no object with tag {0}")]
    UnknownTag(Tag),

    #[error("invalid window split: {0}")]
    InvalidSplit(String),

    #[error("window {0} already has a pending input request")]
    DuplicateInputRequest(Tag),

    #[error("stale response for window {tag}: request {got}, current {expected}")]
    StaleResponse { tag: Tag, expected: u32, got: u32 },

    #[error("window {0} has the wrong type for this operation")]
    WrongWindowType(Tag),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("exit requested")]
    ExitRequested,
}

/// Result type for Glk API calls
pub type Result<T> = std::result::Result<T, GlkError>;

impl GlkError {
    /// True for errors that are part of normal control flow rather than
    /// interpreter bugs.
    pub fn is_benign(&self) -> bool {
        matches!(self, GlkError::StaleResponse { .. } | GlkError::ExitRequested)
    }
}

/// What to do with a strict warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrictPolicy {
    /// Log through `tracing::warn!`
    #[default]
    Log,
    /// Panic; meant for debug builds and tests
    Panic,
    /// Drop silently
    Ignore,
}

/// Report an interpreter-side misuse of the API.
pub fn strict_warning(policy: StrictPolicy, err: &GlkError) {
    match policy {
        StrictPolicy::Log => tracing::warn!(target: "glk::strict", "{}", err),
        StrictPolicy::Panic => panic!("strict warning: {}", err),
        StrictPolicy::Ignore => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GlkError::UnknownTag(Tag::new(7));
        assert_eq!(err.to_string(), "no object with tag 7");

        let err = GlkError::StaleResponse {
            tag: Tag::new(3),
            expected: 2,
            got: 1,
        };
        assert!(err.to_string().contains("request 1"));
    }

    #[test]
    fn test_benign_errors() {
        assert!(GlkError::ExitRequested.is_benign());
        assert!(!GlkError::InvalidSplit("x".into()).is_benign());
    }

    #[test]
    fn test_policy_ignore_and_log_do_not_panic() {
        let err = GlkError::UnknownTag(Tag::new(1));
        strict_warning(StrictPolicy::Ignore, &err);
        strict_warning(StrictPolicy::Log, &err);
    }

    #[test]
    #[should_panic(expected = "strict warning")]
    fn test_policy_panic() {
        strict_warning(StrictPolicy::Panic, &GlkError::UnknownTag(Tag::new(1)));
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&StrictPolicy::Panic).unwrap();
        assert_eq!(json, "\"panic\"");
    }
}
