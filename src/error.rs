//! Error types for vimgolf-bench operations.
//!
//! Defines the error types for the major subsystems:
//! - Editing engine transport (start, keystroke injection, state queries)
//! - LLM API interactions
//! - Problem set loading

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the external editing engine.
///
/// These are transport-level failures. Keystrokes that make no sense in the
/// current mode are not errors; they just produce whatever state they produce.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine failed to start: {0}")]
    Start(String),

    #[error("Engine did not accept connections within {0:?}")]
    StartupTimeout(Duration),

    #[error("Keystroke injection failed: {0}")]
    Injection(String),

    #[error("Engine query failed: {0}")]
    Query(String),

    #[error("Engine request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("Line {line} is out of range (buffer has {line_count} lines)")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("Editing session is not active")]
    InactiveSession,

    #[error("Malformed engine response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Returns true if the error means the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Start(_) | EngineError::StartupTimeout(_) | EngineError::InactiveSession
        )
    }
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: set OPENAI_API_KEY, OPENROUTER_API_KEY or LITELLM_API_KEY")]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("LLM response contained no content")]
    EmptyResponse,

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while loading a problem set.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("Problem '{0}' not found")]
    NotFound(String),

    #[error("Duplicate problem id '{0}'")]
    DuplicateId(String),

    #[error("Invalid problem '{id}': {reason}")]
    Invalid { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_fatality() {
        assert!(EngineError::InactiveSession.is_fatal());
        assert!(EngineError::Start("no such binary".to_string()).is_fatal());
        assert!(!EngineError::Injection("broken pipe".to_string()).is_fatal());
        assert!(!EngineError::RequestTimeout(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::LineOutOfRange {
            line: 4,
            line_count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Line 4 is out of range (buffer has 2 lines)"
        );

        let err = LlmError::ApiError {
            code: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): bad key");
    }
}
