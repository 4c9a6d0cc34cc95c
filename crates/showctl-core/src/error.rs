//! Error taxonomy: startup failures, diagnostic dispatch errors, and the
//! serializable protocol error.
//!
//! Caller errors (invalid layer name, unknown shot id, bad transition
//! speed) are deliberately *not* errors; they are signaled through
//! `Ok(false)` returns so that "no such shot" stays routine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::value::Role;

/// A failed call into the external object model, as seen by a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The named member does not exist on the target object.
    #[error("member not found")]
    MemberNotFound,
    /// The member exists but the call failed.
    #[error("{0}")]
    Failed(String),
    /// The call returned a value of an unexpected shape.
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// A [`CallError`] tagged with the logical target and member name.
///
/// This is the diagnostic error of the system: it indicates the external
/// application is in an unexpected state, not that the caller asked for
/// something routine-but-absent.
#[derive(Debug, Error)]
#[error("'{member}' on {role}: {source}")]
pub struct DispatchError {
    pub role: Role,
    pub member: String,
    #[source]
    pub source: CallError,
}

/// Failure to acquire the automation session at startup. Fatal: without a
/// handle no component may operate.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("cannot attach to or launch '{app}' (attach: {attach}; launch: {launch})")]
    Unavailable {
        app: String,
        attach: CallError,
        launch: CallError,
    },
    #[error("no document at index 1 after startup")]
    NoDocument,
    #[error("document has no '{0}' layer")]
    NoLayer(&'static str),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Error codes for protocol responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    StudioCallFailed,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::StudioCallFailed => write!(f, "STUDIO_CALL_FAILED"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// An error response with actionable context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some("Check the command syntax and try again".into()),
        }
    }

    /// Create an invalid input error with a custom suggestion.
    pub fn invalid_input_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// A dispatch into the studio failed. The role and member name from the
    /// underlying error are preserved for diagnosis.
    pub fn studio_call_failed(error: &DispatchError) -> Self {
        Self {
            code: ErrorCode::StudioCallFailed,
            message: format!("Studio call failed: {}", error),
            suggestion: Some(
                "The studio application may be unresponsive or in an unexpected state. \
                 Check that it is running and healthy."
                    .into(),
            ),
        }
    }

    /// The serialized studio worker has terminated.
    pub fn worker_gone() -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: "The studio worker has terminated".to_string(),
            suggestion: Some("Restart the daemon with 'showctl daemon'".into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("This is an internal error. Please report it if it persists.".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_names_role_and_member() {
        let err = DispatchError {
            role: Role::Layer,
            member: "PreviewShotID".to_string(),
            source: CallError::MemberNotFound,
        };
        let text = err.to_string();
        assert!(text.contains("PreviewShotID"));
        assert!(text.contains("layer"));
    }

    #[test]
    fn test_acquire_unavailable_names_both_causes() {
        let err = AcquireError::Unavailable {
            app: "Wirecast".to_string(),
            attach: CallError::Failed("not running".into()),
            launch: CallError::Failed("launch denied".into()),
        };
        let text = err.to_string();
        assert!(text.contains("Wirecast"));
        assert!(text.contains("not running"));
        assert!(text.contains("launch denied"));
    }

    #[test]
    fn test_studio_call_failed_has_suggestion() {
        let dispatch = DispatchError {
            role: Role::Document,
            member: "IsBroadcasting".to_string(),
            source: CallError::Failed("disconnected".into()),
        };
        let err = ApiError::studio_call_failed(&dispatch);
        assert!(matches!(err.code, ErrorCode::StudioCallFailed));
        assert!(err.message.contains("IsBroadcasting"));
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_display_format_with_suggestion() {
        let err = ApiError::invalid_input("bad layer");
        let display = format!("{}", err);
        assert!(display.contains("[INVALID_INPUT]"));
        assert!(display.contains("bad layer"));
        assert!(display.contains("(hint:"));
    }

    #[test]
    fn test_json_round_trip() {
        let err = ApiError::worker_gone();
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INTERNAL_ERROR"));
        let back: ApiError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
