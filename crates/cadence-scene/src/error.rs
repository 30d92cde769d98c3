//! Error types for the timing engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::animation::types::TimelineId;

/// Result type for timing engine operations.
pub type Result<T> = std::result::Result<T, TimingError>;

/// UI-facing error code attached to invalid-operation conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Timing properties changed while the root storyboard is running.
    SbModifyActiveAnimation,
    /// A target name could not be found in its namescope.
    SbBeginInvalidTarget,
    /// A target property path could not be parsed.
    SbBeginInvalidProp,
    /// Begin found no target object or no target property.
    SbBeginNoTarget,
    /// The animation's value type does not match the target property.
    SbBeginIncompatibleType,
    /// Two animations in one timing tree target the same property.
    SbBeginAnimComposition,
    /// Storyboard control was invoked on a nested storyboard.
    SbMustBeRoot,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::SbModifyActiveAnimation => "AG_E_RUNTIME_SB_MODIFY_ACTIVE_ANIMATION",
            Self::SbBeginInvalidTarget => "AG_E_RUNTIME_SB_BEGIN_INVALID_TARGET",
            Self::SbBeginInvalidProp => "AG_E_RUNTIME_SB_BEGIN_INVALID_PROP",
            Self::SbBeginNoTarget => "AG_E_RUNTIME_SB_BEGIN_NO_TARGET",
            Self::SbBeginIncompatibleType => "AG_E_RUNTIME_SB_BEGIN_INCOMPATIBLE_TYPE",
            Self::SbBeginAnimComposition => "AG_E_RUNTIME_SB_BEGIN_ANIM_COMPOSITION",
            Self::SbMustBeRoot => "AG_E_RUNTIME_SB_MUST_BE_ROOT",
        };
        f.write_str(code)
    }
}

/// Errors that can occur while building or ticking a timing tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimingError {
    /// An argument was out of range. Some setters also coerce the value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state.
    #[error("invalid operation ({code}): {detail}")]
    InvalidOperation { code: ErrorCode, detail: String },

    /// A key frame's time lies past the animation's explicit duration.
    #[error("key frame at {key_time}s lies beyond the {duration}s duration")]
    KeyFrameBeyondDuration { key_time: f64, duration: f64 },

    /// No timeline is registered under this id.
    #[error("unknown timeline {0:?}")]
    MissingTimeline(TimelineId),

    /// A property path could not be tokenized.
    #[error("malformed property path: {0}")]
    PropertyPath(String),

    /// The scene graph rejected a read or write.
    #[error("scene error: {0}")]
    Scene(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TimingError {
    pub fn invalid_operation(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::InvalidOperation {
            code,
            detail: detail.into(),
        }
    }

    /// The UI-facing code, if this is an invalid-operation condition.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::InvalidOperation { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Decides whether recoverable conditions are reported or abort the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorPolicy {
    pub fail_fast: bool,
}

impl ErrorPolicy {
    pub fn new(fail_fast: bool) -> Self {
        Self { fail_fast }
    }

    /// Report `err` as a recoverable failure, or panic under fail-fast.
    pub fn report<T>(&self, err: TimingError) -> Result<T> {
        if self.fail_fast {
            panic!("fail-fast: {err}");
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        let err = TimingError::invalid_operation(ErrorCode::SbModifyActiveAnimation, "begin time");
        assert_eq!(err.code(), Some(ErrorCode::SbModifyActiveAnimation));
        assert_eq!(
            err.to_string(),
            "invalid operation (AG_E_RUNTIME_SB_MODIFY_ACTIVE_ANIMATION): begin time"
        );
    }

    #[test]
    fn test_report_is_recoverable_by_default() {
        let policy = ErrorPolicy::default();
        let result: Result<()> = policy.report(TimingError::InvalidArgument("x".into()));
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "fail-fast")]
    fn test_report_panics_under_fail_fast() {
        let policy = ErrorPolicy::new(true);
        let _: Result<()> = policy.report(TimingError::InvalidArgument("x".into()));
    }
}
