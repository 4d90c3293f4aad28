//! Error taxonomy for script evaluation.
//!
//! Interpreter failures are never retried: syntax and runtime errors
//! propagate to the caller with the interpreter's own message preserved.
//! Cleanup failures have no variant here; they are caught and logged inside
//! the cleanup coordinator and never cross an API boundary.

use thiserror::Error;

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors surfaced by script evaluation and session operations.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The source failed to compile.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Compiler message, including the offending token where available.
        message: String,
        /// 1-based source line.
        line: u32,
        /// 1-based source column.
        column: u32,
    },

    /// The interpreter raised while executing.
    ///
    /// `message` is the interpreter's own error text (e.g. "division by
    /// zero"); `traceback` is the formatted exception chain.
    #[error("{message}")]
    Runtime { message: String, traceback: String },

    /// Reading script source from a stream failed.
    #[error("failed to read script source: {0}")]
    Stream(#[from] std::io::Error),

    /// Script source bytes were not valid UTF-8.
    #[error("script source was not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Operation on a session that has been closed.
    #[error("interpreter session is closed")]
    Closed,
}

impl ScriptError {
    /// True for errors raised by the interpreter itself (as opposed to
    /// stream or lifecycle failures).
    pub fn is_interpreter_error(&self) -> bool {
        matches!(self, ScriptError::Syntax { .. } | ScriptError::Runtime { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_display_is_the_interpreter_message() {
        let err = ScriptError::Runtime {
            message: "division by zero".into(),
            traceback: "Traceback (most recent call last): ...".into(),
        };
        assert_eq!(err.to_string(), "division by zero");
        assert!(err.is_interpreter_error());
    }

    #[test]
    fn syntax_display_carries_position() {
        let err = ScriptError::Syntax {
            message: "invalid syntax".into(),
            line: 2,
            column: 5,
        };
        let text = err.to_string();
        assert!(text.contains("line 2"));
        assert!(text.contains("column 5"));
    }

    #[test]
    fn stream_errors_convert_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: ScriptError = io.into();
        assert!(matches!(err, ScriptError::Stream(_)));
        assert!(!err.is_interpreter_error());
    }
}
