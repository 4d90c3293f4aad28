//! The engine adapter: run-as-program, return-the-last-line evaluation.
//!
//! Stock expression evaluation fails on multi-statement scripts because
//! assignments, imports and function definitions are not expressions. The
//! engine splits a script at its last newline, executes everything before
//! it as statements, then evaluates the final segment as an expression,
//! so arbitrary scripts behave like "run as program, return value of last
//! line", matching the convention of other embedded scripting engines.
//!
//! Concurrency: evaluate calls on one engine are not reentrant. A session
//! holds one set of attached streams at a time, so concurrent `eval` calls
//! from multiple threads race on which context's streams are active.
//! Callers must serialize calls to the same engine.

use std::io::Read;
use std::sync::Arc;

use pyrite_types::{ScriptError, ScriptResult, Value};

use crate::context::ExecContext;
use crate::session::{PySession, SessionConfig};

/// Read buffer size for stream-sourced scripts.
const READ_CHUNK: usize = 64 * 1024;

/// Marker the cleanup coordinator observes (weakly) to learn when an
/// engine has been dropped.
pub(crate) struct EngineToken;

/// One scripting engine bound to a fresh interpreter session.
pub struct PyEngine {
    session: PySession,
    token: Arc<EngineToken>,
}

impl PyEngine {
    /// An engine over a default-configured session.
    pub fn new() -> ScriptResult<Self> {
        Self::with_config(&SessionConfig::default())
    }

    /// An engine over a session built from `config`.
    pub fn with_config(config: &SessionConfig) -> ScriptResult<Self> {
        Ok(Self {
            session: PySession::new(config)?,
            token: Arc::new(EngineToken),
        })
    }

    /// The underlying session, for inspecting variables after evaluation.
    pub fn session(&self) -> &PySession {
        &self.session
    }

    pub(crate) fn token(&self) -> &Arc<EngineToken> {
        &self.token
    }

    /// Evaluate `script` with the context's streams and bindings attached,
    /// returning the value of its last line.
    ///
    /// The final segment is evaluated as an expression where possible; a
    /// final segment that is itself a statement (`a = 4 + 5` with no
    /// trailing expression) is executed and yields [`Value::None`], as
    /// does an empty final segment (script ending in a newline).
    pub fn eval(&self, script: &str, ctx: &ExecContext) -> ScriptResult<Value> {
        self.session.attach(ctx)?;

        let (statements, last) = split_script(script);
        if let Some(block) = statements {
            self.session.exec(block)?;
        }
        if last.trim().is_empty() {
            return Ok(Value::None);
        }
        match self.session.eval(last) {
            Ok(value) => Ok(value),
            // Not an expression: run it as a statement and return no value.
            Err(ScriptError::Syntax { .. }) => {
                self.session.exec(last)?;
                Ok(Value::None)
            }
            Err(err) => Err(err),
        }
    }

    /// Read an entire script from `source`, then evaluate it.
    ///
    /// The stream is fully consumed before evaluation begins and is closed
    /// (dropped) on every path, including read failure.
    pub fn eval_reader(&self, mut source: impl Read, ctx: &ExecContext) -> ScriptResult<Value> {
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => bytes.extend_from_slice(&chunk[..n]),
                Err(err) => return Err(ScriptError::Stream(err)),
            }
        }
        drop(source);
        let script = String::from_utf8(bytes)?;
        self.eval(&script, ctx)
    }
}

impl std::fmt::Debug for PyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyEngine").finish_non_exhaustive()
    }
}

/// Split a script at its last newline into a statement block (inclusive of
/// the newline) and the final segment. A script with no newline is all
/// final segment.
fn split_script(script: &str) -> (Option<&str>, &str) {
    match script.rfind('\n') {
        Some(pos) => (Some(&script[..=pos]), &script[pos + 1..]),
        None => (None, script),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_without_newline_is_all_final_segment() {
        assert_eq!(split_script("1 + 2"), (None, "1 + 2"));
    }

    #[test]
    fn split_keeps_newline_in_statement_block() {
        assert_eq!(split_script("a = 1\na + 1"), (Some("a = 1\n"), "a + 1"));
    }

    #[test]
    fn split_trailing_newline_leaves_empty_final_segment() {
        assert_eq!(split_script("a = 1\n"), (Some("a = 1\n"), ""));
    }

    #[test]
    fn split_multiline() {
        let script = "x = 2\ny = 3\nx * y";
        assert_eq!(split_script(script), (Some("x = 2\ny = 3\n"), "x * y"));
    }

    #[test]
    fn split_empty_script() {
        assert_eq!(split_script(""), (None, ""));
    }
}
