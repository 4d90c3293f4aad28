//! pyrite-engine: embedded Python scripting with corrected eval semantics.
//!
//! This crate wraps the RustPython virtual machine behind a small scripting
//! surface:
//!
//! - **Session** ([`PySession`]): one interpreter with a persistent variable
//!   scope, owned by a dedicated thread so interpreter objects never cross
//!   thread boundaries
//! - **Engine** ([`PyEngine`]): evaluates a script as a program and returns
//!   the value of its last line, the convention other embedded scripting
//!   engines follow
//! - **Context** ([`ExecContext`]): per-call stdin/stdout/stderr streams and
//!   variable bindings
//! - **Cleanup** ([`CleanupCoordinator`]): clears interpreter-local
//!   variables after an engine is dropped, so short-lived engines do not
//!   accumulate state
//! - **Language** ([`PythonLanguage`]): the provider a host scripting
//!   registry plugs in, tying engine creation to cleanup registration
//!
//! # Quick start
//!
//! ```no_run
//! use pyrite_engine::{ExecContext, PyEngine};
//!
//! let engine = PyEngine::new()?;
//! let ctx = ExecContext::new();
//! let result = engine.eval("x = 20\nx + 2", &ctx)?;
//! assert_eq!(result.as_int(), Some(22));
//! # Ok::<(), pyrite_types::ScriptError>(())
//! ```

pub mod cleanup;
pub mod context;
mod convert;
pub mod engine;
pub mod language;
pub mod session;

pub use cleanup::{CleanupConfig, CleanupCoordinator, ReservedNames};
pub use context::{CaptureBuffer, ExecContext};
pub use engine::PyEngine;
pub use language::{PythonLanguage, ScriptLanguage};
pub use session::{PySession, SessionConfig};

// Re-export the leaf types so embedders need only one dependency.
pub use pyrite_types::{ScriptError, ScriptResult, Value};
