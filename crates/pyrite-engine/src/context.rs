//! Per-call execution context: streams and variable bindings.
//!
//! An `ExecContext` is borrowed by the engine for the duration of one
//! `eval` call. Its streams are installed into the interpreter's `sys`
//! module and stay attached until the next call attaches different ones;
//! its bindings are copied into the session scope before execution.
//!
//! Stream handles are `Arc<Mutex<..>>` so the caller can keep a clone and
//! read back captured output after evaluation; see [`CaptureBuffer`].

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use pyrite_types::Value;

/// Shared handle to the context's input stream.
pub type InputHandle = Arc<Mutex<dyn BufRead + Send>>;

/// Shared handle to an output (stdout/stderr) stream.
pub type OutputHandle = Arc<Mutex<dyn Write + Send>>;

/// Streams and variable bindings for one evaluation.
///
/// Defaults: empty stdin, discarded stdout/stderr, no bindings.
#[derive(Clone)]
pub struct ExecContext {
    stdin: InputHandle,
    stdout: OutputHandle,
    stderr: OutputHandle,
    bindings: HashMap<String, Value>,
}

impl ExecContext {
    /// A context with empty input and discarded output.
    pub fn new() -> Self {
        Self {
            stdin: Arc::new(Mutex::new(io::empty())),
            stdout: Arc::new(Mutex::new(io::sink())),
            stderr: Arc::new(Mutex::new(io::sink())),
            bindings: HashMap::new(),
        }
    }

    /// Attach an input stream scripts read via `sys.stdin`.
    pub fn with_stdin(mut self, stdin: impl BufRead + Send + 'static) -> Self {
        self.stdin = Arc::new(Mutex::new(stdin));
        self
    }

    /// Attach an output stream scripts write via `sys.stdout` (and `print`).
    pub fn with_stdout(mut self, stdout: impl Write + Send + 'static) -> Self {
        self.stdout = Arc::new(Mutex::new(stdout));
        self
    }

    /// Attach an error stream scripts write via `sys.stderr`.
    pub fn with_stderr(mut self, stderr: impl Write + Send + 'static) -> Self {
        self.stderr = Arc::new(Mutex::new(stderr));
        self
    }

    /// Bind a variable the script can read by name.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// The bound variables for this call.
    pub fn bindings(&self) -> &HashMap<String, Value> {
        &self.bindings
    }

    pub(crate) fn stdin_handle(&self) -> InputHandle {
        Arc::clone(&self.stdin)
    }

    pub(crate) fn stdout_handle(&self) -> OutputHandle {
        Arc::clone(&self.stdout)
    }

    pub(crate) fn stderr_handle(&self) -> OutputHandle {
        Arc::clone(&self.stderr)
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Clonable in-memory output sink.
///
/// Every clone writes to the same buffer, so the caller hands one clone to
/// [`ExecContext::with_stdout`] and reads the capture back from another
/// after evaluation.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    /// An empty capture buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured bytes, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let buf = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Number of bytes captured so far.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// True if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
