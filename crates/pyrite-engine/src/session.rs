//! Interpreter sessions.
//!
//! A [`PySession`] is one RustPython interpreter plus one persistent global
//! scope. Interpreter objects are not `Send`, so the interpreter lives on a
//! dedicated thread and the session handle talks to it over a channel; the
//! handle itself is cheaply clonable and thread-safe. The thread exits when
//! the session is closed or the last handle is dropped, which is what frees
//! the interpreter's memory.
//!
//! The session exposes variable clearing ([`PySession::clear_locals`]) and
//! disposal ([`PySession::close`]) as part of its public contract, so no
//! privileged access into the interpreter internals is ever needed.

use std::collections::HashMap;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rustpython_vm::{
    compiler::{CompileError, Mode},
    function::FuncArgs,
    scope::Scope,
    AsObject, Interpreter, PyObjectRef, PyResult, Settings, VirtualMachine,
};
use tracing::debug;

use pyrite_types::{ScriptError, ScriptResult, Value};

use crate::cleanup::ReservedNames;
use crate::context::{ExecContext, InputHandle, OutputHandle};
use crate::convert;

/// Configuration for a new interpreter session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Register the native standard library modules (math, _json, ...)
    /// so scripts can import them.
    pub stdlib: bool,
    /// Name compiled code reports in tracebacks.
    pub source_name: String,
    /// Extra entries for the interpreter's module search path, e.g. a host
    /// Python installation providing pure-Python stdlib modules.
    pub path_list: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stdlib: true,
            source_name: "<script>".to_owned(),
            path_list: Vec::new(),
        }
    }
}

/// Handle to one interpreter session.
///
/// Clones share the same interpreter. Operations on a closed session fail
/// with [`ScriptError::Closed`], except [`PySession::clear_locals`] which
/// is defined as a no-op once the session is gone.
#[derive(Clone)]
pub struct PySession {
    tx: Sender<SessionMsg>,
}

enum SessionMsg {
    Exec {
        source: String,
        reply: Sender<ScriptResult<()>>,
    },
    Eval {
        source: String,
        reply: Sender<ScriptResult<Value>>,
    },
    Attach {
        stdin: InputHandle,
        stdout: OutputHandle,
        stderr: OutputHandle,
        bindings: HashMap<String, Value>,
        reply: Sender<ScriptResult<()>>,
    },
    GetVar {
        name: String,
        reply: Sender<ScriptResult<Option<Value>>>,
    },
    SetVar {
        name: String,
        value: Value,
        reply: Sender<ScriptResult<()>>,
    },
    VarNames {
        reply: Sender<ScriptResult<Vec<String>>>,
    },
    RemoveVar {
        name: String,
        reply: Sender<ScriptResult<()>>,
    },
    ClearLocals {
        reserved: ReservedNames,
        reply: Sender<ScriptResult<usize>>,
    },
    Close {
        reply: Sender<()>,
    },
}

impl PySession {
    /// Spawn a fresh interpreter on its own thread.
    pub fn new(config: &SessionConfig) -> ScriptResult<Self> {
        let config = config.clone();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("pyrite-session".to_owned())
            .spawn(move || session_main(config, rx))
            .map_err(ScriptError::Stream)?;
        Ok(Self { tx })
    }

    /// Execute statements for their side effects.
    pub fn exec(&self, source: &str) -> ScriptResult<()> {
        self.request(|reply| SessionMsg::Exec {
            source: source.to_owned(),
            reply,
        })
    }

    /// Evaluate an expression and decode its value.
    pub fn eval(&self, source: &str) -> ScriptResult<Value> {
        self.request(|reply| SessionMsg::Eval {
            source: source.to_owned(),
            reply,
        })
    }

    /// Install a context's streams into `sys` and copy its bindings into
    /// the scope. Streams stay attached until the next `attach`.
    pub fn attach(&self, ctx: &ExecContext) -> ScriptResult<()> {
        self.request(|reply| SessionMsg::Attach {
            stdin: ctx.stdin_handle(),
            stdout: ctx.stdout_handle(),
            stderr: ctx.stderr_handle(),
            bindings: ctx.bindings().clone(),
            reply,
        })
    }

    /// Read a scope variable. `Ok(None)` means the name is unbound.
    pub fn get_var(&self, name: &str) -> ScriptResult<Option<Value>> {
        self.request(|reply| SessionMsg::GetVar {
            name: name.to_owned(),
            reply,
        })
    }

    /// Bind a scope variable.
    pub fn set_var(&self, name: &str, value: Value) -> ScriptResult<()> {
        self.request(|reply| SessionMsg::SetVar {
            name: name.to_owned(),
            value,
            reply,
        })
    }

    /// All variable names currently bound in the scope.
    pub fn var_names(&self) -> ScriptResult<Vec<String>> {
        self.request(|reply| SessionMsg::VarNames { reply })
    }

    /// Remove one variable; removing an unbound name is not an error.
    pub fn remove_var(&self, name: &str) -> ScriptResult<()> {
        self.request(|reply| SessionMsg::RemoveVar {
            name: name.to_owned(),
            reply,
        })
    }

    /// Remove every scope variable whose name is not reserved, returning
    /// how many were removed. No-op (`Ok(0)`) on a closed session.
    pub fn clear_locals(&self, reserved: &ReservedNames) -> ScriptResult<usize> {
        let (reply, rx) = mpsc::channel();
        let msg = SessionMsg::ClearLocals {
            reserved: reserved.clone(),
            reply,
        };
        if self.tx.send(msg).is_err() {
            return Ok(0);
        }
        match rx.recv() {
            Ok(result) => result,
            Err(_) => Ok(0),
        }
    }

    /// Dispose the interpreter. Idempotent; later operations fail with
    /// [`ScriptError::Closed`].
    pub fn close(&self) {
        let (reply, rx) = mpsc::channel();
        if self.tx.send(SessionMsg::Close { reply }).is_ok() {
            // Wait for the interpreter thread to acknowledge so that
            // operations issued after close() deterministically fail.
            let _ = rx.recv();
        }
    }

    fn request<T>(&self, build: impl FnOnce(Sender<ScriptResult<T>>) -> SessionMsg) -> ScriptResult<T> {
        let (reply, rx) = mpsc::channel();
        self.tx.send(build(reply)).map_err(|_| ScriptError::Closed)?;
        rx.recv().map_err(|_| ScriptError::Closed)?
    }
}

impl std::fmt::Debug for PySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PySession").finish_non_exhaustive()
    }
}

// ── Interpreter thread ─────────────────────────────────────────────────────

fn session_main(config: SessionConfig, rx: Receiver<SessionMsg>) {
    let interp = build_interpreter(&config);
    let scope = interp.enter(|vm| {
        let scope = vm.new_scope_with_builtins();
        let _ = scope
            .globals
            .set_item("__name__", vm.ctx.new_str("__main__").into(), vm);
        scope
    });
    debug!("interpreter session started");

    while let Ok(msg) = rx.recv() {
        match msg {
            SessionMsg::Exec { source, reply } => {
                let result =
                    interp.enter(|vm| exec_source(vm, &scope, &source, &config.source_name));
                let _ = reply.send(result);
            }
            SessionMsg::Eval { source, reply } => {
                let result =
                    interp.enter(|vm| eval_source(vm, &scope, &source, &config.source_name));
                let _ = reply.send(result);
            }
            SessionMsg::Attach {
                stdin,
                stdout,
                stderr,
                bindings,
                reply,
            } => {
                let result = interp.enter(|vm| {
                    install_streams(vm, stdin, stdout, stderr);
                    apply_bindings(vm, &scope, &bindings)
                });
                let _ = reply.send(result);
            }
            SessionMsg::GetVar { name, reply } => {
                let result = interp.enter(|vm| get_var(vm, &scope, &name));
                let _ = reply.send(result);
            }
            SessionMsg::SetVar { name, value, reply } => {
                let result = interp.enter(|vm| set_var(vm, &scope, &name, &value));
                let _ = reply.send(result);
            }
            SessionMsg::VarNames { reply } => {
                let result = interp.enter(|vm| var_names(vm, &scope));
                let _ = reply.send(result);
            }
            SessionMsg::RemoveVar { name, reply } => {
                let result = interp.enter(|vm| remove_var(vm, &scope, &name));
                let _ = reply.send(result);
            }
            SessionMsg::ClearLocals { reserved, reply } => {
                let result = interp.enter(|vm| clear_locals(vm, &scope, &reserved));
                let _ = reply.send(result);
            }
            SessionMsg::Close { reply } => {
                let _ = reply.send(());
                break;
            }
        }
    }
    debug!("interpreter session stopped");
}

fn build_interpreter(config: &SessionConfig) -> Interpreter {
    let mut settings = Settings::default();
    for path in &config.path_list {
        settings.path_list.push(path.clone());
    }
    let with_stdlib = config.stdlib;
    Interpreter::with_init(settings, move |vm| {
        if with_stdlib {
            vm.add_native_modules(rustpython_stdlib::get_module_inits());
        }
    })
}

fn exec_source(
    vm: &VirtualMachine,
    scope: &Scope,
    source: &str,
    source_name: &str,
) -> ScriptResult<()> {
    let code = vm
        .compile(source, Mode::Exec, source_name.to_owned())
        .map_err(syntax_error)?;
    vm.run_code_obj(code, scope.clone())
        .map_err(|exc| runtime_error(vm, exc))?;
    Ok(())
}

fn eval_source(
    vm: &VirtualMachine,
    scope: &Scope,
    source: &str,
    source_name: &str,
) -> ScriptResult<Value> {
    let code = vm
        .compile(source, Mode::Eval, source_name.to_owned())
        .map_err(syntax_error)?;
    let obj = vm
        .run_code_obj(code, scope.clone())
        .map_err(|exc| runtime_error(vm, exc))?;
    convert::to_value(vm, &obj).map_err(|exc| runtime_error(vm, exc))
}

fn apply_bindings(
    vm: &VirtualMachine,
    scope: &Scope,
    bindings: &HashMap<String, Value>,
) -> ScriptResult<()> {
    for (name, value) in bindings {
        let obj = convert::to_py(vm, value).map_err(|exc| runtime_error(vm, exc))?;
        scope
            .globals
            .set_item(name.as_str(), obj, vm)
            .map_err(|exc| runtime_error(vm, exc))?;
    }
    Ok(())
}

fn get_var(vm: &VirtualMachine, scope: &Scope, name: &str) -> ScriptResult<Option<Value>> {
    let globals: PyObjectRef = scope.globals.clone().into();
    // Sentinel distinguishes "unbound" from "bound to None"; compared by
    // identity, so no real value can collide with it.
    let missing = vm.ctx.new_str("<pyrite-unbound>");
    let found = vm
        .call_method(&globals, "get", (vm.ctx.new_str(name), missing.clone()))
        .map_err(|exc| runtime_error(vm, exc))?;
    if found.is(&missing) {
        return Ok(None);
    }
    convert::to_value(vm, &found)
        .map(Some)
        .map_err(|exc| runtime_error(vm, exc))
}

fn set_var(vm: &VirtualMachine, scope: &Scope, name: &str, value: &Value) -> ScriptResult<()> {
    let obj = convert::to_py(vm, value).map_err(|exc| runtime_error(vm, exc))?;
    scope
        .globals
        .set_item(name, obj, vm)
        .map_err(|exc| runtime_error(vm, exc))
}

fn var_names(vm: &VirtualMachine, scope: &Scope) -> ScriptResult<Vec<String>> {
    let globals: PyObjectRef = scope.globals.clone().into();
    let keys = vm
        .call_method(&globals, "keys", ())
        .map_err(|exc| runtime_error(vm, exc))?;
    let keys = vm
        .extract_elements_with(&keys, Ok)
        .map_err(|exc| runtime_error(vm, exc))?;
    let mut names = Vec::with_capacity(keys.len());
    for key in &keys {
        let name = key
            .str(vm)
            .map_err(|exc| runtime_error(vm, exc))?
            .as_str()
            .to_owned();
        names.push(name);
    }
    Ok(names)
}

fn remove_var(vm: &VirtualMachine, scope: &Scope, name: &str) -> ScriptResult<()> {
    let globals: PyObjectRef = scope.globals.clone().into();
    // pop with a default so removing an unbound name is not an error
    vm.call_method(&globals, "pop", (vm.ctx.new_str(name), vm.ctx.none()))
        .map_err(|exc| runtime_error(vm, exc))?;
    Ok(())
}

fn clear_locals(vm: &VirtualMachine, scope: &Scope, reserved: &ReservedNames) -> ScriptResult<usize> {
    let names = var_names(vm, scope)?;
    let mut removed = 0;
    for name in names {
        if reserved.contains(&name) {
            continue;
        }
        remove_var(vm, scope, &name)?;
        removed += 1;
    }
    Ok(removed)
}

// ── Stream plumbing ────────────────────────────────────────────────────────

/// Replace `sys.stdin`/`sys.stdout`/`sys.stderr` with objects backed by the
/// context's stream handles. `print()` goes through `sys.stdout.write`, so
/// this captures all script output.
fn install_streams(
    vm: &VirtualMachine,
    stdin: InputHandle,
    stdout: OutputHandle,
    stderr: OutputHandle,
) {
    let stdin_obj = reader_module(vm, stdin);
    let stdout_obj = writer_module(vm, "<stdout>", stdout);
    let stderr_obj = writer_module(vm, "<stderr>", stderr);
    let _ = vm.sys_module.set_attr("stdin", stdin_obj, vm);
    let _ = vm.sys_module.set_attr("stdout", stdout_obj, vm);
    let _ = vm.sys_module.set_attr("stderr", stderr_obj, vm);
}

/// Build a minimal file-like object with `write(s)` and `flush()`.
fn writer_module(vm: &VirtualMachine, name: &str, handle: OutputHandle) -> PyObjectRef {
    let write_handle = handle.clone();
    let write_fn = vm.new_function(
        "write",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let data = args
                .args
                .first()
                .and_then(|obj| obj.str(vm).ok())
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default();
            let mut sink = write_handle
                .lock()
                .map_err(|_| vm.new_os_error("output stream poisoned".to_owned()))?;
            sink.write_all(data.as_bytes())
                .map_err(|err| vm.new_os_error(err.to_string()))?;
            Ok(vm.ctx.new_int(data.len()).into())
        },
    );

    let flush_handle = handle;
    let flush_fn = vm.new_function(
        "flush",
        move |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let mut sink = flush_handle
                .lock()
                .map_err(|_| vm.new_os_error("output stream poisoned".to_owned()))?;
            sink.flush().map_err(|err| vm.new_os_error(err.to_string()))?;
            Ok(vm.ctx.none())
        },
    );

    let ns = vm.new_module(name, vm.ctx.new_dict(), None);
    let _ = ns.set_attr("write", write_fn, vm);
    let _ = ns.set_attr("flush", flush_fn, vm);
    let _ = ns.set_attr("closed", vm.ctx.new_bool(false), vm);
    let _ = ns.set_attr("encoding", vm.ctx.new_str("utf-8"), vm);
    ns.into()
}

/// Build a minimal file-like object with `readline()` and `read([size])`.
/// `readline` returns an empty string at end of stream, matching the
/// file-object convention.
fn reader_module(vm: &VirtualMachine, handle: InputHandle) -> PyObjectRef {
    let readline_handle = handle.clone();
    let readline_fn = vm.new_function(
        "readline",
        move |_args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            let mut source = readline_handle
                .lock()
                .map_err(|_| vm.new_os_error("input stream poisoned".to_owned()))?;
            let mut line = String::new();
            source
                .read_line(&mut line)
                .map_err(|err| vm.new_os_error(err.to_string()))?;
            Ok(vm.ctx.new_str(line).into())
        },
    );

    let read_handle = handle;
    let read_fn = vm.new_function(
        "read",
        move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<PyObjectRef> {
            use rustpython_vm::TryFromObject;
            let size = args
                .args
                .first()
                .and_then(|obj| i64::try_from_object(vm, obj.clone()).ok())
                .filter(|n| *n >= 0);
            let mut source = read_handle
                .lock()
                .map_err(|_| vm.new_os_error("input stream poisoned".to_owned()))?;
            let mut data = String::new();
            let result = match size {
                Some(n) => (&mut *source).take(n as u64).read_to_string(&mut data),
                None => source.read_to_string(&mut data),
            };
            result.map_err(|err| vm.new_os_error(err.to_string()))?;
            Ok(vm.ctx.new_str(data).into())
        },
    );

    let ns = vm.new_module("<stdin>", vm.ctx.new_dict(), None);
    let _ = ns.set_attr("readline", readline_fn, vm);
    let _ = ns.set_attr("read", read_fn, vm);
    let _ = ns.set_attr("closed", vm.ctx.new_bool(false), vm);
    let _ = ns.set_attr("encoding", vm.ctx.new_str("utf-8"), vm);
    ns.into()
}

// ── Error translation ──────────────────────────────────────────────────────

fn syntax_error(err: CompileError) -> ScriptError {
    let (line, column) = err.python_location();
    ScriptError::Syntax {
        message: err.to_string(),
        line: line as u32,
        column: column as u32,
    }
}

fn runtime_error(
    vm: &VirtualMachine,
    exc: rustpython_vm::builtins::PyBaseExceptionRef,
) -> ScriptError {
    let message = exc
        .as_object()
        .str(vm)
        .map(|s| s.as_str().to_owned())
        .unwrap_or_else(|_| "unknown interpreter error".to_owned());
    // String implements the interpreter's py_io::Write, so the formatted
    // traceback can be captured directly.
    let mut traceback = String::new();
    let _ = vm.write_exception(&mut traceback, &exc);
    ScriptError::Runtime { message, traceback }
}
