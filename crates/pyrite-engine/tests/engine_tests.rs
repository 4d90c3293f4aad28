//! End-to-end evaluation tests against a live interpreter.

use std::io::{self, Cursor, Read};

use pyrite_engine::{CaptureBuffer, ExecContext, PyEngine, ScriptError, SessionConfig, Value};

fn engine() -> PyEngine {
    PyEngine::new().expect("engine should start")
}

#[test]
fn expression_returns_its_value() {
    let result = engine().eval("1 + 2", &ExecContext::new()).unwrap();
    assert_eq!(result, Value::Int(3));
}

#[test]
fn lone_assignment_returns_none_and_binds() {
    let engine = engine();
    let result = engine.eval("a = 4 + 5", &ExecContext::new()).unwrap();
    assert_eq!(result, Value::None);
    assert_eq!(engine.session().get_var("a").unwrap(), Some(Value::Int(9)));
}

#[test]
fn statements_then_final_expression() {
    let result = engine()
        .eval("x = 2\ny = 3\nx * y", &ExecContext::new())
        .unwrap();
    assert_eq!(result, Value::Int(6));
}

#[test]
fn trailing_newline_returns_none() {
    let engine = engine();
    let result = engine.eval("x = 1\n", &ExecContext::new()).unwrap();
    assert_eq!(result, Value::None);
    assert_eq!(engine.session().get_var("x").unwrap(), Some(Value::Int(1)));
}

#[test]
fn host_set_variable_is_visible_to_scripts() {
    let engine = engine();
    engine.session().set_var("hello", Value::Int(17)).unwrap();
    let result = engine.eval("hello", &ExecContext::new()).unwrap();
    assert_eq!(result, Value::Int(17));
    assert_eq!(
        engine.session().get_var("hello").unwrap(),
        Some(Value::Int(17))
    );
}

#[test]
fn context_bindings_reach_the_script() {
    let ctx = ExecContext::new().bind("n", 21i64);
    let result = engine().eval("n * 2", &ctx).unwrap();
    assert_eq!(result, Value::Int(42));
}

#[test]
fn script_reads_stdin_and_writes_stdout() {
    let capture = CaptureBuffer::new();
    let ctx = ExecContext::new()
        .with_stdin(Cursor::new("5\n"))
        .with_stdout(capture.clone());
    let script = "import sys\nline = sys.stdin.readline().strip()\nsys.stdout.write(line)";
    engine().eval(script, &ctx).unwrap();
    assert_eq!(capture.contents(), "5");
}

#[test]
fn print_goes_to_the_attached_stdout() {
    let capture = CaptureBuffer::new();
    let ctx = ExecContext::new().with_stdout(capture.clone());
    engine().eval("print('hi')", &ctx).unwrap();
    assert_eq!(capture.contents(), "hi\n");
}

#[test]
fn runtime_error_carries_the_exception_message() {
    let err = engine().eval("1 / 0", &ExecContext::new()).unwrap_err();
    match err {
        ScriptError::Runtime { message, .. } => {
            assert!(message.contains("division"), "unexpected message: {message}")
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn syntax_error_in_statement_block_is_reported() {
    let err = engine()
        .eval("def broken(:\n    pass\n1", &ExecContext::new())
        .unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { .. }), "got {err:?}");
}

#[test]
fn values_survive_across_evaluations() {
    let engine = engine();
    let ctx = ExecContext::new();
    engine.eval("counter = 1", &ctx).unwrap();
    engine.eval("counter = counter + 1", &ctx).unwrap();
    assert_eq!(engine.eval("counter", &ctx).unwrap(), Value::Int(2));
}

#[test]
fn type_introspection_works() {
    let result = engine()
        .eval("a = 10\ntype(a).__name__", &ExecContext::new())
        .unwrap();
    assert_eq!(result, Value::Str("int".into()));
}

#[test]
fn native_stdlib_modules_are_importable() {
    let result = engine()
        .eval("import math\nmath.floor(2.5)", &ExecContext::new())
        .unwrap();
    assert_eq!(result, Value::Int(2));
}

#[test]
fn float_and_bool_results_decode() {
    let engine = engine();
    let ctx = ExecContext::new();
    assert_eq!(engine.eval("1.5 * 2", &ctx).unwrap(), Value::Float(3.0));
    assert_eq!(engine.eval("2 > 1", &ctx).unwrap(), Value::Bool(true));
}

#[test]
fn list_results_decode_to_json() {
    let result = engine().eval("[1, 'two', 3.0]", &ExecContext::new()).unwrap();
    match result {
        Value::Json(json) => assert_eq!(json, serde_json::json!([1, "two", 3.0])),
        other => panic!("expected json value, got {other:?}"),
    }
}

#[test]
fn eval_reader_consumes_the_whole_stream() {
    let result = engine()
        .eval_reader(Cursor::new("40 + 2"), &ExecContext::new())
        .unwrap();
    assert_eq!(result, Value::Int(42));
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }
}

#[test]
fn eval_reader_surfaces_stream_errors() {
    let err = engine()
        .eval_reader(FailingReader, &ExecContext::new())
        .unwrap_err();
    assert!(matches!(err, ScriptError::Stream(_)), "got {err:?}");
}

#[test]
fn operations_after_close_fail() {
    let engine = engine();
    engine.session().close();
    let err = engine.session().get_var("x").unwrap_err();
    assert!(matches!(err, ScriptError::Closed), "got {err:?}");
}

#[test]
fn var_names_and_remove_var() {
    let engine = engine();
    engine.session().set_var("gone", Value::Int(1)).unwrap();
    assert!(engine.session().var_names().unwrap().contains(&"gone".to_owned()));
    engine.session().remove_var("gone").unwrap();
    assert!(!engine.session().var_names().unwrap().contains(&"gone".to_owned()));
    // removing an unbound name is fine
    engine.session().remove_var("never_bound").unwrap();
}

#[test]
fn custom_source_name_appears_in_tracebacks() {
    let config = SessionConfig {
        source_name: "<job-7>".to_owned(),
        ..SessionConfig::default()
    };
    let engine = PyEngine::with_config(&config).unwrap();
    let err = engine
        .eval("raise ValueError('boom')", &ExecContext::new())
        .unwrap_err();
    match err {
        ScriptError::Runtime { traceback, .. } => {
            assert!(traceback.contains("<job-7>"), "traceback: {traceback}")
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}
