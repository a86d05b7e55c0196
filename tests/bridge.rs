//! Bridge behaviour against a scripted in-test runtime.
//!
//! The runtime understands a tiny command language so every outcome is
//! deterministic:
//!
//! - `set_value(N)` / `get_value()` — one piece of persistent state
//! - `raise_error(MSG)` — fails with MSG
//! - `repeat(N)` — returns N `x` characters
//! - `a; b` — runs both, returns the last result
//!
//! Run with: cargo test --test bridge

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use script_bridge::{BridgeConfig, BridgeError, Interop, ScriptError, ScriptRuntime, factory};

// =============================================================================
// SCRIPTED RUNTIME
// =============================================================================

#[derive(Default)]
struct Scripted {
    value: i64,
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl Scripted {
    fn call(&mut self, command: &str) -> Result<String, ScriptError> {
        let command = command.trim();
        let (name, arg) = match command.split_once('(') {
            Some((name, rest)) => (name, rest.trim_end_matches(')')),
            None => (command, ""),
        };

        match name {
            "set_value" => {
                self.value = arg
                    .parse()
                    .map_err(|_| ScriptError::new(format!("not a number: {}", arg)))?;
                Ok(String::new())
            }
            "get_value" => Ok(self.value.to_string()),
            "raise_error" => Err(ScriptError::new(arg)),
            "repeat" => {
                let n: usize = arg.parse().map_err(|_| ScriptError::new("bad count"))?;
                Ok("x".repeat(n))
            }
            "sleep" => {
                let ms: u64 = arg.parse().map_err(|_| ScriptError::new("bad delay"))?;
                thread::sleep(Duration::from_millis(ms));
                Ok(String::new())
            }
            "echo" => Ok(arg.to_string()),
            other => Err(ScriptError::new(format!("unknown command: {}", other))),
        }
    }
}

impl ScriptRuntime for Scripted {
    fn eval(&mut self, input: &str) -> Result<String, ScriptError> {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("start {}", input));
        }

        let mut last = String::new();
        for command in input.split(';') {
            last = self.call(command)?;
        }

        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("end {}", input));
        }
        Ok(last)
    }
}

fn config(capacity: usize) -> BridgeConfig {
    BridgeConfig::new()
        .with_capacity(capacity)
        .with_thread_name("scripted-worker")
}

fn scripted(capacity: usize) -> Interop {
    Interop::start(config(capacity), factory(|| Ok(Scripted::default()))).unwrap()
}

// =============================================================================
// RESULTS AND ERRORS
// =============================================================================

#[test]
fn test_state_persists_across_calls() {
    let mut bridge = scripted(1024);
    assert_eq!(bridge.execute("set_value(5); get_value()").unwrap(), "5");
    assert_eq!(bridge.execute("get_value()").unwrap(), "5");
}

#[test]
fn test_runtime_error_text_is_verbatim() {
    let mut bridge = scripted(1024);
    match bridge.execute("raise_error(boom)") {
        Err(BridgeError::Script(message)) => assert_eq!(message, "boom"),
        other => panic!("expected script error, got {:?}", other),
    }
}

#[test]
fn test_failed_command_leaves_earlier_state() {
    let mut bridge = scripted(1024);
    bridge.execute("set_value(7)").unwrap();
    // Fails part-way: the set before the error already happened
    assert!(bridge.execute("set_value(8); raise_error(stop); set_value(9)").is_err());
    assert_eq!(bridge.execute("get_value()").unwrap(), "8");
}

#[test]
fn test_empty_result() {
    let mut bridge = scripted(1024);
    assert_eq!(bridge.execute("set_value(1)").unwrap(), "");
}

#[test]
fn test_unicode_result() {
    let mut bridge = scripted(1024);
    assert_eq!(bridge.execute("echo(grüße, 世界)").unwrap(), "grüße, 世界");
}

// =============================================================================
// SIZE LIMIT
// =============================================================================

#[test]
fn test_result_too_large() {
    let mut bridge = scripted(1000);
    assert!(matches!(
        bridge.execute("repeat(1001)"),
        Err(BridgeError::PayloadTooLarge { capacity: 1000 })
    ));

    // The slot is intact for the next command
    assert_eq!(bridge.execute("repeat(1000)").unwrap().len(), 1000);
    assert_eq!(bridge.execute("echo(ok)").unwrap(), "ok");
}

#[test]
fn test_error_too_large() {
    let mut bridge = scripted(64);
    let long = "e".repeat(65);
    assert!(matches!(
        bridge.execute(&format!("raise_error({})", long)),
        Err(BridgeError::PayloadTooLarge { capacity: 64 })
    ));
}

// =============================================================================
// ORDERING
// =============================================================================

#[test]
fn test_commands_never_overlap() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let worker_log = log.clone();
    let mut bridge = Interop::start(
        config(1024),
        factory(move || {
            Ok(Scripted {
                log: Some(worker_log),
                ..Scripted::default()
            })
        }),
    )
    .unwrap();

    bridge.execute("sleep(30)").unwrap();
    bridge.execute("echo(second)").unwrap();

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            "start sleep(30)".to_string(),
            "end sleep(30)".to_string(),
            "start echo(second)".to_string(),
            "end echo(second)".to_string(),
        ]
    );
}

#[test]
fn test_many_sequential_calls() {
    let mut bridge = scripted(1024);
    for i in 0..1_000 {
        bridge.execute(&format!("set_value({})", i)).unwrap();
        assert_eq!(bridge.execute("get_value()").unwrap(), i.to_string());
    }
}

#[test]
fn test_bridge_moves_to_another_thread() {
    let mut bridge = scripted(1024);
    bridge.execute("set_value(3)").unwrap();

    let handle = thread::spawn(move || bridge.execute("get_value()").unwrap());
    assert_eq!(handle.join().unwrap(), "3");
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[test]
fn test_execute_after_dispose_fails_fast() {
    let mut bridge = scripted(1024);
    bridge.execute("echo(hi)").unwrap();
    bridge.dispose();
    assert!(matches!(bridge.execute("echo(hi)"), Err(BridgeError::Disposed)));
}

#[test]
fn test_runtime_dropped_on_dispose() {
    struct Tracked(Arc<Mutex<bool>>);

    impl ScriptRuntime for Tracked {
        fn eval(&mut self, _input: &str) -> Result<String, ScriptError> {
            Ok("alive".to_string())
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            *self.0.lock().unwrap() = true;
        }
    }

    let dropped = Arc::new(Mutex::new(false));
    let flag = dropped.clone();
    let mut bridge = Interop::start(config(64), factory(move || Ok(Tracked(flag)))).unwrap();
    assert_eq!(bridge.execute("anything").unwrap(), "alive");

    // Drop disposes and waits for the worker
    drop(bridge);
    assert!(*dropped.lock().unwrap());
}

#[test]
fn test_startup_failure_reported_per_call() {
    let mut bridge = Interop::start(
        config(256),
        factory(|| Err::<Scripted, _>(ScriptError::new("engine missing"))),
    )
    .unwrap();

    for _ in 0..2 {
        match bridge.execute("get_value()") {
            Err(BridgeError::Script(message)) => {
                assert_eq!(message, "script runtime failed to start: engine missing")
            }
            other => panic!("expected startup failure, got {:?}", other),
        }
    }
}

#[test]
fn test_prelude_runs_first() {
    let config = config(256).with_prelude("set_value(42)");
    let mut bridge = Interop::start(config, factory(|| Ok(Scripted::default()))).unwrap();
    assert_eq!(bridge.execute("get_value()").unwrap(), "42");
}

#[test]
fn test_panicking_runtime_does_not_hang() {
    struct Fragile;

    impl ScriptRuntime for Fragile {
        fn eval(&mut self, input: &str) -> Result<String, ScriptError> {
            if input == "crash" {
                panic!("fragile runtime crashed");
            }
            Ok(input.to_string())
        }
    }

    let mut bridge = Interop::start(config(256), factory(|| Ok(Fragile))).unwrap();
    assert_eq!(bridge.execute("fine").unwrap(), "fine");

    let err = bridge.execute("crash").unwrap_err();
    assert_eq!(err.to_string(), "script runtime panicked: fragile runtime crashed");
    // Later calls keep failing instead of blocking
    assert!(bridge.execute("fine").is_err());
}

#[test]
fn test_panicking_destructor_does_not_hang() {
    /// Panics on `crash`, and again when dropped outside an unwind.
    struct Shattering;

    impl ScriptRuntime for Shattering {
        fn eval(&mut self, input: &str) -> Result<String, ScriptError> {
            if input == "crash" {
                panic!("shattered in eval");
            }
            Ok(input.to_string())
        }
    }

    impl Drop for Shattering {
        fn drop(&mut self) {
            if !thread::panicking() {
                panic!("shattered in drop");
            }
        }
    }

    let mut bridge = Interop::start(config(256), factory(|| Ok(Shattering))).unwrap();
    match bridge.execute("crash") {
        Err(BridgeError::Script(message)) => {
            assert_eq!(message, "script runtime panicked: shattered in eval")
        }
        other => panic!("expected panic failure, got {:?}", other),
    }
    assert!(bridge.execute("fine").is_err());
    drop(bridge);

    // Same runtime, released on dispose instead
    let mut bridge = Interop::start(config(256), factory(|| Ok(Shattering))).unwrap();
    assert_eq!(bridge.execute("fine").unwrap(), "fine");
    bridge.dispose();
    drop(bridge);
}

#[test]
fn test_runtime_error_resembling_size_failure_is_verbatim() {
    let mut bridge = scripted(1024);
    match bridge.execute("raise_error(payload too large for shared buffer)") {
        Err(BridgeError::Script(message)) => {
            assert_eq!(message, "payload too large for shared buffer")
        }
        other => panic!("expected script error, got {:?}", other),
    }
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fitting_text_returned_verbatim(text in "[a-zA-Z0-9 äöü€,.!]{0,80}") {
        let mut bridge = scripted(64);
        let result = bridge.execute(&format!("echo({})", text));
        if text.len() <= 64 {
            prop_assert_eq!(result.unwrap(), text);
        } else {
            let too_large = matches!(result, Err(BridgeError::PayloadTooLarge { capacity: 64 }));
            prop_assert!(too_large);
        }
    }
}
