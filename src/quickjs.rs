//! QuickJS as the bridge's script runtime.
//!
//! One `Runtime` + one full `Context` per worker, kept for the worker's whole
//! life. Commands run as global-scope scripts (indirect `eval`), so `var` and
//! function declarations persist between commands.
//!
//! Exceptions never cross into Rust: a small JS runner installed at startup
//! catches them and hands back a status-prefixed string.

use rquickjs::{Context, Function, Runtime};

use crate::error::ScriptError;
use crate::runtime::ScriptRuntime;

/// Global the runner is installed under.
const RUNNER: &str = "__script_bridge_run";

/// Returns `"1" + text` on completion, `"0" + message` on a throw.
const RUNNER_SOURCE: &str = r#"
(function (global) {
  function render(value) {
    if (typeof value === "string") return value;
    if (value === undefined) return "undefined";
    if (value === null) return "null";
    if (typeof value === "object") {
      try {
        var json = JSON.stringify(value);
        if (json !== undefined) return json;
      } catch (_) {}
    }
    return String(value);
  }

  function describe(error) {
    if (error !== null && typeof error === "object" && "message" in error) {
      return String(error.message);
    }
    try {
      return String(error);
    } catch (_) {
      return "uncaught exception";
    }
  }

  Object.defineProperty(global, "__script_bridge_run", {
    value: function (source) {
      try {
        return "1" + render((0, eval)(source));
      } catch (error) {
        return "0" + describe(error);
      }
    },
    enumerable: false,
  });
})(globalThis);
"#;

/// A persistent QuickJS interpreter.
pub struct QuickJsRuntime {
    // Dropped before the runtime it belongs to
    context: Context,
    _runtime: Runtime,
}

impl QuickJsRuntime {
    pub fn new() -> Result<Self, ScriptError> {
        let runtime = Runtime::new().map_err(|e| ScriptError::new(format!("QuickJS runtime: {}", e)))?;
        let context =
            Context::full(&runtime).map_err(|e| ScriptError::new(format!("QuickJS context: {}", e)))?;

        context
            .with(|ctx| ctx.eval::<(), _>(RUNNER_SOURCE))
            .map_err(|e| ScriptError::new(format!("QuickJS runner: {}", e)))?;

        Ok(Self {
            context,
            _runtime: runtime,
        })
    }
}

impl ScriptRuntime for QuickJsRuntime {
    fn eval(&mut self, input: &str) -> Result<String, ScriptError> {
        let tagged = self
            .context
            .with(|ctx| {
                let run: Function = ctx.globals().get(RUNNER)?;
                run.call::<_, String>((input,))
            })
            .map_err(|e| ScriptError::new(e.to_string()))?;

        if let Some(text) = tagged.strip_prefix('1') {
            Ok(text.to_string())
        } else if let Some(message) = tagged.strip_prefix('0') {
            Err(ScriptError::new(message))
        } else {
            Err(ScriptError::new(format!("malformed runner reply: {:?}", tagged)))
        }
    }
}
