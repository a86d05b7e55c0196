//! The external script runtime, as seen by the worker.
//!
//! A runtime is constructed on the worker thread, evaluates one command at a
//! time, and is torn down by dropping it. It never has to be `Send`: only its
//! factory crosses threads.

use crate::error::ScriptError;

/// A stateful, single-threaded script interpreter.
///
/// State left behind by one `eval` (globals, definitions, the host
/// application's object graph) must be visible to the next.
pub trait ScriptRuntime {
    /// Evaluate one command and render its result as text.
    fn eval(&mut self, input: &str) -> Result<String, ScriptError>;
}

impl<R: ScriptRuntime + ?Sized> ScriptRuntime for Box<R> {
    fn eval(&mut self, input: &str) -> Result<String, ScriptError> {
        (**self).eval(input)
    }
}

/// Builds the runtime on the worker thread.
pub type RuntimeFactory = Box<dyn FnOnce() -> Result<Box<dyn ScriptRuntime>, ScriptError> + Send>;

/// Box a constructor closure into a [`RuntimeFactory`].
pub fn factory<R, F>(build: F) -> RuntimeFactory
where
    R: ScriptRuntime + 'static,
    F: FnOnce() -> Result<R, ScriptError> + Send + 'static,
{
    Box::new(move || build().map(|runtime| Box::new(runtime) as Box<dyn ScriptRuntime>))
}
