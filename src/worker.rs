//! Worker thread — sole owner of the script runtime.
//!
//! ```text
//! spawn ─▶ build runtime (+ prelude) ─▶ recv ─┬─ Execute ─▶ eval ─▶ publish ─┐
//!                                             │                              │
//!                                             │◀─────────────────────────────┘
//!                                             └─ Dispose / closed ─▶ drop runtime, exit
//! ```
//!
//! Requests are handled strictly one at a time in arrival order. Every
//! `Execute` ends in exactly one `publish`, whatever the runtime does:
//! errors and panics become failure text, oversized text becomes the size
//! sentinel. A request that never gets published would leave the host parked
//! on the signal word forever.
//!
//! Runtime destructors count as runtime code: dropping a runtime, after a
//! panic or on dispose, is contained the same way `eval` is. Should the
//! worker still unwind with a command in flight, [`InFlight`] publishes a
//! failure on the way out and the closed queue turns later calls into
//! `WorkerGone`.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::ScriptError;
use crate::protocol::{PANICKED_PREFIX, PAYLOAD_TOO_LARGE, Request, STARTUP_FAILED_PREFIX, Status};
use crate::runtime::{RuntimeFactory, ScriptRuntime};
use crate::shared_channel::{FLAG_OVERSIZED, SharedChannel};

// =============================================================================
// RUNTIME SLOT
// =============================================================================

/// The worker's runtime, or the failure text every command gets instead.
enum Slot {
    Ready(Box<dyn ScriptRuntime>),
    Failed(String),
}

impl Slot {
    fn start(factory: RuntimeFactory, prelude: Option<&str>) -> Self {
        let built = panic::catch_unwind(AssertUnwindSafe(move || -> Result<Box<dyn ScriptRuntime>, ScriptError> {
            let mut runtime = factory()?;
            if let Some(source) = prelude {
                runtime.eval(source)?;
            }
            Ok(runtime)
        }));

        match built {
            Ok(Ok(runtime)) => {
                tracing::info!("script runtime started");
                Slot::Ready(runtime)
            }
            Ok(Err(e)) => {
                tracing::error!("script runtime failed to start: {}", e);
                Slot::Failed(format!("{}{}", STARTUP_FAILED_PREFIX, e))
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!("script runtime panicked during startup: {}", reason);
                Slot::Failed(format!("{}{}", STARTUP_FAILED_PREFIX, reason))
            }
        }
    }

    /// Run one command. Never unwinds.
    fn execute(&mut self, input: &str) -> (Status, String) {
        let runtime = match self {
            Slot::Ready(runtime) => runtime,
            Slot::Failed(message) => return (Status::Failure, message.clone()),
        };

        match panic::catch_unwind(AssertUnwindSafe(|| runtime.eval(input))) {
            Ok(Ok(text)) => (Status::Success, text),
            Ok(Err(e)) => (Status::Failure, e.0),
            Err(payload) => {
                let message = format!("{}{}", PANICKED_PREFIX, panic_message(payload.as_ref()));
                tracing::error!("{}; runtime discarded", message);
                forget_payload(payload);
                // A runtime that unwound mid-command is not trusted again
                let old = std::mem::replace(self, Slot::Failed(message.clone()));
                drop_contained(old);
                (Status::Failure, message)
            }
        }
    }
}

/// Drop a slot without letting a panicking runtime destructor unwind the
/// worker.
fn drop_contained(slot: Slot) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(slot))) {
        tracing::error!("script runtime panicked while being released: {}", panic_message(payload.as_ref()));
        forget_payload(payload);
    }
}

/// Panic payloads run arbitrary destructors too; leaking one is harmless.
fn forget_payload(payload: Box<dyn Any + Send>) {
    std::mem::forget(payload);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Publish `text`, or the size sentinel if it does not fit.
fn publish_checked(channel: &SharedChannel, status: Status, text: &str) {
    let capacity = channel.capacity();
    if text.len() <= capacity {
        channel.publish(status, text.as_bytes());
        return;
    }

    tracing::warn!(
        "{} byte {} exceeds {} byte buffer",
        text.len(),
        if status == Status::Success { "result" } else { "error" },
        capacity
    );
    let sentinel = PAYLOAD_TOO_LARGE.as_bytes();
    channel.publish_flagged(
        Status::Failure,
        &sentinel[..sentinel.len().min(capacity)],
        FLAG_OVERSIZED,
    );
}

/// Armed while a command is between `recv` and `publish`.
///
/// If the worker unwinds in that window the host is already parked on the
/// signal word; dropping the guard publishes a failure so it wakes up.
struct InFlight<'a> {
    channel: &'a SharedChannel,
    published: bool,
}

impl<'a> InFlight<'a> {
    fn new(channel: &'a SharedChannel) -> Self {
        Self {
            channel,
            published: false,
        }
    }

    fn publish(mut self, status: Status, text: &str) {
        publish_checked(self.channel, status, text);
        self.published = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.published && thread::panicking() {
            let message = format!("{}worker thread unwound mid-command", PANICKED_PREFIX);
            publish_checked(self.channel, Status::Failure, &message);
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// Handle to the worker thread.
pub struct Worker {
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread.
    ///
    /// - `name`: thread name
    /// - `channel`: result region shared with the host
    /// - `factory`: builds the runtime, called on the worker thread
    /// - `prelude`: script run once after the runtime is built
    /// - `rx`: request queue
    pub fn spawn(
        name: &str,
        channel: Arc<SharedChannel>,
        factory: RuntimeFactory,
        prelude: Option<String>,
        rx: Receiver<Request>,
    ) -> io::Result<Self> {
        let span_name = name.to_string();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let span = tracing::info_span!("worker", thread = %span_name);
            let _enter = span.enter();
            Self::run(&channel, factory, prelude.as_deref(), rx);
        })?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    fn run(channel: &SharedChannel, factory: RuntimeFactory, prelude: Option<&str>, rx: Receiver<Request>) {
        let mut slot = Slot::start(factory, prelude);

        // A closed queue means the host side is gone; treat it as Dispose
        while let Ok(request) = rx.recv() {
            match request {
                Request::Execute { input } => {
                    let guard = InFlight::new(channel);
                    let start = Instant::now();
                    let (status, text) = slot.execute(&input);
                    tracing::debug!(
                        input_len = input.len(),
                        output_len = text.len(),
                        ok = status == Status::Success,
                        elapsed_us = start.elapsed().as_micros() as u64,
                        "executed command"
                    );
                    guard.publish(status, &text);
                }
                Request::Dispose => {
                    tracing::debug!("dispose requested");
                    break;
                }
            }
        }

        drop_contained(slot);
        tracing::info!("script runtime released, worker exiting");
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                tracing::error!("bridge worker panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }
}
