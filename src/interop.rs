//! Interop — the host-facing, synchronous side of the bridge.
//!
//! ```text
//! execute(input)
//!   1. send Request::Execute to the worker queue
//!   2. park on the SharedChannel signal word until the worker publishes
//!   3. reset the signal
//!   4. Success → Ok(text) │ oversized flag → PayloadTooLarge │ Failure → Err(text)
//! ```
//!
//! The caller's thread is fully blocked for the duration of one command.
//! That is the point: callers above this layer want plain values back, not
//! futures. A host with a cooperative scheduler should call `execute` from a
//! dedicated OS thread rather than from its scheduler thread.
//!
//! There is no timeout. A command that never finishes blocks the caller
//! forever.
//!
//! The shared region has one result slot, so at most one command may be in
//! flight. `execute` takes `&mut self`, which makes overlapping calls on one
//! bridge a compile error rather than a runtime hazard. Code that shares a
//! bridge across threads by other means (the C ABI, a raw pointer) must
//! serialize calls itself; overlapping calls there are undefined.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::time::Instant;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{Request, Status};
use crate::runtime::RuntimeFactory;
use crate::shared_channel::{FLAG_OVERSIZED, SharedChannel};
use crate::worker::Worker;

/// Synchronous handle to a script runtime running on its own thread.
pub struct Interop {
    channel: Arc<SharedChannel>,
    tx: Sender<Request>,
    worker: Worker,
    disposed: bool,
}

impl Interop {
    /// Start a bridge with a freshly allocated shared region.
    ///
    /// Returns once the worker thread is spawned; the runtime is built on
    /// that thread afterwards. If building it fails, every `execute` reports
    /// the startup failure.
    pub fn start(config: BridgeConfig, factory: RuntimeFactory) -> Result<Self> {
        config.validate()?;
        let channel = SharedChannel::new(config.capacity);
        Self::start_with_channel(channel, config, factory)
    }

    /// Start a bridge on an existing shared region, e.g. one wrapped around
    /// host memory. `config.capacity` is ignored in favour of the region's.
    pub fn start_with_channel(channel: SharedChannel, config: BridgeConfig, factory: RuntimeFactory) -> Result<Self> {
        let config = BridgeConfig {
            capacity: channel.capacity(),
            ..config
        };
        config.validate()?;

        // Stale results from whoever used the region before must not satisfy
        // our first wait
        channel.reset();
        let channel = Arc::new(channel);

        let (tx, rx) = mpsc::channel();
        let worker = Worker::spawn(&config.thread_name, channel.clone(), factory, config.prelude, rx)?;

        tracing::info!(
            "bridge started ({}KB shared buffer, worker {:?})",
            config.capacity / 1024,
            config.thread_name
        );

        Ok(Self {
            channel,
            tx,
            worker,
            disposed: false,
        })
    }

    /// Start a bridge backed by QuickJS.
    #[cfg(feature = "quickjs")]
    pub fn quickjs(config: BridgeConfig) -> Result<Self> {
        Self::start(config, crate::runtime::factory(crate::quickjs::QuickJsRuntime::new))
    }

    /// Run one command and return its result text.
    ///
    /// Fails with [`BridgeError::Script`] carrying the runtime's message
    /// verbatim, [`BridgeError::PayloadTooLarge`] if the result or error did
    /// not fit the shared buffer, [`BridgeError::Disposed`] after
    /// [`dispose`](Self::dispose), or [`BridgeError::WorkerGone`] if the
    /// worker thread has exited on its own.
    pub fn execute(&mut self, input: &str) -> Result<String> {
        if self.disposed {
            return Err(BridgeError::Disposed);
        }

        let start = Instant::now();
        self.tx
            .send(Request::execute(input))
            .map_err(|_| BridgeError::WorkerGone)?;

        let (status, text) = self.channel.await_result();
        let oversized = self.channel.flags() & FLAG_OVERSIZED != 0;
        self.channel.reset();

        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            ok = status == Status::Success,
            "command completed"
        );

        match status {
            Status::Success => Ok(text),
            Status::Failure if oversized => Err(BridgeError::PayloadTooLarge {
                capacity: self.channel.capacity(),
            }),
            Status::Failure => Err(BridgeError::Script(text)),
        }
    }

    /// Ask the worker to release the runtime and exit. Does not wait.
    ///
    /// Later `execute` calls fail with [`BridgeError::Disposed`]. Calling
    /// this again is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        // Worker already gone is fine; nothing is waiting on it
        let _ = self.tx.send(Request::Dispose);
        tracing::debug!("dispose sent");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Payload capacity of the shared region.
    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }

    /// The shared region, for hosts that read results in place.
    pub fn channel(&self) -> &SharedChannel {
        &self.channel
    }
}

impl Drop for Interop {
    fn drop(&mut self) {
        self.dispose();
        // No command can be in flight here (execute borrows mutably), so the
        // worker reaches Dispose promptly
        self.worker.join();
    }
}
