//! Script Bridge - synchronous calls into a single-threaded script runtime.
//!
//! A host thread issues blocking calls; a dedicated worker thread owns the
//! one persistent runtime instance and runs them in order. Requests go over
//! a queue, results come back through a fixed-size shared region.
//!
//! # Architecture
//!
//! ```text
//! Host thread (Interop)                         Worker thread
//! ─────────────────────                         ─────────────
//! execute("2 + 2")                              owns the ScriptRuntime
//!   │ Request::Execute ──── mpsc queue ────▶      │ eval("2 + 2")
//!   │                                             │ check size
//!   │ parked on signal word                       │ write payload, length, status
//!   │                                             │ store signal = 1, wake
//!   ▼                                             ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │            SharedChannel (16 + capacity)          │
//!   │  signal ← worker stores 1, host resets to 0       │
//!   │  length, status ← worker writes, host reads       │
//!   │  payload ← worker writes, host reads              │
//!   └──────────────────────────────────────────────────┘
//!   ◀── Ok("4") / Err(message)
//! ```
//!
//! ```no_run
//! use script_bridge::{BridgeConfig, Interop};
//!
//! let mut bridge = Interop::quickjs(BridgeConfig::default())?;
//! assert_eq!(bridge.execute("2 + 2")?, "4");
//! bridge.dispose();
//! # Ok::<(), script_bridge::BridgeError>(())
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod interop;
pub mod protocol;
#[cfg(feature = "quickjs")]
pub mod quickjs;
pub mod runtime;
pub mod shared_channel;
pub mod worker;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result, ScriptError};
pub use interop::Interop;
pub use protocol::{Request, Status};
#[cfg(feature = "quickjs")]
pub use quickjs::QuickJsRuntime;
pub use runtime::{RuntimeFactory, ScriptRuntime, factory};
pub use shared_channel::SharedChannel;
