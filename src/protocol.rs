//! Host → worker message vocabulary.
//!
//! Requests travel over an ordinary queued channel (`std::sync::mpsc`), never
//! through the shared region. Results travel the other way through the
//! [`SharedChannel`](crate::shared_channel::SharedChannel) only.
//!
//! ```text
//! Interop ── Request::Execute { input } ──▶ Worker
//!    ▲                                         │
//!    └──── status + length + payload ◀─────────┘  (SharedChannel)
//! ```
//!
//! There is no correlation id: at most one `Execute` is in flight per
//! channel, so the next result in the slot is always the answer to the last
//! request.

// =============================================================================
// REQUESTS
// =============================================================================

/// A request from the host thread to the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Run `input` as one unit of work against the script runtime.
    Execute { input: String },
    /// Release the runtime and stop the worker thread.
    Dispose,
}

impl Request {
    pub fn execute(input: impl Into<String>) -> Self {
        Self::Execute {
            input: input.into(),
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execute { .. } => "execute",
            Self::Dispose => "dispose",
        }
    }
}

// =============================================================================
// STATUS BYTE
// =============================================================================

/// Completion status written to the status byte of the shared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Status {
    #[default]
    Failure = 0,
    Success = 1,
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Success,
            _ => Self::Failure,
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

// =============================================================================
// SENTINELS
// =============================================================================

/// Failure text published in place of a result or error that does not fit
/// the shared buffer. Every valid capacity is at least this long.
pub const PAYLOAD_TOO_LARGE: &str = "payload too large for shared buffer";

/// Prefix of the failure text published for every command once the runtime
/// could not be constructed.
pub const STARTUP_FAILED_PREFIX: &str = "script runtime failed to start: ";

/// Prefix of the failure text published when the runtime panics mid-command.
pub const PANICKED_PREFIX: &str = "script runtime panicked: ";
