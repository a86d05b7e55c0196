//! Shared result region between the host thread and the worker thread.
//!
//! Memory Layout:
//!   - Header (16 bytes): signal word, payload length, status byte, flags byte
//!   - Payload (`capacity` bytes): UTF-8 result or error text
//!
//! ```text
//! 0        4        8    9    10         16                  16 + capacity
//! ┌────────┬────────┬────┬────┬──────────┬────────────────────────┐
//! │ signal │ length │ st │ fl │ reserved │ payload ...            │
//! └────────┴────────┴────┴────┴──────────┴────────────────────────┘
//! ```
//!
//! The flags byte carries facts about the result that the payload text cannot
//! express unambiguously. [`FLAG_OVERSIZED`] marks a payload the worker
//! replaced because the real text did not fit.
//!
//! The worker is the only writer of payload, length and status; the host is
//! the only reader. The signal word is the only synchronization: the worker
//! stores it with `Release` after everything else is written and wakes the
//! waiter, the host observes it with `Acquire` before reading anything.
//!
//! The region is either allocated here ([`SharedChannel::new`]) or wrapped
//! around memory the host already owns ([`SharedChannel::from_raw`]), the way
//! a JS host hands over a `SharedArrayBuffer`.

use std::ptr;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::protocol::Status;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Default payload capacity (2 MB)
pub const DEFAULT_CAPACITY: usize = 2_000_000;

// --- Header offsets (4-byte aligned for futex wait/wake) ---
pub const H_SIGNAL: usize = 0;
pub const H_LENGTH: usize = 4;
pub const H_STATUS: usize = 8;
pub const H_FLAGS: usize = 9;
// 10-15: reserved

/// Flags bit: the real result did not fit and the payload is a stand-in.
pub const FLAG_OVERSIZED: u8 = 1 << 0;

/// Total bytes a region with the given payload capacity occupies.
#[inline]
pub const fn region_size(capacity: usize) -> usize {
    HEADER_SIZE + capacity
}

// =============================================================================
// SHARED CHANNEL
// =============================================================================

/// A fixed-capacity result slot with completion signalling.
pub struct SharedChannel {
    ptr: *mut u8,
    len: usize,
    /// Backing storage when the region was allocated by us.
    owned: Option<*mut [u32]>,
}

// SAFETY: the payload and header are only written by the worker between
// receiving a request and storing the signal, and only read by the host after
// observing the signal. Requests themselves go through a channel, which
// orders the host's previous read before the worker's next write.
unsafe impl Send for SharedChannel {}
unsafe impl Sync for SharedChannel {}

impl SharedChannel {
    /// Allocate a zeroed region with `capacity` payload bytes.
    pub fn new(capacity: usize) -> Self {
        let len = region_size(capacity);
        // u32 words keep the header 4-byte aligned for the atomics
        let words = len.div_ceil(4);
        let storage: Box<[u32]> = vec![0u32; words].into_boxed_slice();
        let raw = Box::into_raw(storage);

        Self {
            ptr: raw as *mut u8,
            len,
            owned: Some(raw),
        }
    }

    /// Wrap a region owned by the host.
    ///
    /// # Safety
    /// - `ptr` must point to at least `len` writable bytes, 4-byte aligned
    /// - `len` must be at least [`HEADER_SIZE`]
    /// - The memory must outlive this struct and must not be written by
    ///   anyone but the worker side of this channel
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        debug_assert!(len >= HEADER_SIZE, "region of {} bytes has no room for the header", len);
        debug_assert_eq!(ptr as usize % 4, 0, "region must be 4-byte aligned");

        Self {
            ptr,
            len,
            owned: None,
        }
    }

    /// Checked [`from_raw`](Self::from_raw): `None` for a null, misaligned
    /// or header-less region.
    ///
    /// # Safety
    /// Same as [`from_raw`](Self::from_raw) for the remaining requirements
    /// (valid writable memory that outlives the channel).
    pub unsafe fn try_from_raw(ptr: *mut u8, len: usize) -> Option<Self> {
        if ptr.is_null() || len < HEADER_SIZE || ptr as usize % 4 != 0 {
            return None;
        }
        Some(unsafe { Self::from_raw(ptr, len) })
    }

    /// Get raw pointer
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Get region length (header + payload capacity)
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the region has no payload capacity
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.capacity() == 0
    }

    /// Payload capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.len.saturating_sub(HEADER_SIZE)
    }

    // =========================================================================
    // LOW-LEVEL HEADER ACCESS
    // =========================================================================

    #[inline]
    fn signal(&self) -> &AtomicU32 {
        unsafe { &*(self.ptr.add(H_SIGNAL) as *const AtomicU32) }
    }

    #[inline]
    fn length_word(&self) -> &AtomicU32 {
        unsafe { &*(self.ptr.add(H_LENGTH) as *const AtomicU32) }
    }

    #[inline]
    fn status_byte(&self) -> &AtomicU8 {
        unsafe { &*(self.ptr.add(H_STATUS) as *const AtomicU8) }
    }

    #[inline]
    fn flags_byte(&self) -> &AtomicU8 {
        unsafe { &*(self.ptr.add(H_FLAGS) as *const AtomicU8) }
    }

    #[inline]
    fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.ptr.add(HEADER_SIZE) }
    }

    // =========================================================================
    // PROTOCOL
    // =========================================================================

    /// Whether a result has been published and not yet consumed.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.signal().load(Ordering::Acquire) != 0
    }

    /// Clear the signal word. The host calls this after consuming a result
    /// and before sending the next request.
    #[inline]
    pub fn reset(&self) {
        self.signal().store(0, Ordering::Release);
    }

    /// Write a result and wake the waiting host. Worker side only.
    ///
    /// Payload, length and status are all written before the signal flips.
    ///
    /// # Panics
    /// If `payload` exceeds [`capacity`](Self::capacity). Callers check the
    /// size first and substitute a sentinel.
    pub fn publish(&self, status: Status, payload: &[u8]) {
        self.publish_flagged(status, payload, 0);
    }

    /// [`publish`](Self::publish) with header flags set, e.g.
    /// [`FLAG_OVERSIZED`].
    pub fn publish_flagged(&self, status: Status, payload: &[u8], flags: u8) {
        assert!(
            payload.len() <= self.capacity(),
            "payload of {} bytes exceeds capacity {}",
            payload.len(),
            self.capacity()
        );

        unsafe {
            ptr::copy_nonoverlapping(payload.as_ptr(), self.payload_ptr(), payload.len());
        }
        self.length_word().store(payload.len() as u32, Ordering::Relaxed);
        self.status_byte().store(status.into(), Ordering::Relaxed);
        self.flags_byte().store(flags, Ordering::Relaxed);

        let signal = self.signal();
        signal.store(1, Ordering::Release);
        atomic_wait::wake_all(signal as *const AtomicU32);
    }

    /// Block until a result is published, then decode it. Host side only.
    ///
    /// Parks the thread on the signal word (futex wait), it does not spin.
    pub fn await_result(&self) -> (Status, String) {
        let signal = self.signal();
        while signal.load(Ordering::Acquire) == 0 {
            // Returns immediately if the word is no longer 0, spurious
            // wakeups loop back around
            atomic_wait::wait(signal, 0);
        }

        let status = Status::from(self.status_byte().load(Ordering::Relaxed));
        let len = (self.length_word().load(Ordering::Relaxed) as usize).min(self.capacity());
        let bytes = unsafe { std::slice::from_raw_parts(self.payload_ptr() as *const u8, len) };

        (status, String::from_utf8_lossy(bytes).into_owned())
    }

    /// Flags of the last published result. Only meaningful after
    /// [`await_result`](Self::await_result) returned and before the next
    /// request is sent.
    #[inline]
    pub fn flags(&self) -> u8 {
        self.flags_byte().load(Ordering::Relaxed)
    }
}

impl Drop for SharedChannel {
    fn drop(&mut self) {
        if let Some(raw) = self.owned.take() {
            // SAFETY: produced by Box::into_raw in `new` and never freed elsewhere
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

impl std::fmt::Debug for SharedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChannel")
            .field("capacity", &self.capacity())
            .field("signaled", &self.is_signaled())
            .field("owned", &self.owned.is_some())
            .finish()
    }
}
