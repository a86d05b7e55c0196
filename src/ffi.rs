//! C ABI for hosts that load the bridge as a shared library.
//!
//! ```typescript
//! const lib = dlopen("./libscript_bridge.so", {
//!   script_bridge_init:       { args: ["u32"], returns: "ptr" },
//!   script_bridge_execute:    { args: ["ptr", "ptr", "u32"], returns: "u32" },
//!   script_bridge_result_ptr: { args: ["ptr"], returns: "ptr" },
//!   script_bridge_result_len: { args: ["ptr"], returns: "u32" },
//!   script_bridge_dispose:    { args: ["ptr"], returns: "void" },
//! })
//! ```
//!
//! A handle must only be used from one thread at a time. Overlapping
//! `script_bridge_execute` calls on one handle are undefined.

use std::ptr;

#[cfg(feature = "quickjs")]
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::interop::Interop;
use crate::shared_channel;
#[cfg(feature = "quickjs")]
use crate::shared_channel::SharedChannel;

/// `script_bridge_execute`: the command failed; the result text is the error.
pub const EXEC_FAILURE: u32 = 0;
/// `script_bridge_execute`: the command succeeded.
pub const EXEC_SUCCESS: u32 = 1;
/// `script_bridge_execute`: the call itself was rejected (null handle,
/// non-UTF-8 input, disposed bridge).
pub const EXEC_INVALID: u32 = 2;

/// Opaque handle returned to the host.
pub struct ScriptBridge {
    interop: Interop,
    /// Text of the last execute call, readable until the next one.
    last: String,
}

impl ScriptBridge {
    fn into_raw(interop: Interop) -> *mut ScriptBridge {
        Box::into_raw(Box::new(ScriptBridge {
            interop,
            last: String::new(),
        }))
    }
}

/// Bytes a host must allocate for a shared region holding `capacity` payload
/// bytes (0 = default capacity).
#[unsafe(no_mangle)]
pub extern "C" fn script_bridge_buffer_size(capacity: u32) -> u32 {
    let capacity = if capacity == 0 {
        shared_channel::DEFAULT_CAPACITY
    } else {
        capacity as usize
    };
    shared_channel::region_size(capacity).min(u32::MAX as usize) as u32
}

/// Start a QuickJS bridge with its own shared region (0 = default capacity).
///
/// Returns null on failure.
#[cfg(feature = "quickjs")]
#[unsafe(no_mangle)]
pub extern "C" fn script_bridge_init(capacity: u32) -> *mut ScriptBridge {
    let mut config = BridgeConfig::default();
    if capacity != 0 {
        config.capacity = capacity as usize;
    }

    match Interop::quickjs(config) {
        Ok(interop) => ScriptBridge::into_raw(interop),
        Err(e) => {
            tracing::error!("script_bridge_init failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Start a QuickJS bridge on a region the host owns, sized with
/// [`script_bridge_buffer_size`]. Results can then also be read in place.
///
/// Returns null on failure.
///
/// # Safety
/// `ptr` must point to `len` writable, 4-byte aligned bytes that outlive the
/// returned handle.
#[cfg(feature = "quickjs")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn script_bridge_init_with_buffer(ptr: *mut u8, len: u32) -> *mut ScriptBridge {
    let Some(channel) = (unsafe { SharedChannel::try_from_raw(ptr, len as usize) }) else {
        tracing::error!("script_bridge_init_with_buffer: unusable region ({} bytes)", len);
        return ptr::null_mut();
    };
    let factory = crate::runtime::factory(crate::quickjs::QuickJsRuntime::new);
    match Interop::start_with_channel(channel, BridgeConfig::default(), factory) {
        Ok(interop) => ScriptBridge::into_raw(interop),
        Err(e) => {
            tracing::error!("script_bridge_init_with_buffer failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Execute `len` bytes of UTF-8 at `input`. Returns [`EXEC_SUCCESS`],
/// [`EXEC_FAILURE`] or [`EXEC_INVALID`]; the text is then available through
/// [`script_bridge_result_ptr`] / [`script_bridge_result_len`].
///
/// # Safety
/// `handle` must come from an init function and not be disposed; `input`
/// must point to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn script_bridge_execute(handle: *mut ScriptBridge, input: *const u8, len: u32) -> u32 {
    let Some(bridge) = (unsafe { handle.as_mut() }) else {
        return EXEC_INVALID;
    };

    let bytes: &[u8] = if len == 0 {
        &[]
    } else if input.is_null() {
        bridge.last = "null input pointer".to_string();
        return EXEC_INVALID;
    } else {
        unsafe { std::slice::from_raw_parts(input, len as usize) }
    };

    let Ok(text) = std::str::from_utf8(bytes) else {
        bridge.last = "input is not valid UTF-8".to_string();
        return EXEC_INVALID;
    };

    match bridge.interop.execute(text) {
        Ok(result) => {
            bridge.last = result;
            EXEC_SUCCESS
        }
        Err(e @ BridgeError::Disposed) => {
            bridge.last = e.to_string();
            EXEC_INVALID
        }
        Err(e) => {
            bridge.last = e.to_string();
            EXEC_FAILURE
        }
    }
}

/// Pointer to the last result text (not NUL-terminated).
///
/// # Safety
/// `handle` must be live; the pointer is valid until the next execute or
/// dispose on this handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn script_bridge_result_ptr(handle: *const ScriptBridge) -> *const u8 {
    match unsafe { handle.as_ref() } {
        Some(bridge) => bridge.last.as_ptr(),
        None => ptr::null(),
    }
}

/// Length in bytes of the last result text.
///
/// # Safety
/// `handle` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn script_bridge_result_len(handle: *const ScriptBridge) -> u32 {
    match unsafe { handle.as_ref() } {
        Some(bridge) => bridge.last.len() as u32,
        None => 0,
    }
}

/// Dispose the bridge and free the handle. Null is a no-op.
///
/// # Safety
/// `handle` must come from an init function and not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn script_bridge_dispose(handle: *mut ScriptBridge) {
    if handle.is_null() {
        return;
    }
    let mut bridge = unsafe { Box::from_raw(handle) };
    bridge.interop.dispose();
    // Dropping joins the worker once it has released the runtime
    drop(bridge);
}
