//! The guest/host ABI.
//!
//! Exports (called by the host, generated by [`register!`](crate::register)):
//!
//! - `reserve(size: u32) -> u32` -- allocate guest memory for the host to write into
//! - `describe() -> u64` -- the registered block's info
//! - `handle(ptr: u32, len: u32) -> u64` -- process one message
//! - `lifecycle(ptr: u32, len: u32) -> u64` -- deliver init/start/stop
//!
//! Imports (module `"wafer"`, called by the guest):
//!
//! - `send(ptr: u32, len: u32) -> u64` -- invoke a host capability
//! - `capabilities() -> u64` -- list host capabilities
//! - `is_cancelled() -> u32` -- poll for cancellation
//!
//! Every `u64` above is a [`PackedRef`]: pointer in the high 32 bits, length
//! in the low 32 bits, zero for "no payload". This module is the only place
//! that turns raw addresses into bytes; everything above it works on owned
//! buffers.
//!
//! Each export first clears the buffers pinned by the previous export, so a
//! returned buffer is valid from the moment it is emitted until the host
//! makes its next export call.

use tracing::{debug, warn};

use crate::block;
use crate::context::Context;
use crate::pin;
use crate::types::*;
use crate::wire::{self, LifecycleAck};

const NO_BLOCK: &str = "no block registered";

const RESULT_ENCODE_FAILURE: &[u8] =
    br#"{"action":"error","error":{"code":"internal","message":"failed to encode result"}}"#;

const ACK_ENCODE_FAILURE: &[u8] = br#"{"ok":false,"error":"failed to encode lifecycle ack"}"#;

// ---------------------------------------------------------------------------
// PackedRef
// ---------------------------------------------------------------------------

/// A guest memory location and byte length packed into one `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedRef {
    pub ptr: u32,
    pub len: u32,
}

impl PackedRef {
    /// The "no payload" value.
    pub const NONE: Self = Self { ptr: 0, len: 0 };

    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }

    pub fn pack(self) -> u64 {
        ((self.ptr as u64) << 32) | self.len as u64
    }

    pub fn unpack(packed: u64) -> Self {
        Self {
            ptr: (packed >> 32) as u32,
            len: (packed & 0xFFFF_FFFF) as u32,
        }
    }

    /// True when there is nothing to read.
    pub fn is_none(self) -> bool {
        self.len == 0
    }

    /// Narrow a native address to the 32-bit ABI. Exact on wasm32.
    fn from_raw(ptr: *const u8, len: usize) -> Self {
        Self {
            ptr: ptr as usize as u32,
            len: len as u32,
        }
    }
}

impl From<u64> for PackedRef {
    fn from(packed: u64) -> Self {
        Self::unpack(packed)
    }
}

impl From<PackedRef> for u64 {
    fn from(r: PackedRef) -> Self {
        r.pack()
    }
}

// ---------------------------------------------------------------------------
// Dispatch on owned bytes
// ---------------------------------------------------------------------------

/// Encoded info of the registered block; empty when none is registered.
pub fn describe_bytes() -> Vec<u8> {
    let Some(info) = block::with_block(|b| b.info()) else {
        debug!("describe called with no block registered");
        return Vec::new();
    };
    match wire::encode_block_info(&info) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to encode block info");
            Vec::new()
        }
    }
}

/// Decode a wire message, run the block, and encode its result.
///
/// Always returns a parseable result envelope; internal failures become an
/// `internal` error result.
pub fn handle_bytes(input: &[u8]) -> Vec<u8> {
    let result = dispatch_handle(input);
    wire::encode_result(&result).unwrap_or_else(|e| {
        warn!(error = %e, "failed to encode block result");
        RESULT_ENCODE_FAILURE.to_vec()
    })
}

fn dispatch_handle(input: &[u8]) -> BlockResult {
    let mut msg = match wire::decode_message(input) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "rejecting undecodable message");
            return BlockResult::error(e.into());
        }
    };

    let ctx = Context::new();
    block::with_block(|b| b.handle(&ctx, &mut msg)).unwrap_or_else(|| {
        warn!(kind = %msg.kind, "handle called with no block registered");
        BlockResult::error(WaferError::internal(NO_BLOCK))
    })
}

/// Decode a lifecycle event, run the block's lifecycle hook, and encode the
/// `{ok, error?}` acknowledgement.
pub fn lifecycle_bytes(input: &[u8]) -> Vec<u8> {
    let ack = match wire::decode_lifecycle_event(input) {
        Err(e) => {
            warn!(error = %e, "rejecting undecodable lifecycle event");
            LifecycleAck::failed(e.to_string())
        }
        Ok(event) => {
            let event_type = event.event_type;
            let ctx = Context::new();
            match block::with_block(|b| b.lifecycle(&ctx, event)) {
                None => LifecycleAck::failed(NO_BLOCK),
                Some(Ok(())) => {
                    debug!(event = %event_type, "lifecycle event handled");
                    LifecycleAck::ok()
                }
                Some(Err(e)) => {
                    warn!(event = %event_type, code = %e.code, "lifecycle handler failed: {}", e.message);
                    LifecycleAck::failed(e.message)
                }
            }
        }
    };
    wire::encode_ack(&ack).unwrap_or_else(|_| ACK_ENCODE_FAILURE.to_vec())
}

// ---------------------------------------------------------------------------
// Raw entry points
// ---------------------------------------------------------------------------
//
// Only meaningful on wasm32, where addresses fit the 32-bit ABI.

/// Allocate `size` bytes for the host to write into.
pub fn reserve(size: u32) -> u32 {
    PackedRef::from_raw(pin::reserve(size as usize), 0).ptr
}

/// Pin `buf` until the next export call and return its packed location.
pub fn emit(buf: Vec<u8>) -> u64 {
    let (ptr, len) = pin::pin(buf);
    PackedRef::from_raw(ptr, len).pack()
}

/// The `describe` export.
pub fn describe() -> u64 {
    pin::clear_pinned();
    emit(describe_bytes())
}

/// The `handle` export.
///
/// # Safety
///
/// `ptr..ptr + len` must be readable guest memory, normally a region the
/// host obtained from [`reserve`] and filled with a wire message.
pub unsafe fn handle(ptr: u32, len: u32) -> u64 {
    pin::clear_pinned();
    let input = read_guest(PackedRef::new(ptr, len));
    emit(handle_bytes(&input))
}

/// The `lifecycle` export.
///
/// # Safety
///
/// Same contract as [`handle`].
pub unsafe fn lifecycle(ptr: u32, len: u32) -> u64 {
    pin::clear_pinned();
    let input = read_guest(PackedRef::new(ptr, len));
    emit(lifecycle_bytes(&input))
}

/// Copy the bytes behind `r` out of linear memory, reclaiming the region if
/// it came from [`reserve`].
///
/// # Safety
///
/// A non-empty `r` must describe readable guest memory.
unsafe fn read_guest(r: PackedRef) -> Vec<u8> {
    if r.ptr == 0 {
        return Vec::new();
    }
    let addr = r.ptr as usize as *const u8;
    let len = r.len as usize;
    match pin::release(addr) {
        Some(mut buf) => {
            if buf.len() < len {
                warn!(reserved = buf.len(), requested = len, "input exceeds its reservation, truncated");
            }
            buf.truncate(len);
            buf
        }
        None if len == 0 => Vec::new(),
        None => std::slice::from_raw_parts(addr, len).to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Host imports
// ---------------------------------------------------------------------------

#[cfg(target_arch = "wasm32")]
#[link(wasm_import_module = "wafer")]
extern "C" {
    #[link_name = "send"]
    fn host_send(msg_ptr: u32, msg_len: u32) -> u64;

    #[link_name = "capabilities"]
    fn host_capabilities() -> u64;

    #[link_name = "is_cancelled"]
    fn host_is_cancelled() -> u32;
}

/// Call the `send` import with an encoded message and copy out the reply.
#[cfg(target_arch = "wasm32")]
pub(crate) fn send_raw(request: &[u8]) -> Vec<u8> {
    unsafe {
        let packed = host_send(request.as_ptr() as u32, request.len() as u32);
        read_guest(PackedRef::unpack(packed))
    }
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn capabilities_raw() -> Vec<u8> {
    unsafe { read_guest(PackedRef::unpack(host_capabilities())) }
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn is_cancelled_raw() -> bool {
    unsafe { host_is_cancelled() != 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_places_pointer_high_and_length_low() {
        let r = PackedRef::new(0x0001_0000, 42);
        assert_eq!(r.pack(), 0x0001_0000_0000_002A);
        assert_eq!(PackedRef::unpack(r.pack()), r);
        assert_eq!(PackedRef::from(u64::from(r)), r);

        let max = PackedRef::new(u32::MAX, u32::MAX);
        assert_eq!(PackedRef::unpack(max.pack()), max);
    }

    #[test]
    fn empty_emit_is_zero() {
        assert_eq!(emit(Vec::new()), 0);
        assert_eq!(PackedRef::NONE.pack(), 0);
        assert!(PackedRef::unpack(0).is_none());
    }

    #[test]
    fn emit_pins_until_next_entry() {
        pin::clear_pinned();
        let packed = PackedRef::unpack(emit(b"payload".to_vec()));
        assert_eq!(packed.len, 7);
        assert_eq!(pin::pinned_count(), 1);

        block::unregister();
        let _ = describe();
        assert_eq!(pin::pinned_count(), 0);
    }

    #[test]
    fn reserved_input_is_reclaimed_by_the_consuming_entry() {
        let ptr = pin::reserve(8);
        // Narrowing is lossy off wasm32; only addresses below 4 GiB round-trip.
        if ptr as usize > u32::MAX as usize {
            pin::release(ptr);
            return;
        }
        let before = pin::reserved_count();
        let bytes = unsafe {
            std::ptr::copy_nonoverlapping(b"abcdefgh".as_ptr(), ptr, 8);
            read_guest(PackedRef::from_raw(ptr, 5))
        };
        assert_eq!(bytes, b"abcde");
        assert_eq!(pin::reserved_count(), before - 1);
    }

    #[test]
    fn empty_input_still_reclaims_its_reservation() {
        let ptr = pin::reserve(8);
        if ptr as usize > u32::MAX as usize {
            pin::release(ptr);
            return;
        }
        let before = pin::reserved_count();
        let bytes = unsafe { read_guest(PackedRef::from_raw(ptr, 0)) };
        assert!(bytes.is_empty());
        assert_eq!(pin::reserved_count(), before - 1);
    }

    #[test]
    fn oversized_length_yields_only_the_reservation() {
        let ptr = pin::reserve(4);
        if ptr as usize > u32::MAX as usize {
            pin::release(ptr);
            return;
        }
        let bytes = unsafe {
            std::ptr::copy_nonoverlapping(b"wxyz".as_ptr(), ptr, 4);
            read_guest(PackedRef::from_raw(ptr, 16))
        };
        assert_eq!(bytes, b"wxyz");
        assert!(pin::release(ptr).is_none());
    }
}
