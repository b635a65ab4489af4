//! Guest memory handed across the boundary.
//!
//! Two kinds of buffers live here:
//!
//! - **Reservations**: scratch regions the host obtains through the `reserve`
//!   export before writing input (or a `send` result) into guest memory. A
//!   reservation stays alive until the code that consumes it takes it back
//!   with [`release`].
//! - **Pinned output**: buffers whose address an export has returned to the
//!   host. They stay alive until the next export entry calls
//!   [`clear_pinned`], which is the only point at which the guest can know
//!   the host has finished reading them.
//!
//! Everything is keyed by real addresses (`usize`); narrowing to the 32-bit
//! ABI happens in [`crate::abi`]. Module state is process-wide and touched
//! only by the single export call in flight.

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
struct Arena {
    reserved: HashMap<usize, Vec<u8>>,
    pinned: Vec<Vec<u8>>,
}

thread_local! {
    static ARENA: RefCell<Arena> = RefCell::new(Arena::default());
}

/// Allocate `size` zeroed bytes and return their address.
///
/// A zero size returns null; there is nothing for the host to write.
/// Allocation failure aborts the module, which the host treats as a module
/// fault rather than a retryable condition.
pub fn reserve(size: usize) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }
    let mut buf = vec![0u8; size];
    let ptr = buf.as_mut_ptr();
    ARENA.with(|a| a.borrow_mut().reserved.insert(ptr as usize, buf));
    ptr
}

/// Take back a reservation previously returned by [`reserve`].
///
/// Returns `None` when `ptr` is not an outstanding reservation.
pub fn release(ptr: *const u8) -> Option<Vec<u8>> {
    ARENA.with(|a| a.borrow_mut().reserved.remove(&(ptr as usize)))
}

/// Number of reservations not yet consumed.
pub fn reserved_count() -> usize {
    ARENA.with(|a| a.borrow().reserved.len())
}

/// Keep `buf` alive until the next [`clear_pinned`] and return its address
/// and length. An empty buffer is not pinned and yields `(null, 0)`.
pub fn pin(buf: Vec<u8>) -> (*const u8, usize) {
    if buf.is_empty() {
        return (std::ptr::null(), 0);
    }
    let ptr = buf.as_ptr();
    let len = buf.len();
    // Moving the Vec into the registry does not move its heap allocation.
    ARENA.with(|a| a.borrow_mut().pinned.push(buf));
    (ptr, len)
}

/// Drop every buffer pinned by the previous export call.
pub fn clear_pinned() {
    let released = ARENA.with(|a| std::mem::take(&mut a.borrow_mut().pinned));
    if !released.is_empty() {
        tracing::trace!(buffers = released.len(), "released pinned output");
    }
}

/// Number of buffers currently pinned.
pub fn pinned_count() -> usize {
    ARENA.with(|a| a.borrow().pinned.len())
}

/// Copy out the pinned buffer starting at `ptr`, if it is still pinned.
pub fn pinned_bytes(ptr: *const u8) -> Option<Vec<u8>> {
    ARENA.with(|a| {
        a.borrow()
            .pinned
            .iter()
            .find(|b| b.as_ptr() == ptr)
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_are_sized_and_released_once() {
        let ptr = reserve(16);
        assert!(!ptr.is_null());
        let buf = release(ptr).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(release(ptr).is_none());
        assert!(reserve(0).is_null());
    }

    #[test]
    fn pinned_buffers_live_until_cleared() {
        clear_pinned();
        let (a, a_len) = pin(b"first".to_vec());
        let (b, _) = pin(b"second".to_vec());
        assert_eq!(a_len, 5);
        assert_eq!(pinned_count(), 2);
        assert_eq!(pinned_bytes(a).as_deref(), Some(&b"first"[..]));
        assert_eq!(pinned_bytes(b).as_deref(), Some(&b"second"[..]));

        clear_pinned();
        assert_eq!(pinned_count(), 0);
        assert!(pinned_bytes(a).is_none());
    }

    #[test]
    fn empty_buffers_are_not_pinned() {
        clear_pinned();
        let (ptr, len) = pin(Vec::new());
        assert!(ptr.is_null());
        assert_eq!(len, 0);
        assert_eq!(pinned_count(), 0);
    }
}
