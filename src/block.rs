//! The `Block` trait and the module's single registered block.
//!
//! A WASM module hosts exactly one block, and the host reaches it only
//! through fixed export names. The registered instance is therefore a
//! process-wide singleton: set once at startup (by [`export`] or by the
//! [`register!`](crate::register) exports on first entry) and read by every
//! entry point afterwards.

use std::cell::RefCell;

use crate::context::Context;
use crate::types::*;

/// The core interface that every WAFER guest block must implement.
///
/// The WAFER runtime calls:
/// - [`info`](Block::info) to discover the block's identity and instance policy.
/// - [`handle`](Block::handle) to process each incoming message.
/// - [`lifecycle`](Block::lifecycle) on init, start, and stop transitions.
///
/// Use the [`register!`](crate::register) macro to generate the required WASM
/// exports from your `Block` implementation.
pub trait Block {
    /// Return metadata describing this block.
    fn info(&self) -> BlockInfo;

    /// Process an incoming message and return a result indicating the desired
    /// action (continue, respond, drop, or error).
    fn handle(&mut self, ctx: &Context, msg: &mut Message) -> BlockResult;

    /// Handle a lifecycle event. Returning an error from `Init` tells the
    /// host to abort startup of this instance. The default is a no-op.
    fn lifecycle(&mut self, _ctx: &Context, _event: LifecycleEvent) -> std::result::Result<(), WaferError> {
        Ok(())
    }
}

thread_local! {
    static REGISTERED: RefCell<Option<Box<dyn Block>>> = const { RefCell::new(None) };
}

/// Register `block` as this module's block, replacing any earlier one.
///
/// Call once during startup, before the host invokes an export.
pub fn export(block: impl Block + 'static) {
    let replaced = REGISTERED.with(|r| r.borrow_mut().replace(Box::new(block)).is_some());
    if replaced {
        tracing::warn!("replacing previously registered block");
    }
}

/// Register the block built by `init` unless one is already registered.
pub fn register_with<B, F>(init: F)
where
    B: Block + 'static,
    F: FnOnce() -> B,
{
    if !is_registered() {
        export(init());
    }
}

/// Register `B::default()` unless a block is already registered.
pub fn register_default<B: Block + Default + 'static>() {
    register_with(B::default);
}

pub fn is_registered() -> bool {
    REGISTERED.with(|r| r.borrow().is_some())
}

/// Remove and return the registered block.
pub fn unregister() -> Option<Box<dyn Block>> {
    REGISTERED.with(|r| r.borrow_mut().take())
}

/// Run `f` against the registered block, or return `None` if there is none.
///
/// The block is checked out for the duration of the call, so a nested entry
/// sees an empty registry instead of a second mutable borrow.
pub(crate) fn with_block<R>(f: impl FnOnce(&mut dyn Block) -> R) -> Option<R> {
    let mut block = REGISTERED.with(|r| r.borrow_mut().take())?;
    let out = f(block.as_mut());
    REGISTERED.with(|r| {
        let mut slot = r.borrow_mut();
        // A block exported from inside the call wins.
        if slot.is_none() {
            *slot = Some(block);
        }
    });
    Some(out)
}
