//! WAFER guest SDK for writing blocks compiled to WebAssembly (`wasm32`).
//!
//! This crate is the guest half of the WAFER block ABI: the memory
//! reservation and pinning rules, the packed pointer/length convention, the
//! JSON wire codec, and the action and lifecycle semantics the host relies
//! on. Block logic reaches host capabilities through one primitive,
//! [`Context::send`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use wafer_guest::*;
//!
//! #[derive(Default)]
//! struct MyBlock;
//!
//! impl Block for MyBlock {
//!     fn info(&self) -> BlockInfo {
//!         BlockInfo::new("my-block", "0.1.0", "transform@v1", "A demo block")
//!     }
//!
//!     fn handle(&mut self, ctx: &Context, msg: &mut Message) -> BlockResult {
//!         if ctx.is_cancelled() {
//!             return BlockResult::drop_message();
//!         }
//!         msg.set_meta("seen-by", "my-block");
//!         BlockResult::cont()
//!     }
//! }
//!
//! // Generate the required WASM exports.
//! wafer_guest::register!(MyBlock);
//! ```
//!
//! # Architecture
//!
//! ```text
//! +-----------+     "wafer" imports         +-------------+
//! |   Guest   | --------------------------> |    Host     |
//! |  (WASM)   | <-------------------------- |  (Runtime)  |
//! +-----------+     WASM exports            +-------------+
//! ```
//!
//! The host reserves guest memory, writes JSON into it and passes `(ptr, len)`
//! to an export. Return values are packed as `u64` where the high 32 bits
//! contain the pointer and the low 32 bits contain the length; see
//! [`abi`] for the full contract.

pub mod abi;
pub mod block;
pub mod context;
pub mod helpers;
pub mod pin;
pub mod types;
pub mod wire;

// Re-export the most commonly used items at the crate root.
pub use abi::PackedRef;
pub use block::{export, Block};
pub use context::{CapabilityInfo, Context, Host};
pub use helpers::*;
pub use types::*;
pub use wire::{CodecError, LifecycleAck};

/// Generate the WASM exports required by the WAFER host runtime.
///
/// Given a type that implements [`Block`], this macro generates:
///
/// - `reserve(size: u32) -> u32` -- allocate bytes in WASM linear memory
/// - `describe() -> u64` -- return block info as a packed `(ptr, len)`
/// - `handle(ptr: u32, len: u32) -> u64` -- handle a message
/// - `lifecycle(ptr: u32, len: u32) -> u64` -- handle a lifecycle event
///
/// The block is registered on the first export call unless [`export`] was
/// called earlier. With one argument the type must implement [`Default`];
/// a second argument supplies the constructor expression.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct MyBlock;
/// impl wafer_guest::Block for MyBlock { /* ... */ }
///
/// wafer_guest::register!(MyBlock);
/// // or: wafer_guest::register!(MyBlock, MyBlock::with_limit(10));
/// ```
#[macro_export]
macro_rules! register {
    (@exports $ensure:expr) => {
        #[no_mangle]
        pub extern "C" fn reserve(size: u32) -> u32 {
            $crate::abi::reserve(size)
        }

        #[no_mangle]
        pub extern "C" fn describe() -> u64 {
            $ensure;
            $crate::abi::describe()
        }

        #[no_mangle]
        pub extern "C" fn handle(ptr: u32, len: u32) -> u64 {
            $ensure;
            // SAFETY: the host passes a region it obtained from `reserve`.
            unsafe { $crate::abi::handle(ptr, len) }
        }

        #[no_mangle]
        pub extern "C" fn lifecycle(ptr: u32, len: u32) -> u64 {
            $ensure;
            // SAFETY: the host passes a region it obtained from `reserve`.
            unsafe { $crate::abi::lifecycle(ptr, len) }
        }
    };
    ($block_ty:ty) => {
        $crate::register!(@exports $crate::block::register_default::<$block_ty>());
    };
    ($block_ty:ty, $init:expr) => {
        $crate::register!(@exports $crate::block::register_with::<$block_ty, _>(|| $init));
    };
}
