//! Guest context: the block's only way to reach host capabilities.
//!
//! Every capability (logging, config, database, network, storage, crypto)
//! is a message kind understood by the host and invoked uniformly through
//! [`Context::send`]. Calls are synchronous: `send` returns once the host
//! has fully executed the capability. Cancellation is cooperative; long
//! running block logic polls [`Context::is_cancelled`] and returns early.
//!
//! The transport sits behind the [`Host`] trait. On wasm32 the default host
//! calls the `"wafer"` imports; elsewhere it is a detached stub. Tests and
//! native embedders can [`install_host`] their own.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::types::*;
use crate::wire;

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// The host side of the three imported calls, on encoded bytes.
///
/// An empty return from [`send`](Host::send) or
/// [`capabilities`](Host::capabilities) means "no payload".
pub trait Host {
    /// Deliver an encoded wire message and return the encoded wire result.
    fn send(&self, message: &[u8]) -> Vec<u8>;

    /// Return the JSON capability list.
    fn capabilities(&self) -> Vec<u8>;

    /// Report whether the current execution has been cancelled.
    fn is_cancelled(&self) -> bool;
}

/// Host backed by the `"wafer"` WASM imports.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmHost;

#[cfg(target_arch = "wasm32")]
impl Host for WasmHost {
    fn send(&self, message: &[u8]) -> Vec<u8> {
        crate::abi::send_raw(message)
    }

    fn capabilities(&self) -> Vec<u8> {
        crate::abi::capabilities_raw()
    }

    fn is_cancelled(&self) -> bool {
        crate::abi::is_cancelled_raw()
    }
}

/// Host used when no runtime is attached: sends produce no payload, there
/// are no capabilities, and nothing is ever cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHost;

impl Host for DetachedHost {
    fn send(&self, _message: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn capabilities(&self) -> Vec<u8> {
        Vec::new()
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

thread_local! {
    static INSTALLED: RefCell<Option<Rc<dyn Host>>> = const { RefCell::new(None) };
}

/// Route every [`Context`] created afterwards through `host`.
pub fn install_host(host: impl Host + 'static) {
    INSTALLED.with(|h| *h.borrow_mut() = Some(Rc::new(host)));
}

/// Return to the platform default host.
pub fn uninstall_host() {
    INSTALLED.with(|h| *h.borrow_mut() = None);
}

fn current_host() -> Rc<dyn Host> {
    if let Some(host) = INSTALLED.with(|h| h.borrow().clone()) {
        return host;
    }
    #[cfg(target_arch = "wasm32")]
    let host: Rc<dyn Host> = Rc::new(WasmHost);
    #[cfg(not(target_arch = "wasm32"))]
    let host: Rc<dyn Host> = Rc::new(DetachedHost);
    host
}

// ---------------------------------------------------------------------------
// CapabilityInfo
// ---------------------------------------------------------------------------

/// A message kind the host understands, with optional JSON Schemas
/// describing its input and output. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub kind: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "input-schema", skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, alias = "output-schema", skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Guest-side context providing access to host capabilities.
///
/// All methods serialize through the wire codec and hand bytes to the
/// [`Host`]; no state is kept on the guest side.
#[derive(Clone)]
pub struct Context {
    host: Rc<dyn Host>,
}

impl Context {
    /// Create a context bound to the installed host, or the platform default.
    pub fn new() -> Self {
        Self {
            host: current_host(),
        }
    }

    /// Create a context bound to a specific host.
    pub fn with_host(host: impl Host + 'static) -> Self {
        Self {
            host: Rc::new(host),
        }
    }

    /// Send a [`Message`] to the host and return the resulting [`BlockResult`].
    ///
    /// Never fails at the language level: encode or decode problems come back
    /// as an `internal` error result. A host reply with no payload reads as
    /// `Continue`.
    pub fn send(&self, msg: &Message) -> BlockResult {
        let request = match wire::encode_message(msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = %msg.kind, error = %e, "failed to encode outgoing message");
                return BlockResult::error(e.into());
            }
        };

        debug!(kind = %msg.kind, bytes = request.len(), "sending message to host");
        let reply = self.host.send(&request);
        if reply.is_empty() {
            return BlockResult::cont();
        }

        match wire::decode_result(&reply) {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = %msg.kind, error = %e, "host returned an undecodable result");
                BlockResult::error(e.into())
            }
        }
    }

    /// Send and collapse the outcome: the host's error as `Err`, its
    /// response (if any) as `Ok`.
    pub fn call(&self, msg: &Message) -> std::result::Result<Option<Response>, WaferError> {
        self.send(msg).into_result()
    }

    /// Query the host's available capabilities as raw JSON bytes.
    pub fn capabilities_raw(&self) -> Vec<u8> {
        let raw = self.host.capabilities();
        if raw.is_empty() {
            return b"[]".to_vec();
        }
        raw
    }

    /// Query the host's available capabilities. Undecodable data yields an
    /// empty list.
    pub fn capabilities(&self) -> Vec<CapabilityInfo> {
        serde_json::from_slice(&self.capabilities_raw()).unwrap_or_else(|e| {
            warn!(error = %e, "failed to decode host capabilities");
            Vec::new()
        })
    }

    /// Check whether the host has cancelled the current execution.
    pub fn is_cancelled(&self) -> bool {
        self.host.is_cancelled()
    }

    /// `Err(deadline_exceeded)` once the host reports cancellation.
    pub fn check_cancelled(&self) -> std::result::Result<(), WaferError> {
        if self.is_cancelled() {
            return Err(WaferError::new(
                ErrorCode::DeadlineExceeded,
                "execution cancelled by host",
            ));
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
