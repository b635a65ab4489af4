//! Wire-format types and the JSON codec for the WASM boundary.
//!
//! Binary fields travel as standard base64 strings and metadata as an ordered
//! array of `[key, value]` string pairs, matching the Go SDK's
//! `json.Marshal` conventions so hosts and guests in any language agree on
//! the bytes. Wire twins are built for a single encode or decode and never
//! kept around.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::types::*;

// ---------------------------------------------------------------------------
// Serde adapters
// ---------------------------------------------------------------------------

/// Base64 serde for binary data. Empty, absent and `null` all mean no bytes,
/// and text that is not valid base64 decodes to no bytes as well.
mod base64_serde {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::warn;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(s) => Ok(STANDARD.decode(s).unwrap_or_else(|e| {
                warn!(error = %e, "invalid base64 in binary field, treating as empty");
                Vec::new()
            })),
        }
    }
}

/// Metadata pairs. `null` reads as empty and entries that are not exactly
/// two strings are skipped.
fn meta_pairs<'de, D>(deserializer: D) -> Result<Vec<[String; 2]>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Vec<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|pair| <[String; 2]>::try_from(pair).ok())
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn meta_to_pairs(meta: &Meta) -> Vec<[String; 2]> {
    meta.iter()
        .map(|(k, v)| [k.to_string(), v.to_string()])
        .collect()
}

fn pairs_to_meta(pairs: Vec<[String; 2]>) -> Meta {
    pairs.into_iter().map(|[k, v]| (k, v)).collect()
}

// ---------------------------------------------------------------------------
// Wire twins
// ---------------------------------------------------------------------------

/// JSON-serializable message that crosses the WASM boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmMessage {
    pub kind: String,
    #[serde(with = "base64_serde", default)]
    pub data: Vec<u8>,
    #[serde(default, deserialize_with = "meta_pairs")]
    pub meta: Vec<[String; 2]>,
}

/// JSON-serializable result that crosses the WASM boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmResult {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<WasmResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WasmError>,
}

/// JSON-serializable response in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmResponse {
    #[serde(with = "base64_serde", default)]
    pub data: Vec<u8>,
    #[serde(default, deserialize_with = "meta_pairs", skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<[String; 2]>,
}

/// JSON-serializable error in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "meta_pairs", skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<[String; 2]>,
}

/// JSON-serializable block info in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmBlockInfo {
    pub name: String,
    pub version: String,
    pub interface: String,
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instance_mode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_modes: Vec<String>,
}

/// JSON-serializable lifecycle event in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmLifecycleEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(with = "base64_serde", default)]
    pub data: Vec<u8>,
}

/// Reply envelope of the `lifecycle` export. Lifecycle has no action
/// semantics, so it is a bare success flag rather than a full result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LifecycleAck {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

impl Message {
    /// Convert from the wire format into a [`Message`].
    pub fn from_wasm(wm: WasmMessage) -> Self {
        Self {
            kind: wm.kind,
            data: wm.data,
            meta: pairs_to_meta(wm.meta),
        }
    }

    /// Convert this message into the wire format.
    pub fn to_wasm(&self) -> WasmMessage {
        WasmMessage {
            kind: self.kind.clone(),
            data: self.data.clone(),
            meta: meta_to_pairs(&self.meta),
        }
    }
}

impl Response {
    pub fn from_wasm(wr: WasmResponse) -> Self {
        Self {
            data: wr.data,
            meta: pairs_to_meta(wr.meta),
        }
    }

    pub fn to_wasm(&self) -> WasmResponse {
        WasmResponse {
            data: self.data.clone(),
            meta: meta_to_pairs(&self.meta),
        }
    }
}

impl WaferError {
    pub fn from_wasm(we: WasmError) -> Self {
        Self {
            code: we.code,
            message: we.message,
            meta: pairs_to_meta(we.meta),
        }
    }

    pub fn to_wasm(&self) -> WasmError {
        WasmError {
            code: self.code.clone(),
            message: self.message.clone(),
            meta: meta_to_pairs(&self.meta),
        }
    }
}

impl BlockResult {
    /// Convert this result into the wire format.
    pub fn to_wasm(&self) -> WasmResult {
        WasmResult {
            action: self.action().as_str().to_string(),
            response: self.response().map(Response::to_wasm),
            error: self.err().map(WaferError::to_wasm),
        }
    }

    /// Convert from the wire format, normalizing inconsistent payloads.
    pub fn from_wasm(wr: WasmResult) -> Self {
        Self::normalize(
            Action::parse(&wr.action),
            wr.response.map(Response::from_wasm),
            wr.error.map(WaferError::from_wasm),
        )
    }
}

impl BlockInfo {
    /// Convert this info into the wire format.
    pub fn to_wasm(&self) -> WasmBlockInfo {
        WasmBlockInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            interface: self.interface.clone(),
            summary: self.summary.clone(),
            instance_mode: self.instance_mode.as_str().to_string(),
            allowed_modes: self
                .allowed_modes
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }

    pub fn from_wasm(wi: WasmBlockInfo) -> Self {
        Self::new(wi.name, wi.version, wi.interface, wi.summary)
            .with_instance_mode(InstanceMode::parse(&wi.instance_mode))
            .with_allowed_modes(wi.allowed_modes.iter().map(|m| InstanceMode::parse(m)))
    }
}

impl LifecycleEvent {
    /// Convert from the wire format into a [`LifecycleEvent`].
    pub fn from_wasm(wle: WasmLifecycleEvent) -> Self {
        Self {
            event_type: LifecycleType::parse(&wle.event_type),
            data: wle.data,
        }
    }

    pub fn to_wasm(&self) -> WasmLifecycleEvent {
        WasmLifecycleEvent {
            event_type: self.event_type.as_str().to_string(),
            data: self.data.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Failure to turn bytes into an envelope or back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty {0} payload")]
    Empty(&'static str),
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<CodecError> for WaferError {
    fn from(e: CodecError) -> Self {
        WaferError::internal(e.to_string())
    }
}

fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|source| CodecError::Encode { what, source })
}

fn decode<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty(what));
    }
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode { what, source })
}

pub fn encode_message(msg: &Message) -> Result<Vec<u8>, CodecError> {
    encode("message", &msg.to_wasm())
}

pub fn decode_message(bytes: &[u8]) -> Result<Message, CodecError> {
    decode("message", bytes).map(Message::from_wasm)
}

pub fn encode_result(result: &BlockResult) -> Result<Vec<u8>, CodecError> {
    encode("result", &result.to_wasm())
}

pub fn decode_result(bytes: &[u8]) -> Result<BlockResult, CodecError> {
    decode("result", bytes).map(BlockResult::from_wasm)
}

pub fn encode_block_info(info: &BlockInfo) -> Result<Vec<u8>, CodecError> {
    encode("block info", &info.to_wasm())
}

pub fn decode_block_info(bytes: &[u8]) -> Result<BlockInfo, CodecError> {
    decode("block info", bytes).map(BlockInfo::from_wasm)
}

pub fn encode_lifecycle_event(event: &LifecycleEvent) -> Result<Vec<u8>, CodecError> {
    encode("lifecycle event", &event.to_wasm())
}

pub fn decode_lifecycle_event(bytes: &[u8]) -> Result<LifecycleEvent, CodecError> {
    decode("lifecycle event", bytes).map(LifecycleEvent::from_wasm)
}

pub fn encode_ack(ack: &LifecycleAck) -> Result<Vec<u8>, CodecError> {
    encode("lifecycle ack", ack)
}

pub fn decode_ack(bytes: &[u8]) -> Result<LifecycleAck, CodecError> {
    decode("lifecycle ack", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    fn as_json(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn message_wire_shape() {
        let msg = Message::new("svc.database.get", b"hi".to_vec())
            .with_meta("collection", "users")
            .with_meta("id", "42");
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(
            as_json(&bytes),
            json!({
                "kind": "svc.database.get",
                "data": "aGk=",
                "meta": [["collection", "users"], ["id", "42"]],
            })
        );
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn empty_and_absent_binary_are_equivalent() {
        let a = decode_message(br#"{"kind":"ping","data":"","meta":[]}"#).unwrap();
        let b = decode_message(br#"{"kind":"ping"}"#).unwrap();
        let c = decode_message(br#"{"kind":"ping","data":null,"meta":null}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.data.is_empty() && a.meta.is_empty());
    }

    #[test]
    fn duplicate_meta_keys_keep_last_value() {
        let msg = decode_message(br#"{"kind":"k","meta":[["a","1"],["b","2"],["a","3"],["bad"]]}"#).unwrap();
        assert_eq!(msg.meta.get("a"), Some("3"));
        assert_eq!(msg.meta.len(), 2);
    }

    #[test]
    fn continue_result_has_no_payload_fields() {
        let bytes = encode_result(&BlockResult::cont()).unwrap();
        assert_eq!(as_json(&bytes), json!({"action": "continue"}));
    }

    #[test]
    fn respond_and_error_results_round_trip() {
        let respond = BlockResult::respond(Response::new(vec![0u8, 159, 255]).with_meta("resp.status", "201"));
        assert_eq!(decode_result(&encode_result(&respond).unwrap()).unwrap(), respond);

        let error = BlockResult::error(WaferError::new(ErrorCode::NotFound, "missing").with_meta("resp.status", "404"));
        let bytes = encode_result(&error).unwrap();
        assert_eq!(
            as_json(&bytes),
            json!({"action": "error", "error": {"code": "not_found", "message": "missing", "meta": [["resp.status", "404"]]}})
        );
        assert_eq!(decode_result(&bytes).unwrap(), error);
    }

    #[test]
    fn unknown_action_decodes_as_continue() {
        let r = decode_result(br#"{"action":"unknown-future-value"}"#).unwrap();
        assert_eq!(r, BlockResult::cont());
    }

    #[test]
    fn inconsistent_result_is_normalized_on_decode() {
        let r = decode_result(br#"{"action":"drop","response":{"data":"eA=="},"error":{"code":"internal"}}"#).unwrap();
        assert_eq!(r, BlockResult::drop_message());

        let r = decode_result(br#"{"action":"error"}"#).unwrap();
        assert_matches!(r.err(), Some(e) if e.is(ErrorCode::Internal));
    }

    #[test]
    fn block_info_round_trip_and_fallbacks() {
        let info = BlockInfo::new("@example/echo", "1.2.0", "processor@v1", "Echoes input")
            .with_instance_mode(InstanceMode::Singleton)
            .with_allowed_modes([InstanceMode::Singleton, InstanceMode::PerChain]);
        let bytes = encode_block_info(&info).unwrap();
        assert_eq!(as_json(&bytes)["allowed_modes"], json!(["singleton", "per-chain"]));
        assert_eq!(decode_block_info(&bytes).unwrap(), info);

        let bogus = decode_block_info(
            br#"{"name":"n","version":"v","interface":"i","summary":"s","instance_mode":"bogus","allowed_modes":null}"#,
        )
        .unwrap();
        assert_eq!(bogus.instance_mode, InstanceMode::PerNode);
        assert!(bogus.allowed_modes.is_empty());
    }

    #[test]
    fn lifecycle_event_round_trip_and_fallback() {
        let ev = LifecycleEvent::init(br#"{"x":1}"#.to_vec());
        let bytes = encode_lifecycle_event(&ev).unwrap();
        assert_eq!(as_json(&bytes)["type"], json!("init"));
        assert_eq!(decode_lifecycle_event(&bytes).unwrap(), ev);

        let ev = decode_lifecycle_event(br#"{"type":"bogus"}"#).unwrap();
        assert_eq!(ev.event_type, LifecycleType::Init);
    }

    #[test]
    fn ack_omits_error_on_success() {
        assert_eq!(as_json(&encode_ack(&LifecycleAck::ok()).unwrap()), json!({"ok": true}));
        assert_eq!(
            as_json(&encode_ack(&LifecycleAck::failed("bad config")).unwrap()),
            json!({"ok": false, "error": "bad config"})
        );
    }

    #[test]
    fn invalid_base64_reads_as_empty_bytes() {
        let msg = decode_message(br#"{"kind":"k","data":"!!!","meta":[["a","1"]]}"#).unwrap();
        assert!(msg.data.is_empty());
        assert_eq!(msg.meta.get("a"), Some("1"));

        let r = decode_result(br#"{"action":"respond","response":{"data":"***","meta":[["k","v"]]}}"#).unwrap();
        let resp = r.response().unwrap();
        assert!(resp.data.is_empty());
        assert_eq!(resp.meta.get("k"), Some("v"));

        let ev = decode_lifecycle_event(br#"{"type":"stop","data":"%%"}"#).unwrap();
        assert_eq!(ev, LifecycleEvent::stop());
    }

    #[test]
    fn error_without_code_keeps_its_message() {
        let r = decode_result(br#"{"action":"error","error":{"message":"db down"}}"#).unwrap();
        let err = r.err().unwrap();
        assert_eq!(err.message, "db down");
        assert_eq!(err.code, "");
    }

    #[test]
    fn malformed_envelopes_are_codec_errors() {
        assert_matches!(decode_message(b""), Err(CodecError::Empty("message")));
        assert_matches!(decode_message(b"{not json"), Err(CodecError::Decode { what: "message", .. }));
        assert_matches!(decode_message(br#"{"data":""}"#), Err(CodecError::Decode { .. }));

        let err: WaferError = decode_result(b"[]").unwrap_err().into();
        assert!(err.is(ErrorCode::Internal));
    }
}
