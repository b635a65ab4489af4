//! Guest-side domain types mirroring the WAFER host types.
//!
//! These are the values block logic works with. They never cross the WASM
//! boundary directly; [`crate::wire`] converts them to and from their JSON
//! wire twins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Meta key constants (mirrors host meta.rs)
// ---------------------------------------------------------------------------

pub const META_REQ_ACTION: &str = "req.action";
pub const META_REQ_RESOURCE: &str = "req.resource";
pub const META_REQ_PARAM_PREFIX: &str = "req.param.";
pub const META_REQ_QUERY_PREFIX: &str = "req.query.";
pub const META_REQ_CLIENT_IP: &str = "req.client_ip";
pub const META_REQ_CONTENT_TYPE: &str = "req.content_type";
pub const META_HTTP_HEADER_PREFIX: &str = "http.header.";

pub const META_AUTH_USER_ID: &str = "auth.user_id";
pub const META_AUTH_USER_EMAIL: &str = "auth.user_email";
pub const META_AUTH_USER_ROLES: &str = "auth.user_roles";

pub const META_RESP_STATUS: &str = "resp.status";
pub const META_RESP_CONTENT_TYPE: &str = "content-type";
pub const META_RESP_HEADER_PREFIX: &str = "resp.header.";
pub const META_RESP_COOKIE_PREFIX: &str = "resp.set_cookie.";

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

/// Ordered string metadata with unique keys.
///
/// Entries keep their first insertion position; inserting an existing key
/// replaces its value in place, so the last write wins without reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    entries: Vec<(String, String)>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite a key, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Meta {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Meta::new();
        meta.extend(iter);
        meta
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Meta {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message flowing through a WAFER chain. Contains a kind identifier,
/// payload data, and key-value metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub kind: String,
    pub data: Vec<u8>,
    pub meta: Meta,
}

impl Message {
    /// Create a new message with the given kind and data.
    pub fn new(kind: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
            meta: Meta::new(),
        }
    }

    /// Builder-style variant of [`set_meta`](Self::set_meta).
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key, value);
        self
    }

    /// Deserialize the data payload as JSON into the given type.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// Get a metadata value by key, returning an empty string if absent.
    pub fn get_meta(&self, key: &str) -> &str {
        self.meta.get(key).unwrap_or("")
    }

    /// Set a metadata key-value pair.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key, value);
    }

    /// Serialize `v` as JSON and set it as the data payload.
    pub fn set_data<T: Serialize>(&mut self, v: &T) -> std::result::Result<(), serde_json::Error> {
        self.data = serde_json::to_vec(v)?;
        Ok(())
    }

    /// Return a path variable extracted by the router.
    pub fn var(&self, name: &str) -> &str {
        self.get_meta(&format!("{}{}", META_REQ_PARAM_PREFIX, name))
    }

    /// Return a query parameter value.
    pub fn query(&self, name: &str) -> &str {
        self.get_meta(&format!("{}{}", META_REQ_QUERY_PREFIX, name))
    }

    /// Return a request header value. Header names are matched lowercase.
    pub fn header(&self, name: &str) -> &str {
        self.get_meta(&format!("{}{}", META_HTTP_HEADER_PREFIX, name.to_lowercase()))
    }

    /// Return the semantic request action (retrieve, create, update, delete, execute).
    pub fn action(&self) -> &str {
        self.get_meta(META_REQ_ACTION)
    }

    /// Return the request resource path.
    pub fn path(&self) -> &str {
        self.get_meta(META_REQ_RESOURCE)
    }

    pub fn content_type(&self) -> &str {
        self.get_meta(META_REQ_CONTENT_TYPE)
    }

    pub fn user_id(&self) -> &str {
        self.get_meta(META_AUTH_USER_ID)
    }

    pub fn user_email(&self) -> &str {
        self.get_meta(META_AUTH_USER_EMAIL)
    }

    /// Return the authenticated user's roles.
    pub fn user_roles(&self) -> Vec<&str> {
        let roles = self.get_meta(META_AUTH_USER_ROLES);
        if roles.is_empty() {
            Vec::new()
        } else {
            roles.split(',').collect()
        }
    }

    /// Return true if the authenticated user has the "admin" role.
    pub fn is_admin(&self) -> bool {
        self.user_roles().contains(&"admin")
    }

    /// Return all query parameters as a map.
    pub fn query_params(&self) -> HashMap<&str, &str> {
        self.meta
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(META_REQ_QUERY_PREFIX).map(|name| (name, v)))
            .collect()
    }

    /// Return a named cookie value from the Cookie header.
    pub fn cookie(&self, name: &str) -> &str {
        let mut raw = self.get_meta("http.header.Cookie");
        if raw.is_empty() {
            raw = self.get_meta("http.header.cookie");
        }
        raw.split(';')
            .filter_map(|part| part.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
            .unwrap_or("")
    }

    /// Return the client's remote address.
    pub fn remote_addr(&self) -> &str {
        self.get_meta(META_REQ_CLIENT_IP)
    }

    /// Extract page, page_size, and offset from query params.
    pub fn pagination_params(&self, default_page_size: usize) -> (usize, usize, usize) {
        let page = self
            .query("page")
            .parse::<usize>()
            .ok()
            .filter(|&p| p > 0)
            .unwrap_or(1);

        let page_size = self
            .query("page_size")
            .parse::<usize>()
            .ok()
            .filter(|&ps| ps > 0 && ps <= 100)
            .unwrap_or(default_page_size);

        let offset = (page - 1).saturating_mul(page_size);
        (page, page_size, offset)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Tells the runtime what to do after a block processes a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    /// Forward the message to the next block in the chain.
    #[default]
    Continue,
    /// Short-circuit the chain and return the response to the caller.
    Respond,
    /// End processing silently.
    Drop,
    /// Short-circuit the chain and surface the error.
    Error,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Respond => "respond",
            Self::Drop => "drop",
            Self::Error => "error",
        }
    }

    /// Parse a wire-format action. Unrecognized strings yield `Continue`
    /// so that actions added by newer hosts degrade instead of failing.
    pub fn parse(s: &str) -> Self {
        match s {
            "respond" => Self::Respond,
            "drop" => Self::Drop,
            "error" => Self::Error,
            _ => Self::Continue,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Carries data back to the caller when a block short-circuits the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub data: Vec<u8>,
    pub meta: Meta,
}

impl Response {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key, value);
        self
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable error codes, modeled after RPC status conventions.
///
/// `Internal` is reserved for protocol and codec failures; the rest are
/// chosen by block logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    FailedPrecondition,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::Unauthenticated => "unauthenticated",
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ResourceExhausted => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invalid_argument" => Some(Self::InvalidArgument),
            "not_found" => Some(Self::NotFound),
            "already_exists" => Some(Self::AlreadyExists),
            "permission_denied" => Some(Self::PermissionDenied),
            "unauthenticated" => Some(Self::Unauthenticated),
            "unavailable" => Some(Self::Unavailable),
            "deadline_exceeded" => Some(Self::DeadlineExceeded),
            "resource_exhausted" => Some(Self::ResourceExhausted),
            "failed_precondition" => Some(Self::FailedPrecondition),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// WaferError
// ---------------------------------------------------------------------------

/// A structured error returned by a block or by a host capability.
///
/// `code` is kept as a string so codes this SDK does not know pass through
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaferError {
    pub code: String,
    pub message: String,
    pub meta: Meta,
}

impl WaferError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            meta: Meta::new(),
        }
    }

    /// Shorthand for an `internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Return a copy with the given metadata key-value added.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key, value);
        self
    }

    /// The taxonomy code, if `code` is one of the known values.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::parse(&self.code)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code.as_str()
    }
}

impl fmt::Display for WaferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for WaferError {}

// ---------------------------------------------------------------------------
// BlockResult
// ---------------------------------------------------------------------------

/// The outcome of a block processing a message.
///
/// Fields are private so every value upholds the action/payload pairing:
/// `Respond` carries a response, `Error` carries an error, and `Continue`
/// and `Drop` carry neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    action: Action,
    response: Option<Response>,
    error: Option<WaferError>,
}

impl BlockResult {
    /// Pass the message on to the next block.
    pub fn cont() -> Self {
        Self {
            action: Action::Continue,
            response: None,
            error: None,
        }
    }

    /// Short-circuit the chain with a response.
    pub fn respond(response: Response) -> Self {
        Self {
            action: Action::Respond,
            response: Some(response),
            error: None,
        }
    }

    /// End processing silently.
    pub fn drop_message() -> Self {
        Self {
            action: Action::Drop,
            response: None,
            error: None,
        }
    }

    /// Short-circuit the chain with an error.
    pub fn error(err: WaferError) -> Self {
        Self {
            action: Action::Error,
            response: None,
            error: Some(err),
        }
    }

    /// Build a result from an arbitrary triple, discarding payloads that do
    /// not belong to `action` and filling in the one that is missing.
    pub fn normalize(action: Action, response: Option<Response>, error: Option<WaferError>) -> Self {
        match action {
            Action::Continue => Self::cont(),
            Action::Drop => Self::drop_message(),
            Action::Respond => Self::respond(response.unwrap_or_default()),
            Action::Error => Self::error(
                error.unwrap_or_else(|| WaferError::internal("error action without error payload")),
            ),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn err(&self) -> Option<&WaferError> {
        self.error.as_ref()
    }

    pub fn into_parts(self) -> (Action, Option<Response>, Option<WaferError>) {
        (self.action, self.response, self.error)
    }

    /// Collapse into a `Result`: the error for `Error`, the response for
    /// `Respond`, and `None` for `Continue` and `Drop`.
    pub fn into_result(self) -> std::result::Result<Option<Response>, WaferError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.response),
        }
    }
}

impl From<WaferError> for BlockResult {
    fn from(err: WaferError) -> Self {
        Self::error(err)
    }
}

// ---------------------------------------------------------------------------
// InstanceMode
// ---------------------------------------------------------------------------

/// Controls how many block instances the runtime creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstanceMode {
    #[default]
    PerNode,
    Singleton,
    PerChain,
    PerExecution,
}

impl InstanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerNode => "per-node",
            Self::Singleton => "singleton",
            Self::PerChain => "per-chain",
            Self::PerExecution => "per-execution",
        }
    }

    /// Parse a wire-format mode. Unrecognized strings yield `PerNode`.
    pub fn parse(s: &str) -> Self {
        match s {
            "singleton" => Self::Singleton,
            "per-chain" => Self::PerChain,
            "per-execution" => Self::PerExecution,
            _ => Self::PerNode,
        }
    }
}

impl fmt::Display for InstanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BlockInfo
// ---------------------------------------------------------------------------

/// Declares a block's identity and instance policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub name: String,
    pub version: String,
    pub interface: String,
    pub summary: String,
    pub instance_mode: InstanceMode,
    /// Supported instance modes. Empty means all modes are permitted.
    pub allowed_modes: Vec<InstanceMode>,
}

impl BlockInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        interface: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            interface: interface.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_instance_mode(mut self, mode: InstanceMode) -> Self {
        self.instance_mode = mode;
        self
    }

    /// Set the allowed modes, dropping duplicates while keeping order.
    pub fn with_allowed_modes(mut self, modes: impl IntoIterator<Item = InstanceMode>) -> Self {
        self.allowed_modes.clear();
        for mode in modes {
            if !self.allowed_modes.contains(&mode) {
                self.allowed_modes.push(mode);
            }
        }
        self
    }

    pub fn allows(&self, mode: InstanceMode) -> bool {
        self.allowed_modes.is_empty() || self.allowed_modes.contains(&mode)
    }
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Identifies the kind of lifecycle event. The host delivers them in the
/// order `Init`, `Start`, `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleType {
    /// Configuration delivered; a failure aborts startup of the instance.
    #[default]
    Init,
    /// About to receive messages.
    Start,
    /// Shutting down.
    Stop,
}

impl LifecycleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// Parse a wire-format event type. Unrecognized strings yield `Init`.
    pub fn parse(s: &str) -> Self {
        match s {
            "start" => Self::Start,
            "stop" => Self::Stop,
            _ => Self::Init,
        }
    }
}

impl fmt::Display for LifecycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event sent to blocks during runtime transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub event_type: LifecycleType,
    pub data: Vec<u8>,
}

impl LifecycleEvent {
    /// An `Init` event carrying the block's configuration JSON.
    pub fn init(config: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type: LifecycleType::Init,
            data: config.into(),
        }
    }

    pub fn start() -> Self {
        Self {
            event_type: LifecycleType::Start,
            data: Vec::new(),
        }
    }

    pub fn stop() -> Self {
        Self {
            event_type: LifecycleType::Stop,
            data: Vec::new(),
        }
    }

    /// Decode the configuration carried by an `Init` event.
    ///
    /// Empty data decodes as JSON `null`, so `Option<T>` sees `None`.
    pub fn config<T: DeserializeOwned>(&self) -> std::result::Result<T, WaferError> {
        let raw: &[u8] = if self.data.is_empty() { b"null" } else { &self.data };
        serde_json::from_slice(raw).map_err(|e| {
            WaferError::new(
                ErrorCode::InvalidArgument,
                format!("invalid block configuration: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_last_write_wins_in_place() {
        let mut meta: Meta = [("a", "1"), ("b", "2"), ("a", "3")].into_iter().collect();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("a"), Some("3"));
        assert_eq!(meta.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "b"]);

        assert_eq!(meta.insert("b", "4"), Some("2".to_string()));
        assert_eq!(meta.remove("a"), Some("3".to_string()));
        assert!(!meta.contains_key("a"));
    }

    #[test]
    fn unknown_enum_strings_fall_back_to_neutral_variant() {
        // Stricter parsing was rejected: older guests must tolerate new variants.
        assert_eq!(Action::parse("unknown-future-value"), Action::Continue);
        assert_eq!(InstanceMode::parse("bogus"), InstanceMode::PerNode);
        assert_eq!(LifecycleType::parse("bogus"), LifecycleType::Init);
        assert_eq!(Action::parse("drop"), Action::Drop);
        assert_eq!(InstanceMode::parse("per-execution"), InstanceMode::PerExecution);
    }

    #[test]
    fn normalize_strips_foreign_payloads() {
        let resp = Some(Response::new("x"));
        let err = Some(WaferError::new(ErrorCode::NotFound, "gone"));

        let r = BlockResult::normalize(Action::Continue, resp.clone(), err.clone());
        assert!(r.response().is_none() && r.err().is_none());

        let r = BlockResult::normalize(Action::Drop, resp.clone(), None);
        assert_eq!(r, BlockResult::drop_message());

        let r = BlockResult::normalize(Action::Respond, None, err.clone());
        assert_eq!(r.response(), Some(&Response::default()));
        assert!(r.err().is_none());

        let r = BlockResult::normalize(Action::Error, resp, None);
        assert!(r.response().is_none());
        assert!(r.err().is_some_and(|e| e.is(ErrorCode::Internal)));
    }

    #[test]
    fn pagination_saturates_on_huge_page() {
        let msg = Message::new("http.request", "").with_meta("req.query.page", usize::MAX.to_string());
        assert_eq!(msg.pagination_params(10), (usize::MAX, 10, usize::MAX));

        let msg = Message::new("http.request", "").with_meta("req.query.page", "0");
        assert_eq!(msg.pagination_params(10), (1, 10, 0));
    }

    #[test]
    fn into_result_surfaces_error() {
        let err = WaferError::new(ErrorCode::NotFound, "no such user");
        assert_eq!(BlockResult::from(err.clone()).into_result(), Err(err));
        assert_eq!(BlockResult::cont().into_result(), Ok(None));
    }

    #[test]
    fn message_request_accessors() {
        let msg = Message::new("http.request", b"{}".to_vec())
            .with_meta("req.query.page", "3")
            .with_meta("req.query.page_size", "20")
            .with_meta("http.header.cookie", "a=1; session=xyz")
            .with_meta("http.header.x-request-id", "abc")
            .with_meta(META_AUTH_USER_ROLES, "user,admin");

        assert_eq!(msg.pagination_params(10), (3, 20, 40));
        assert_eq!(msg.cookie("session"), "xyz");
        assert_eq!(msg.cookie("missing"), "");
        assert_eq!(msg.header("X-Request-Id"), "abc");
        assert!(msg.is_admin());
        assert_eq!(msg.query_params().get("page"), Some(&"3"));
    }

    #[test]
    fn block_info_allowed_modes_is_a_set() {
        let info = BlockInfo::new("b", "1.0.0", "t@v1", "s")
            .with_allowed_modes([InstanceMode::Singleton, InstanceMode::Singleton, InstanceMode::PerChain]);
        assert_eq!(info.allowed_modes, vec![InstanceMode::Singleton, InstanceMode::PerChain]);
        assert!(!info.allows(InstanceMode::PerNode));
        assert!(BlockInfo::default().allows(InstanceMode::PerExecution));
    }

    #[test]
    fn lifecycle_config_decodes_init_payload() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Cfg {
            limit: u32,
        }
        let ev = LifecycleEvent::init(br#"{"limit":5}"#.to_vec());
        assert_eq!(ev.config::<Cfg>().unwrap(), Cfg { limit: 5 });
        assert_eq!(LifecycleEvent::start().config::<Option<Cfg>>().unwrap(), None);

        let bad = LifecycleEvent::init(b"not json".to_vec());
        assert!(bad.config::<Cfg>().unwrap_err().is(ErrorCode::InvalidArgument));
    }
}
