//! Helper functions and a response builder for common response patterns.

use serde::Serialize;

use crate::types::*;

const JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Free-standing helper functions
// ---------------------------------------------------------------------------

/// Respond with raw data and metadata.
pub fn respond_data(data: impl Into<Vec<u8>>, meta: Meta) -> BlockResult {
    BlockResult::respond(Response {
        data: data.into(),
        meta,
    })
}

/// Serialize `v` as JSON and respond with it.
pub fn json_respond<T: Serialize>(v: &T) -> BlockResult {
    match serde_json::to_vec(v) {
        Ok(body) => respond_data(body, Meta::from_iter([(META_RESP_CONTENT_TYPE, JSON)])),
        Err(e) => err_internal(&format!("failed to marshal response: {}", e)),
    }
}

/// Respond with a status code, body, and content type.
pub fn respond_with_status(status: u16, data: impl Into<Vec<u8>>, content_type: &str) -> BlockResult {
    let mut meta = Meta::new();
    meta.insert(META_RESP_STATUS, status.to_string());
    if !content_type.is_empty() {
        meta.insert(META_RESP_CONTENT_TYPE, content_type);
    }
    respond_data(data, meta)
}

/// Serialize `v` as JSON and respond with the given status code.
pub fn json_respond_status<T: Serialize>(status: u16, v: &T) -> BlockResult {
    match serde_json::to_vec(v) {
        Ok(body) => respond_with_status(status, body, JSON),
        Err(e) => err_internal(&format!("failed to marshal response: {}", e)),
    }
}

/// Return an error [`BlockResult`] with the given code and message.
pub fn error(code: impl Into<String>, message: &str) -> BlockResult {
    BlockResult::error(WaferError::new(code, message))
}

/// Return an error [`BlockResult`] carrying metadata.
pub fn error_with_meta(code: impl Into<String>, message: &str, meta: Meta) -> BlockResult {
    BlockResult::error(WaferError {
        meta,
        ..WaferError::new(code, message)
    })
}

/// Return an error [`BlockResult`] tagged with an HTTP status.
pub fn error_status(status: u16, code: impl Into<String>, message: &str) -> BlockResult {
    BlockResult::error(WaferError::new(code, message).with_meta(META_RESP_STATUS, status.to_string()))
}

pub fn err_bad_request(message: &str) -> BlockResult {
    error(ErrorCode::InvalidArgument, message)
}

pub fn err_not_found(message: &str) -> BlockResult {
    error(ErrorCode::NotFound, message)
}

pub fn err_already_exists(message: &str) -> BlockResult {
    error(ErrorCode::AlreadyExists, message)
}

pub fn err_permission_denied(message: &str) -> BlockResult {
    error(ErrorCode::PermissionDenied, message)
}

pub fn err_unauthenticated(message: &str) -> BlockResult {
    error(ErrorCode::Unauthenticated, message)
}

pub fn err_unavailable(message: &str) -> BlockResult {
    error(ErrorCode::Unavailable, message)
}

pub fn err_deadline_exceeded(message: &str) -> BlockResult {
    error(ErrorCode::DeadlineExceeded, message)
}

pub fn err_resource_exhausted(message: &str) -> BlockResult {
    error(ErrorCode::ResourceExhausted, message)
}

pub fn err_failed_precondition(message: &str) -> BlockResult {
    error(ErrorCode::FailedPrecondition, message)
}

pub fn err_internal(message: &str) -> BlockResult {
    error(ErrorCode::Internal, message)
}

// ---------------------------------------------------------------------------
// ResponseBuilder
// ---------------------------------------------------------------------------

/// A builder for constructing responses with headers, cookies, and status codes.
///
/// # Example
/// ```ignore
/// let result = ResponseBuilder::new()
///     .status(200)
///     .header("X-Request-Id", "abc123")
///     .cookie("session=xyz; HttpOnly; Path=/")
///     .json(&my_data)
///     .respond();
/// ```
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    data: Vec<u8>,
    meta: Meta,
    cookie_count: usize,
    failure: Option<String>,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP status carried in `resp.status`.
    pub fn status(mut self, status: u16) -> Self {
        self.meta.insert(META_RESP_STATUS, status.to_string());
        self
    }

    /// Add a response header.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(format!("{}{}", META_RESP_HEADER_PREFIX, key), value);
        self
    }

    /// Add a `Set-Cookie` header to the response.
    pub fn cookie(mut self, cookie: &str) -> Self {
        self.meta.insert(format!("{}{}", META_RESP_COOKIE_PREFIX, self.cookie_count), cookie);
        self.cookie_count += 1;
        self
    }

    /// Set an arbitrary metadata pair.
    pub fn meta(mut self, key: &str, value: &str) -> Self {
        self.meta.insert(key, value);
        self
    }

    /// Set a raw payload.
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Set a raw payload with its content type.
    pub fn body(self, data: impl Into<Vec<u8>>, content_type: &str) -> Self {
        let builder = self.data(data);
        if content_type.is_empty() {
            builder
        } else {
            builder.meta(META_RESP_CONTENT_TYPE, content_type)
        }
    }

    /// Serialize `v` as the JSON payload.
    pub fn json<T: Serialize>(mut self, v: &T) -> Self {
        match serde_json::to_vec(v) {
            Ok(body) => self.body(body, JSON),
            Err(e) => {
                self.failure = Some(format!("failed to marshal response: {}", e));
                self
            }
        }
    }

    /// Finish the response; fails if a JSON payload could not be encoded.
    pub fn build(self) -> std::result::Result<Response, WaferError> {
        match self.failure {
            Some(message) => Err(WaferError::internal(message)),
            None => Ok(Response {
                data: self.data,
                meta: self.meta,
            }),
        }
    }

    /// Finish as a `Respond` result, or an `internal` error.
    pub fn respond(self) -> BlockResult {
        match self.build() {
            Ok(response) => BlockResult::respond(response),
            Err(err) => BlockResult::error(err),
        }
    }
}

/// Convenience constructor for [`ResponseBuilder`].
pub fn new_response() -> ResponseBuilder {
    ResponseBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_helpers_tag_meta() {
        let r = respond_with_status(201, b"ok".to_vec(), "text/plain");
        let resp = r.response().unwrap();
        assert_eq!(resp.meta.get(META_RESP_STATUS), Some("201"));
        assert_eq!(resp.meta.get(META_RESP_CONTENT_TYPE), Some("text/plain"));

        let e = error_status(404, ErrorCode::NotFound, "nope");
        assert_eq!(e.err().unwrap().meta.get(META_RESP_STATUS), Some("404"));
        assert!(err_not_found("x").err().unwrap().is(ErrorCode::NotFound));
        assert!(err_bad_request("x").err().unwrap().is(ErrorCode::InvalidArgument));
    }

    #[test]
    fn builder_collects_headers_and_cookies() {
        let r = new_response()
            .status(200)
            .header("X-Request-Id", "abc")
            .cookie("a=1")
            .cookie("b=2")
            .json(&serde_json::json!({"ok": true}))
            .respond();

        let resp = r.response().unwrap();
        assert_eq!(resp.data, br#"{"ok":true}"#);
        assert_eq!(resp.meta.get("resp.header.X-Request-Id"), Some("abc"));
        assert_eq!(resp.meta.get("resp.set_cookie.1"), Some("b=2"));
        assert_eq!(resp.meta.get(META_RESP_CONTENT_TYPE), Some(JSON));
    }

    #[test]
    fn json_failure_becomes_internal_error() {
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], 1);
        let r = ResponseBuilder::new().json(&bad).respond();
        assert!(r.err().unwrap().is(ErrorCode::Internal));
        assert!(json_respond(&bad).err().is_some());
    }
}
