//! Request framing
//!
//! A request is `<headers>\r\n\r\n<JSON body>`. Only the delimiter matters: the
//! body is everything after it. A `Content-Length` header is at most a hint to
//! the reader that more bytes may follow; it never changes what is parsed.

use serde_json::Value;
use thiserror::Error;

use super::status::StatusOutcome;

/// Separates the ignored header section from the body
pub const DELIMITER: &[u8] = b"\r\n\r\n";

/// Reasons raw bytes do not yield a payload
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no bytes received")]
    Empty,

    #[error("no header/body delimiter in request")]
    MissingDelimiter,

    #[error("request body is empty")]
    EmptyBody,

    #[error("request body is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    #[error("malformed JSON payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
}

impl RequestError {
    /// A JSON parse failure maps to 500; every other framing failure to 400.
    pub fn status(&self) -> StatusOutcome {
        match self {
            RequestError::MalformedPayload(_) => StatusOutcome::InternalError,
            _ => StatusOutcome::BadRequest,
        }
    }
}

/// Split raw request bytes into (headers, body)
fn split(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = raw.windows(DELIMITER.len()).position(|w| w == DELIMITER)?;
    Some((&raw[..pos], &raw[pos + DELIMITER.len()..]))
}

/// Value of a `Content-Length` header, matched case-insensitively
fn content_length(headers: &[u8]) -> Option<usize> {
    headers.split(|&b| b == b'\n').find_map(|line| {
        let line = std::str::from_utf8(line).ok()?;
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Whether the headers announced more body bytes than `raw` holds so far
pub fn awaiting_body(raw: &[u8]) -> bool {
    split(raw)
        .and_then(|(headers, body)| content_length(headers).map(|len| body.len() < len))
        .unwrap_or(false)
}

/// Extract and parse the JSON payload of a request
pub fn parse_payload(raw: &[u8]) -> Result<Value, RequestError> {
    if raw.is_empty() {
        return Err(RequestError::Empty);
    }

    let (_headers, body) = split(raw).ok_or(RequestError::MissingDelimiter)?;
    let body = std::str::from_utf8(body).map_err(RequestError::InvalidUtf8)?;
    if body.trim().is_empty() {
        return Err(RequestError::EmptyBody);
    }

    serde_json::from_str(body).map_err(RequestError::MalformedPayload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_body_after_headers() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\n\r\n{\"command\":\"focus\",\"pid\":1}";
        let payload = parse_payload(raw).unwrap();
        assert_eq!(payload, json!({"command": "focus", "pid": 1}));
    }

    #[test]
    fn headers_may_be_empty() {
        let payload = parse_payload(b"\r\n\r\n{\"a\":1}").unwrap();
        assert_eq!(payload["a"], 1);
    }

    #[test]
    fn no_delimiter_is_bad_request() {
        let err = parse_payload(b"{\"command\":\"focus\",\"pid\":1}").unwrap_err();
        assert!(matches!(err, RequestError::MissingDelimiter));
        assert_eq!(err.status(), StatusOutcome::BadRequest);
    }

    #[test]
    fn zero_bytes_is_bad_request() {
        let err = parse_payload(b"").unwrap_err();
        assert!(matches!(err, RequestError::Empty));
        assert_eq!(err.status(), StatusOutcome::BadRequest);
    }

    #[test]
    fn empty_body_is_bad_request() {
        let err = parse_payload(b"POST / HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, RequestError::EmptyBody));
        assert_eq!(err.status(), StatusOutcome::BadRequest);
    }

    #[test]
    fn invalid_utf8_is_bad_request() {
        let err = parse_payload(b"POST /\r\n\r\n{\"title\":\"\xff\xfe\"}").unwrap_err();
        assert!(matches!(err, RequestError::InvalidUtf8(_)));
        assert_eq!(err.status(), StatusOutcome::BadRequest);
    }

    #[test]
    fn malformed_json_is_internal_error() {
        let err = parse_payload(b"POST /\r\n\r\n{\"command\":").unwrap_err();
        assert!(matches!(err, RequestError::MalformedPayload(_)));
        assert_eq!(err.status(), StatusOutcome::InternalError);
    }

    #[test]
    fn content_length_does_not_change_the_body() {
        let short = b"POST /\r\nContent-Length: 3\r\n\r\n{\"a\":12}";
        assert_eq!(parse_payload(short).unwrap(), json!({"a": 12}));

        let long = b"POST /\r\nContent-Length: 400\r\n\r\n{\"a\":12}";
        assert_eq!(parse_payload(long).unwrap(), json!({"a": 12}));
    }

    #[test]
    fn waits_for_announced_body_only() {
        // no delimiter yet: answered as-is, not waited on
        assert!(!awaiting_body(b"POST / HTTP/1.1\r\nHost: x"));
        assert!(!awaiting_body(b"POST /\r\n\r\n{}"));
        assert!(awaiting_body(b"POST /\r\ncontent-length: 10\r\n\r\n{\"a\":"));
        assert!(!awaiting_body(b"POST /\r\nCONTENT-LENGTH: 6\r\n\r\n{\"a\":1}"));
    }
}
