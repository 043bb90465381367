//! Failure classification
//!
//! Pure functions from what came back over the wire to an [`LlmError`];
//! classifying the same input twice always yields the same error.

use reqwest::StatusCode;

use crate::adapter::BackendAdapter;
use crate::error::LlmError;
use crate::types::BackendStatus;

/// Upper bound on response body text carried into a `BackendMessage`
const MAX_DETAIL_LEN: usize = 512;

/// Classify a completed HTTP exchange
///
/// First match wins:
/// 1. the body decodes to a non-ok backend status, mapped through the adapter's code table
/// 2. HTTP 401
/// 3. HTTP 5xx, without exposing the body
/// 4. any other non-2xx, from the status line and body
/// 5. anything else is `Unknown`
pub fn response(adapter: &dyn BackendAdapter, status: StatusCode, body: &str) -> LlmError {
    if let Some(backend) = adapter.decode(body).ok().and_then(|r| r.backend_status) {
        return backend_status(adapter, &backend);
    }

    if status == StatusCode::UNAUTHORIZED {
        return LlmError::Unauthorized(status_line(status));
    }

    if status.is_server_error() {
        return LlmError::ServerError { status: status.as_u16() };
    }

    if !status.is_success() {
        let details = body.trim();
        return if details.is_empty() {
            LlmError::BackendMessage(status_line(status))
        } else {
            LlmError::BackendMessage(format!("{}: {}", status_line(status), truncate(details, MAX_DETAIL_LEN)))
        };
    }

    LlmError::Unknown(format!("unexpected response ({})", status_line(status)))
}

/// Classify a status the backend declared inside an otherwise readable body
pub fn backend_status(adapter: &dyn BackendAdapter, status: &BackendStatus) -> LlmError {
    let message = status
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("backend error {}", status.code));

    LlmError::from_kind(adapter.error_kind(status), message)
}

/// Classify a transport failure (connect, timeout, reset, body read)
pub fn transport(err: &reqwest::Error) -> LlmError {
    if err.is_timeout() {
        return LlmError::Unknown(format!("request timed out: {err}"));
    }
    if err.is_connect() {
        return LlmError::Unknown(format!("connection failed: {err}"));
    }
    LlmError::Unknown(err.to_string())
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}

/// Truncate on a char boundary
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
