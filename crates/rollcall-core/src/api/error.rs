use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Rejected by server: {0}")]
    Validation(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Map a transport error. reqwest does not report the configured
    /// duration on timeouts, so the caller passes it in.
    pub fn from_transport(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(timeout)
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::NetworkError(e.to_string())
        }
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// The server answers errors as `{"error": "..."}`; fall back to the raw body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::error_message(body);
        match status.as_u16() {
            400 | 409 | 422 => ApiError::Validation(message),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            408 => ApiError::NetworkError(format!("Status {}: {}", status, message)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// Whether the call could not complete (and may succeed later unchanged),
    /// as opposed to the server having looked at the request and refused it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_)
                | ApiError::Timeout(_)
                | ApiError::RateLimited
                | ApiError::ServerError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"Field 'student_id' is required"}"#),
            ApiError::Validation(ref m) if m == "Field 'student_id' is required"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "nope"),
            ApiError::Validation(_)
        ));
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_status(StatusCode::NOT_FOUND, ""), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::RateLimited));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"Database connection failed"}"#),
            ApiError::ServerError(ref m) if m == "Database connection failed"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_is_transient() {
        assert!(ApiError::NetworkError("connection refused".into()).is_transient());
        assert!(ApiError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(ApiError::ServerError("boom".into()).is_transient());
        assert!(!ApiError::Validation("bad".into()).is_transient());
        assert!(!ApiError::NotFound("x".into()).is_transient());
        assert!(!ApiError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_truncate_body() {
        let body = "é".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
