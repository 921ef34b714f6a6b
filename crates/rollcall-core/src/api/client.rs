//! HTTP client for the attendance API.
//!
//! This module provides the `ApiClient` struct, the production
//! `RemoteClient`: collection reads and the attendance write endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiError, AttendanceSubmission, ReadQuery, RemoteClient};

// ============================================================================
// Constants
// ============================================================================

/// Write endpoint for a single attendance record
const SUBMIT_ATTENDANCE_ENDPOINT: &str = "submit_attendance.php";

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Timeout for the reachability probe. Kept short so a dead network is
/// noticed well before a full request timeout.
const PROBE_TIMEOUT_SECS: u64 = 3;

/// API client for the attendance service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `https://school.example/api`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Read the body as JSON. The endpoints occasionally print PHP warnings
    /// before the payload, which lands here as an invalid response.
    async fn parse_json(&self, response: reqwest::Response, url: &str) -> Result<Value, ApiError> {
        let text = response.text().await.map_err(|e| self.map_transport_error(e))?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(url = url, error = %e, "Invalid JSON response");
            ApiError::InvalidResponse(format!("Invalid JSON from {}: {}", url, e))
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ApiError {
        ApiError::from_transport(e, self.timeout)
    }

    /// Send a request, retrying with exponential backoff while rate limited
    async fn send_with_retry(&self, url: &str, request: RequestBuilder) -> Result<Value, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let attempt = request
                .try_clone()
                .ok_or_else(|| ApiError::InvalidResponse(format!("Request to {} cannot be resent", url)))?;
            let response = attempt.send().await.map_err(|e| self.map_transport_error(e))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return self.parse_json(response, url).await,
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<Value, ApiError> {
        let request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .query(params);
        self.send_with_retry(url, request).await
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value, ApiError> {
        let request = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .json(body);
        self.send_with_retry(url, request).await
    }

    /// A 2xx body of `{"success": false, ...}` is a rejection, not a success.
    fn check_write_ack(body: &Value) -> Result<(), ApiError> {
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("error")
                .or_else(|| body.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("submission rejected")
                .to_string();
            return Err(ApiError::Validation(message));
        }
        Ok(())
    }

    // ===== Endpoints =====

    pub async fn submit_attendance(&self, submission: &AttendanceSubmission) -> Result<(), ApiError> {
        let url = self.url(SUBMIT_ATTENDANCE_ENDPOINT);
        let body = self.post(&url, submission).await?;
        Self::check_write_ack(&body)?;
        debug!(
            session_id = %submission.session_id,
            student_id = %submission.student_id,
            "Attendance accepted"
        );
        Ok(())
    }

    pub async fn fetch_collection(&self, query: &ReadQuery) -> Result<Value, ApiError> {
        let url = self.url(query.collection.endpoint());
        self.get(&url, &query.params).await
    }

    /// Whether the server answers at all. Any HTTP status counts as reachable;
    /// only transport failures count as offline.
    pub async fn is_reachable(&self) -> bool {
        let result = self
            .client
            .get(&self.base_url)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await;
        match result {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Reachability probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl RemoteClient for ApiClient {
    async fn send(&self, submission: &AttendanceSubmission) -> Result<(), ApiError> {
        self.submit_attendance(submission).await
    }

    async fn fetch(&self, query: &ReadQuery) -> Result<Value, ApiError> {
        self.fetch_collection(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const RATE_LIMITED: &str = "HTTP/1.1 429 Too Many Requests\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const ACCEPTED: &str =
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 16\r\nConnection: close\r\n\r\n{\"success\":true}";

    fn submission() -> AttendanceSubmission {
        AttendanceSubmission {
            session_id: "session-1".to_string(),
            student_id: "student-1".to_string(),
            is_present: true,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Read one request: headers, then `Content-Length` bytes of body
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer one connection per canned response and hand back the requests
    async fn serve(responses: Vec<&'static str>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            requests
        });
        (base_url, handle)
    }

    #[test]
    fn test_url_joins_base_and_endpoint() {
        let client = ApiClient::new("http://localhost/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost/api");
        assert_eq!(
            client.url(SUBMIT_ATTENDANCE_ENDPOINT),
            "http://localhost/api/submit_attendance.php"
        );
    }

    #[test]
    fn test_check_write_ack() {
        assert!(ApiClient::check_write_ack(&json!({"success": true, "message": "Attendance recorded"})).is_ok());
        // Bodies without a success flag are accepted as-is
        assert!(ApiClient::check_write_ack(&json!({"id": 42})).is_ok());

        let err = ApiClient::check_write_ack(&json!({"success": false, "error": "Unknown student"})).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Unknown student"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_transient_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.send(&submission()).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
        assert!(!client.is_reachable().await);
    }

    #[tokio::test]
    async fn test_rate_limited_submission_is_resent() {
        let (base_url, server) = serve(vec![RATE_LIMITED, ACCEPTED]).await;
        let client = ApiClient::new(base_url, Duration::from_secs(5)).unwrap();

        client.send(&submission()).await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.starts_with("POST /submit_attendance.php"));
            assert!(request.contains(r#""student_id":"student-1""#), "body missing: {request}");
        }
    }

    #[tokio::test]
    async fn test_stalled_body_reports_configured_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            // Headers arrive, the body never finishes
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n[{\"id\"")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let timeout = Duration::from_millis(300);
        let client = ApiClient::new(base_url, timeout).unwrap();
        let err = client
            .fetch_collection(&ReadQuery::new(crate::api::Collection::Sessions))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout(d) if d == timeout), "unexpected error: {err}");
        assert!(err.is_transient());
        server.abort();
    }
}
