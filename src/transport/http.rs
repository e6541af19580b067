//! reqwest-backed transport with bounded retries.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Auth, ByteStream, HttpRequest, HttpTransport, RetryPolicy};
use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("parallel-web/", env!("CARGO_PKG_VERSION"));

/// Production transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    pub fn new(retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, retry })
    }

    /// Reuse an existing client (shared connection pool)
    pub fn with_client(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Issue one POST and fail on non-2xx
    async fn send_once(&self, request: &HttpRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body);

        builder = match &request.auth {
            Auth::Bearer(key) => builder.bearer_auth(key.expose()),
            Auth::Header { name, key } => builder.header(*name, key.expose()),
        };

        if request.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, request.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: vendor_error_message(status, &text),
        })
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent
    async fn with_retry<T, F, Fut>(&self, request: &HttpRequest, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let started = Instant::now();
            match op().await {
                Ok(value) => {
                    debug!(
                        url = %request.url,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request succeeded"
                    );
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        url = %request.url,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(url = %request.url, attempt, error = %err, "request failed");
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<Value> {
        let req = &request;
        self.with_retry(req, move || async move {
            let response = self.send_once(req).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| classify(e, req.timeout))?;
            serde_json::from_slice(&bytes).map_err(Error::from)
        })
        .await
    }

    async fn post_stream(&self, request: HttpRequest) -> Result<ByteStream> {
        let req = &request;
        // Only connection setup is retried; once bytes flow the caller owns them
        let response = self
            .with_retry(req, move || async move { self.send_once(req).await })
            .await?;

        let timeout = request.timeout;
        let body = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| classify(e, timeout))
        });

        Ok(Box::pin(body))
    }
}

/// Map a reqwest failure onto the error taxonomy
fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else if err.is_builder() {
        Error::Configuration(format!("Invalid request: {}", err))
    } else if err.is_decode() {
        Error::Decode(err.to_string())
    } else {
        Error::Connection(err.to_string())
    }
}

/// Pull the vendor's message out of an error body.
///
/// Understands `{"error": {"message", "type", "code"}}`, `{"error": "..."}`,
/// `{"message": "..."}` and `{"detail": "..."}`; otherwise falls back to the
/// raw body, then the status reason.
pub(crate) fn vendor_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = message_from_json(&json) {
            return msg;
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

fn message_from_json(json: &Value) -> Option<String> {
    match json.get("error") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(err @ Value::Object(_)) => {
            let msg = err.get("message").and_then(Value::as_str).unwrap_or("");
            let ty = err.get("type").and_then(Value::as_str).unwrap_or("");
            let code = match err.get("code") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };

            let parts: Vec<&str> = [ty, code.as_str(), msg]
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect();
            if !parts.is_empty() {
                return Some(parts.join(": "));
            }
        }
        _ => {}
    }

    ["message", "detail"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ApiKey;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn instant_retries(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    fn search_request(url: String, stream: bool) -> HttpRequest {
        HttpRequest {
            url,
            auth: Auth::Header {
                name: "x-api-key",
                key: ApiKey::new("test-key"),
            },
            body: serde_json::json!({"objective": "x"}),
            timeout: Duration::from_secs(5),
            stream,
        }
    }

    /// Read one request (headers plus Content-Length body)
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    /// Serve one scripted response per connection and count the hits
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/v1beta/search", addr), hits)
    }

    const OVERLOADED: &str = r#"{"error": {"message": "overloaded"}}"#;

    #[test]
    fn test_vendor_error_message_shapes() {
        let status = StatusCode::UNAUTHORIZED;
        assert_eq!(
            vendor_error_message(
                status,
                r#"{"error": {"message": "Invalid API key", "type": "auth_error"}}"#
            ),
            "auth_error: Invalid API key"
        );
        assert_eq!(
            vendor_error_message(status, r#"{"error": {"message": "bad", "code": 42}}"#),
            "42: bad"
        );
        assert_eq!(
            vendor_error_message(status, r#"{"error": "quota exceeded"}"#),
            "quota exceeded"
        );
        assert_eq!(
            vendor_error_message(status, r#"{"detail": "objective too long"}"#),
            "objective too long"
        );
        assert_eq!(
            vendor_error_message(status, "  gateway down \n"),
            "gateway down"
        );
        assert_eq!(vendor_error_message(status, ""), "Unauthorized");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = ReqwestTransport::new(RetryPolicy::none()).unwrap();
        // Port 1 is reserved and not listening
        let request = search_request("http://127.0.0.1:1/v1beta/search".into(), false);

        let err = transport.post_json(request).await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_success() {
        let responses = vec![
            (503, OVERLOADED),
            (503, OVERLOADED),
            (200, r#"{"search_id": "s", "results": []}"#),
        ];
        let (url, hits) = serve(responses).await;
        let transport = ReqwestTransport::new(instant_retries(3)).unwrap();

        let value = transport
            .post_json(search_request(url, false))
            .await
            .unwrap();
        assert_eq!(value["search_id"], "s");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let responses = vec![(503, OVERLOADED), (503, OVERLOADED), (200, "{}")];
        let (url, hits) = serve(responses).await;
        let transport = ReqwestTransport::new(instant_retries(2)).unwrap();

        let err = transport
            .post_json(search_request(url, false))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let responses = vec![
            (400, r#"{"error": {"message": "bad objective"}}"#),
            (200, "{}"),
        ];
        let (url, hits) = serve(responses).await;
        let transport = ReqwestTransport::new(instant_retries(3)).unwrap();

        let err = transport
            .post_json(search_request(url, false))
            .await
            .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad objective");
            }
            other => panic!("expected API error, got {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_retries_connection_setup() {
        let responses = vec![(503, OVERLOADED), (200, "data: hello\n\n")];
        let (url, hits) = serve(responses).await;
        let transport = ReqwestTransport::new(instant_retries(3)).unwrap();

        let mut body = transport
            .post_stream(search_request(url, true))
            .await
            .unwrap();
        let mut received = Vec::new();
        while let Some(chunk) = body.next().await {
            received.extend(chunk.unwrap());
        }

        assert_eq!(received, b"data: hello\n\n");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
