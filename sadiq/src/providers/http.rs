//! Shared request plumbing for HTTP providers.

use serde_json::Value;
use tracing::{debug, warn};

use super::ApiClient;
use crate::error::LlmError;

/// POST a JSON body to `path` under the client's base URL and decode the
/// JSON reply, retrying rate-limit and network failures.
pub(crate) async fn post_json<C: ApiClient>(
    client: &C,
    path: &str,
    body: &Value,
) -> Result<Value, LlmError> {
    let url = format!("{}{path}", client.base_url().trim_end_matches('/'));
    let retry = client.retry_config();
    let mut attempt = 0;

    loop {
        match send_once(client, &url, body).await {
            Ok(json) => return Ok(json),
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    provider = client.provider(),
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.with_provider(client.provider())),
        }
    }
}

async fn send_once<C: ApiClient>(client: &C, url: &str, body: &Value) -> Result<Value, LlmError> {
    debug!(provider = client.provider(), %url, "sending request");

    let response = client
        .http_client()
        .post(url)
        .headers(client.auth_headers())
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::from_status(client.provider(), status, error_text));
    }

    Ok(response.json::<Value>().await?)
}

/// Scripted HTTP server for provider tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Serve `replies` in order, one per request, repeating the last one.
    /// Returns the base URL and a counter of requests received.
    pub(crate) async fn scripted_server(
        replies: Vec<(u16, &'static str)>,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = replies[n.min(replies.len() - 1)];
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let head = format!(
                        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(body.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{addr}"), hits)
    }

    /// Consume headers and body so closing the socket does not reset it.
    async fn read_request(socket: &mut TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0_u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);

            let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return;
            }
        }
    }

    /// A base URL nothing listens on.
    pub(crate) async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::testing::{closed_port, scripted_server};
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::LlmErrorKind;
    use crate::providers::OllamaClient;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    fn client(base_url: &str, retry: RetryConfig) -> OllamaClient {
        OllamaClient::builder()
            .base_url(base_url)
            .retry(retry)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let (url, hits) =
            scripted_server(vec![(429, r#"{"error":"slow down"}"#), (200, r#"{"ok":true}"#)]).await;

        let reply = post_json(&client(&url, fast_retry(3)), "/api/chat", &json!({}))
            .await
            .unwrap();
        assert_eq!(reply["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let (url, hits) = scripted_server(vec![(401, r#"{"error":"bad key"}"#)]).await;

        let err = post_json(&client(&url, fast_retry(3)), "/api/chat", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert_eq!(err.provider.as_deref(), Some("ollama"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_gives_up_on_first_rate_limit() {
        let (url, hits) =
            scripted_server(vec![(429, r#"{"error":"slow down"}"#), (200, r#"{"ok":true}"#)]).await;

        let err = post_json(&client(&url, RetryConfig::none()), "/api/chat", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_keeps_status() {
        let (url, hits) = scripted_server(vec![(500, "model crashed")]).await;

        let err = post_json(&client(&url, fast_retry(3)), "/api/chat", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::HttpStatus);
        assert_eq!(err.code.as_deref(), Some("500"));
        assert!(err.message.contains("model crashed"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let url = closed_port().await;

        let err = post_json(&client(&url, fast_retry(2)), "/api/chat", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Network);
        assert_eq!(err.provider.as_deref(), Some("ollama"));
    }
}
