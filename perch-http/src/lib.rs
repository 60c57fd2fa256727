//! Minimal HTTP client with safe logging, retries, and OAuth 1.0a signing.
//!
//! - Request options: `Auth`, query params, timeout, retries
//! - Rate-limit responses (429) are waited out in place, honouring
//!   `Retry-After` / `x-rate-limit-reset`, and never surface to callers
//! - 5xx responses retry with exponential backoff up to the retry budget
//! - Long-lived line-delimited response streams via [`HttpClient::open_line_stream`]
//! - Optional *raw* request/response logging via `PERCH_HTTP_RAW=1`
//!
//! Example:
//! ```rust
//! # async fn demo() -> Result<(), perch_http::HttpError> {
//! let client = perch_http::HttpClient::new("https://api.twitter.com")?;
//! let got: serde_json::Value = client
//!     .get_json("1.1/statuses/user_timeline.json", perch_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Security: signing secrets live in [`oauth::OAuth1Keys`] and are redacted
//! from `Debug`; logs only ever include the auth kind, never key material.

use std::borrow::Cow;
use std::env;
use std::time::Duration;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;

pub mod oauth;

pub use oauth::OAuth1Keys;
pub use reqwest::{Method, StatusCode};

// ==============================
// Raw logging toggle
// ==============================

const RAW_ENV: &str = "PERCH_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url) -> String {
    format!(
        "curl -X{} -H 'Authorization: OAuth <redacted>' '{}'",
        method,
        url.as_str()
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Sign the request with OAuth 1.0a user-context keys.
    OAuth1(&'a OAuth1Keys),
    None,
}

/// Per-request tuning knobs.
///
/// ```
/// use perch_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>, // e.g. [("count", "200".into())]
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use perch_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.twitter.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// GET a JSON resource with per-request options.
    ///
    /// Rate limiting is invisible here: a 429 puts the call to sleep until
    /// the window resets, then the request is re-signed and re-sent without
    /// consuming the retry budget.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let mut attempt = 0usize;

        loop {
            let rb = self.build_request(Method::GET, &url, &opts, Some(timeout))?;

            let req_id = short_request_id();
            let auth_kind = match &opts.auth {
                Some(Auth::OAuth1(_)) => "oauth1",
                Some(Auth::None) | None => "none",
            };
            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                host_path=%format!("{}{}", url.domain().unwrap_or("-"), url.path()),
                query=?opts.query,
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                "http.request.start"
            );
            if raw_enabled() {
                tracing::debug!(target: "http.raw", %req_id, curl=%make_curl(&Method::GET, &url), "request");
            }

            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%request_id,
                rate_limit.limit=?header_str(&headers, "x-rate-limit-limit"),
                rate_limit.remaining=?header_str(&headers, "x-rate-limit-remaining"),
                rate_limit.reset=?header_str(&headers, "x-rate-limit-reset"),
                "http.response.headers"
            );

            let snippet = snip_body(&bytes);
            if raw_enabled() {
                let mut body = String::from_utf8_lossy(&bytes).into_owned();
                let truncated = body.len() > RAW_MAX_BODY;
                if truncated {
                    body.truncate(RAW_MAX_BODY);
                }
                tracing::info!(target: "http.raw", %req_id, status=%status, body=%body, truncated, "response");
            }

            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id=%req_id,
                        serde_err=%e.to_string(),
                        body_snippet=%snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);

            if status == StatusCode::TOO_MANY_REQUESTS {
                // Blocking wait until the rate window opens again; does not
                // count against the retry budget.
                let delay = rate_limit_delay(&headers);
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    wait_ms=delay.as_millis() as u64,
                    message=%message,
                    "http.rate_limited.waiting"
                );
                sleep(delay).await;
                continue;
            }

            if status.is_server_error() && attempt < max_retries {
                attempt += 1;
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%request_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }
    }

    /// Open a long-lived response and return its payloads one line at a time.
    ///
    /// The connection is attempted once (no retries); a non-success status
    /// is returned as [`HttpError::Api`] so the caller can decide whether
    /// the subscription should be reopened. Blank keep-alive lines are
    /// filtered out. No per-request timeout is applied; the stream lives
    /// until the remote closes it or the caller drops it.
    pub async fn open_line_stream(
        &self,
        method: Method,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<BoxStream<'static, Result<String, HttpError>>, HttpError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let rb = self.build_request(method.clone(), &url, &opts, None)?;

        tracing::debug!(
            method=%method,
            host_path=%format!("{}{}", url.domain().unwrap_or("-"), url.path()),
            query=?opts.query,
            "http.stream.connect"
        );
        if raw_enabled() {
            tracing::debug!(target: "http.raw", curl=%make_curl(&method, &url), "request");
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;
        let status = resp.status();

        if !status.is_success() {
            let request_id = resp
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let bytes = resp.bytes().await.unwrap_or_default();
            let message = extract_error_message(&bytes);
            tracing::warn!(%status, message=%message, "http.stream.refused");
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }

        tracing::info!(%status, "http.stream.open");
        let mut body = resp.bytes_stream();

        let lines = try_stream! {
            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| HttpError::Network(e.to_string()))?;
                buf.extend_from_slice(&chunk);
                while let Some(line) = take_line(&mut buf) {
                    if !line.is_empty() {
                        yield line;
                    }
                }
            }
            // Any unterminated trailing bytes die with the connection.
        };
        Ok(lines.boxed())
    }

    fn build_request(
        &self,
        method: Method,
        url: &Url,
        opts: &RequestOpts<'_>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::RequestBuilder, HttpError> {
        let mut rb = self.inner.request(method.clone(), url.clone());
        if let Some(t) = timeout {
            rb = rb.timeout(t);
        }
        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        if let Some(Auth::OAuth1(keys)) = &opts.auth {
            // Fresh nonce/timestamp per attempt; signing covers the query.
            let empty = Vec::new();
            let query = opts.query.as_ref().unwrap_or(&empty);
            let header = oauth::authorization_header(keys, &method, url, query)?;
            rb = rb.header(AUTHORIZATION, header);
        }
        Ok(rb)
    }
}

// ==============================
// Helpers
// ==============================

fn short_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.min(8) - 1)))
}

/// How long to sleep on a 429: `Retry-After`, else the window reset header,
/// else a one-minute default.
fn rate_limit_delay(headers: &HeaderMap) -> Duration {
    if let Some(secs) = header_str(headers, RETRY_AFTER.as_str()).and_then(|v| v.parse().ok()) {
        return Duration::from_secs(secs).max(Duration::from_secs(1));
    }
    if let Some(reset) = header_str(headers, "x-rate-limit-reset").and_then(|v| v.parse::<u64>().ok())
    {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        return Duration::from_secs(reset.saturating_sub(now).max(1));
    }
    Duration::from_secs(60)
}

fn extract_error_message(body: &[u8]) -> String {
    // {"errors":[{"code":88,"message":"Rate limit exceeded"}]}
    #[derive(Deserialize)]
    struct ErrorsEnv {
        errors: Vec<ErrorDetail>,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(default)]
        message: String,
        #[serde(default)]
        code: Option<i64>,
    }

    // {"error":"Not authorized."}
    #[derive(Deserialize)]
    struct Single {
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<ErrorsEnv>(body) {
        if let Some(first) = env.errors.into_iter().next() {
            if !first.message.is_empty() {
                return match first.code {
                    Some(code) => format!("{} (code {})", first.message, code),
                    None => first.message,
                };
            }
        }
    }
    if let Ok(single) = serde_json::from_slice::<Single>(body) {
        if !single.error.is_empty() {
            return single.error;
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        snip.truncate(500);
        snip.push_str("...");
    }
    snip
}

/// Split one newline-terminated line off the front of `buf`, stripping the
/// terminator and any trailing carriage return.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_line_splits_and_keeps_remainder() {
        let mut buf = b"first\nsecond\r\npart".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some("first"));
        assert_eq!(take_line(&mut buf).as_deref(), Some("second"));
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(buf, b"part");
    }

    #[test]
    fn take_line_yields_empty_for_keepalive() {
        let mut buf = b"\r\n{\"a\":1}\n".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some(""));
        assert_eq!(take_line(&mut buf).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn error_message_prefers_errors_array() {
        let body = br#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#;
        assert_eq!(extract_error_message(body), "Rate limit exceeded (code 88)");
    }

    #[test]
    fn error_message_falls_back_to_single_error() {
        let body = br#"{"request":"/1.1/x.json","error":"Not authorized."}"#;
        assert_eq!(extract_error_message(body), "Not authorized.");
    }

    #[test]
    fn error_message_falls_back_to_snippet() {
        assert_eq!(extract_error_message(b"plain text"), "plain text");
    }
}
