//! HTTP transport.
//!
//! Executes a single API request with auth, timeout, bounded retry, and
//! content-type dispatch. Everything above this layer works in terms of
//! [`Payload`]; everything below is `reqwest`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::limits::Direction;

/// Total attempts per request, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Backoff parameters: 1 s base, tripling per attempt, capped at 30 s.
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 30_000;
const BACKOFF_FACTOR: f64 = 3.0;

/// HTTP method subset the API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Which limiter bucket this method draws from.
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            Method::Get | Method::Head => Direction::Read,
            _ => Direction::Write,
        }
    }

    /// Whether this method mutates the instance.
    #[must_use]
    pub fn is_write(self) -> bool {
        self.direction() == Direction::Write
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-built request: absolute URL, query already merged by the gateway.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl PreparedRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Decoded response body, dispatched on the content-type prefix.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Xml(String),
    Bytes(Vec<u8>),
    /// 201/204 success with no body required.
    Empty,
}

impl Payload {
    /// Unwrap a JSON payload or fail with a protocol error.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Empty => Ok(Value::Null),
            other => Err(Error::protocol(format!(
                "expected a JSON body, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Unwrap an XML payload or fail with a protocol error.
    pub fn into_xml(self) -> Result<String> {
        match self {
            Payload::Xml(text) => Ok(text),
            other => Err(Error::protocol(format!(
                "expected an XML body, got {}",
                other.kind_name()
            ))),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Payload::Json(_) => "JSON",
            Payload::Xml(_) => "XML",
            Payload::Bytes(_) => "binary",
            Payload::Empty => "an empty response",
        }
    }
}

/// Seam between the gateway and the wire. The production implementation is
/// [`HttpTransport`]; tests and the demo instance substitute scripted ones.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: PreparedRequest) -> Result<Payload>;
}

/// Production transport over `reqwest` with HTTP Basic auth.
pub struct HttpTransport {
    client: reqwest::Client,
    username: String,
    password: String,
    debug: bool,
}

impl HttpTransport {
    /// Build the transport from a validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            debug: config.debug,
        })
    }

    async fn send_once(
        &self,
        request: &PreparedRequest,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), &request.url)
            .basic_auth(&self.username, Some(&self.password));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        builder.send().await
    }

    async fn dispatch(&self, request: &PreparedRequest, response: reqwest::Response) -> Result<Payload> {
        let status = response.status();

        if status == StatusCode::CREATED || status == StatusCode::NO_CONTENT {
            return Ok(Payload::Empty);
        }

        if status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorised {
                user: self.username.clone(),
                method: request.method.to_string(),
                url: request.url.clone(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                method: request.method.to_string(),
                url: request.url.clone(),
                message: server_error_message(&body),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("application/json") {
            let body = response.text().await.map_err(read_failure)?;
            if body.is_empty() {
                return Err(Error::protocol(format!(
                    "{} {} returned 200 with an empty body",
                    request.method, request.url
                )));
            }
            let value: Value = serde_json::from_str(&body)
                .map_err(|e| Error::protocol(format!("malformed JSON body: {e}")))?;
            Ok(Payload::Json(value))
        } else if content_type.starts_with("text/xml") {
            let body = response.text().await.map_err(read_failure)?;
            if body.is_empty() {
                return Err(Error::protocol(format!(
                    "{} {} returned 200 with an empty body",
                    request.method, request.url
                )));
            }
            Ok(Payload::Xml(body))
        } else {
            // attachment file downloads: pass the bytes through untouched
            let bytes = response.bytes().await.map_err(read_failure)?;
            Ok(Payload::Bytes(bytes.to_vec()))
        }
    }
}

fn read_failure(err: reqwest::Error) -> Error {
    Error::protocol(format!("failed to read response body: {err}"))
}

/// Pull `{error:{message,detail}}` out of an error body when present.
fn server_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(error) = value.get("error") {
            let message = error.get("message").and_then(Value::as_str).unwrap_or("");
            let detail = error.get("detail").and_then(Value::as_str).unwrap_or("");
            if !message.is_empty() || !detail.is_empty() {
                return format!("{message}: {detail}");
            }
        }
    }
    body.to_string()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<Payload> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if self.debug {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    attempt,
                    "sending request"
                );
            }

            match self.send_once(&request).await {
                Ok(response) => {
                    let status = response.status();

                    if self.debug {
                        debug!(url = %request.url, status = %status, attempt, "received response");
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= MAX_ATTEMPTS {
                            return Err(Error::Status {
                                status: 429,
                                method: request.method.to_string(),
                                url: request.url.clone(),
                                message: "Too many retries".to_string(),
                            });
                        }
                        let wait = backoff_delay(attempt);
                        warn!(
                            url = %request.url,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            "rate limited (429), backing off"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    return self.dispatch(&request, response).await;
                }
                Err(e) if is_retryable(&e) && attempt < MAX_ATTEMPTS => {
                    let wait = backoff_delay(attempt);
                    warn!(
                        url = %request.url,
                        error = %e,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "transient transport failure, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    return Err(Error::transport(
                        format!("{} {}", request.method, request.url),
                        attempt,
                        e,
                    ));
                }
            }
        }
    }
}

/// Connection reset, DNS temporary failure, and connect timeout retry;
/// everything else is terminal.
fn is_retryable(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Exponential backoff with a 50% jitter band: the nominal delay for
/// attempt `n` is `min(cap, base * 3^(n-1))`, scaled by `[0.5, 1.5)`.
fn backoff_delay(attempt: u32) -> Duration {
    let nominal = (BACKOFF_BASE_MS as f64 * BACKOFF_FACTOR.powi(attempt.saturating_sub(1) as i32))
        .min(BACKOFF_CAP_MS as f64);
    Duration::from_millis((nominal * (0.5 + jitter_unit())) as u64)
}

/// Cheap jitter source in `[0, 1)`; no need for a real RNG here.
fn jitter_unit() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (f64::from(nanos) / f64::from(u32::MAX)).fract()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_direction() {
        assert_eq!(Method::Get.direction(), Direction::Read);
        assert_eq!(Method::Head.direction(), Direction::Read);
        assert_eq!(Method::Post.direction(), Direction::Write);
        assert_eq!(Method::Put.direction(), Direction::Write);
        assert_eq!(Method::Delete.direction(), Direction::Write);
    }

    #[test]
    fn backoff_stays_in_jitter_band() {
        for attempt in 1..=4 {
            let nominal = (BACKOFF_BASE_MS as f64
                * BACKOFF_FACTOR.powi(attempt as i32 - 1))
            .min(BACKOFF_CAP_MS as f64);
            let delay = backoff_delay(attempt).as_millis() as f64;
            assert!(
                delay >= nominal * 0.5 && delay <= nominal * 1.5,
                "attempt {attempt}: {delay} outside [{}, {}]",
                nominal * 0.5,
                nominal * 1.5
            );
        }
    }

    #[test]
    fn backoff_caps_at_thirty_seconds() {
        // attempt 5 is nominally 81 s, which the cap pulls down to 30 s
        let delay = backoff_delay(5);
        assert!(delay <= Duration::from_millis(45_000));
    }

    #[test]
    fn server_error_message_combines_fields() {
        let body = r#"{"error":{"message":"Operation Failed","detail":"ACL denied"}}"#;
        assert_eq!(server_error_message(body), "Operation Failed: ACL denied");

        // non-JSON bodies come back verbatim
        assert_eq!(server_error_message("<html>Bad Gateway</html>"), "<html>Bad Gateway</html>");
    }

    #[test]
    fn payload_unwrapping() {
        assert!(Payload::Json(serde_json::json!({})).into_json().is_ok());
        assert!(Payload::Xml("<a/>".into()).into_json().is_err());
        assert!(Payload::Xml("<a/>".into()).into_xml().is_ok());
        assert!(Payload::Empty.into_json().unwrap().is_null());
    }
}
