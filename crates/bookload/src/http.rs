//! HTTP capability consumed by the engine.
//!
//! The engine only sees the [`HttpClient`] trait. [`ReqwestClient`] is the
//! production transport (feature `reqwest`); tests substitute scripted
//! in-memory clients.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET method
    #[default]
    Get,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP DELETE method
    Delete,
    /// HTTP PATCH method
    Patch,
    /// HTTP HEAD method
    Head,
    /// HTTP OPTIONS method
    Options,
}

impl HttpMethod {
    /// Method name as sent on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Header name/value pairs, in send order
    pub headers: Vec<(String, String)>,
    /// Body, if any
    pub body: Option<String>,
}

impl HttpRequest {
    /// Value of the first header named `name` (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response with its measured latency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Body text
    pub body: String,
    /// Time from dispatch to full body
    pub latency: Duration,
}

/// Transport capability: send one request, get one response or a
/// transport error
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Join a base URL and a path with exactly one `/` between them.
///
/// Paths that are already absolute URLs are returned unchanged.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use super::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    /// [`HttpClient`] backed by a pooled `reqwest::Client`
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
        timeout: Duration,
    }

    impl ReqwestClient {
        /// Create a client with the given per-request timeout
        pub fn new(timeout: Duration) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(Self { client, timeout })
        }

        /// Wrap an existing client (for custom TLS, proxies, etc.)
        pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
            Self { client, timeout }
        }

        fn map_error(&self, err: &reqwest::Error) -> TransportError {
            if err.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else if err.is_connect() {
                TransportError::Connect(err.to_string())
            } else if err.is_body() || err.is_decode() {
                TransportError::Body(err.to_string())
            } else {
                TransportError::Other(err.to_string())
            }
        }
    }

    fn to_reqwest(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut builder = self
                .client
                .request(to_reqwest(request.method), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let start = Instant::now();
            let resp = builder.send().await.map_err(|e| self.map_error(&e))?;
            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = resp.text().await.map_err(|e| self.map_error(&e))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
                latency: start.elapsed(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&HttpMethod::Put).unwrap();
        assert_eq!(json, "\"PUT\"");
        let back: HttpMethod = serde_json::from_str("\"PATCH\"").unwrap();
        assert_eq!(back, HttpMethod::Patch);
    }

    #[test]
    fn test_join_url() {
        let base = "https://restful-booker.herokuapp.com";
        assert_eq!(join_url(base, "/auth"), format!("{base}/auth"));
        let slashed = format!("{base}/");
        assert_eq!(join_url(&slashed, "/auth"), format!("{base}/auth"));
        assert_eq!(join_url(base, "ping"), format!("{base}/ping"));
        assert_eq!(join_url(base, ""), base);
        assert_eq!(join_url(base, "http://other/x"), "http://other/x");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest {
            method: HttpMethod::Put,
            url: "http://localhost/booking/1".to_string(),
            headers: vec![("Cookie".to_string(), "token=abc".to_string())],
            body: None,
        };
        assert_eq!(request.header("cookie"), Some("token=abc"));
        assert_eq!(request.header("Accept"), None);
    }
}
