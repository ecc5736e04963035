//! Shared HTTP transport.
//!
//! A thin wrapper over the hyper legacy client that bounds every exchange
//! (request plus body) by one timeout and collects the body into memory.
//! Status codes are not interpreted here; callers decide which ones are
//! acceptable.

use estate_common::{Error, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ServiceResponse {
    /// Decodes the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let decoded = if self.body.is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };

        decoded.map_err(|e| Error::transport(format!("Failed to parse response body: {}", e)))
    }

    /// Body as a JSON value for error payloads. Non-JSON bodies become a
    /// string, empty ones `null`.
    pub fn error_body(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }

        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }

    /// Converts a non-accepted response into [`Error::Http`].
    pub fn into_error(self) -> Error {
        Error::http(self.status.as_u16(), self.error_body())
    }
}

/// Timeout-bounded HTTP/1 client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a prepared request and reads the whole response.
    ///
    /// Connection failures, timeouts and body read errors become
    /// [`Error::Transport`]. Any status is returned as-is.
    pub async fn send(&self, request: Request<Full<Bytes>>) -> Result<ServiceResponse> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        debug!("{} {}", method, uri);

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| Error::transport(format!("HTTP request to {} failed: {}", uri, e)))?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| Error::transport(format!("Failed to read response from {}: {}", uri, e)))?
                .to_bytes();

            Ok(ServiceResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::transport(format!(
                "{} {} timed out after {:?}",
                method, uri, self.timeout
            ))),
        }
    }

    /// Sends `body` as JSON.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: &T,
    ) -> Result<ServiceResponse> {
        let body = serde_json::to_vec(body)
            .map_err(|e| Error::transport(format!("Failed to serialize request: {}", e)))?;

        let request = Request::builder()
            .method(method)
            .uri(parse_uri(url)?)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| Error::transport(format!("Failed to build request: {}", e)))?;

        self.send(request).await
    }

    pub async fn get(&self, url: &str) -> Result<ServiceResponse> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(parse_uri(url)?)
            .body(Full::new(Bytes::new()))
            .map_err(|e| Error::transport(format!("Failed to build request: {}", e)))?;

        self.send(request).await
    }
}

pub(crate) fn parse_uri(url: &str) -> Result<Uri> {
    url.parse()
        .map_err(|e| Error::transport(format!("Invalid URI {}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &'static str) -> ServiceResponse {
        ServiceResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_error_body_shapes() {
        assert_eq!(response(500, "").error_body(), Value::Null);
        assert_eq!(response(500, "boom").error_body(), json!("boom"));
        assert_eq!(response(404, r#"{"detail":"x"}"#).error_body(), json!({"detail": "x"}));
    }

    #[test]
    fn test_into_error_keeps_status_and_body() {
        let err = response(418, r#"{"detail":"teapot"}"#).into_error();
        assert_eq!(err.status(), 418);
        assert_eq!(err.payload(), json!({"detail": "teapot"}));
    }

    #[test]
    fn test_json_of_empty_body() {
        let value: Option<String> = response(204, "").json().unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_invalid_uri() {
        assert!(matches!(parse_uri("not a uri"), Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(2));
        let err = transport.get(&format!("http://{}/health", addr)).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.status(), 500);
    }
}
