//! Calling other services by name.
//!
//! ```rust,no_run
//! # async fn demo() -> estate_common::Result<()> {
//! use estate_registry_client::{RegistryClientConfig, ServiceClient, ServiceClientOptions, ServiceRequest};
//! use serde_json::Value;
//!
//! let client = ServiceClient::new(
//!     &RegistryClientConfig::new("http://registry:3000"),
//!     ServiceClientOptions::for_version("^1.0.0"),
//! );
//!
//! let listing: Value = client
//!     .call_service("listings", ServiceRequest::get("/listings/42"), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every failure comes back as one [`Error`] with a numeric status and a JSON
//! payload. A missing service is [`Error::ServiceNotFound`] (404), a rejected
//! status is [`Error::Http`] carrying the downstream status and body, and
//! anything else (connect, timeout, undecodable body) is
//! [`Error::Transport`] (500).

use estate_common::{Error, Result, ServiceRecord};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::{HttpRegistryApi, RegistryApi};
use crate::config::{RegistryClientConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::http::{parse_uri, HttpTransport};

pub use crate::http::ServiceResponse;

/// Decides which response statuses count as success.
pub type StatusPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Behaviour shared by every call a [`ServiceClient`] makes.
#[derive(Clone)]
pub struct ServiceClientOptions {
    /// Version range used when a call does not name one. This is the
    /// caller's own declared version, so services on the same line find
    /// each other unless a call asks otherwise.
    pub default_version: String,

    /// Bound on each downstream call
    pub timeout: Duration,

    /// Statuses outside this predicate become [`Error::Http`]
    pub accept_status: StatusPredicate,
}

impl fmt::Debug for ServiceClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClientOptions")
            .field("default_version", &self.default_version)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ServiceClientOptions {
    /// Options for a caller whose own version is `version`. Accepts 2xx and
    /// bounds calls by the default request timeout.
    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            default_version: version.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            accept_status: Arc::new(|status: StatusCode| status.is_success()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_accept_status<F>(mut self, accept: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.accept_status = Arc::new(accept);
        self
    }
}

/// A request relative to whatever instance the name resolves to.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    invalid: Option<String>,
}

impl ServiceRequest {
    /// `path` is relative, e.g. `/listings/42`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        Self {
            method,
            path,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            invalid: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a header. Invalid names or values fail the call when it is sent.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => {
                self.invalid = Some(format!("invalid header {}: {}", name, value));
            }
        }
        self
    }

    /// Replaces all headers, e.g. when forwarding a request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// JSON body; also sets `content-type`.
    pub fn json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// Raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path plus encoded query string.
    pub fn path_and_query(&self) -> Result<String> {
        if self.query.is_empty() {
            return Ok(self.path.clone());
        }

        let encoded = serde_urlencoded::to_string(&self.query)
            .map_err(|e| Error::validation("query", e.to_string()))?;
        let separator = if self.path.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}{}", self.path, separator, encoded))
    }

    fn into_http(self, base_url: &str) -> Result<Request<Full<Bytes>>> {
        if let Some(problem) = &self.invalid {
            return Err(Error::validation("headers", problem.clone()));
        }

        let uri = parse_uri(&format!("{}{}", base_url, self.path_and_query()?))?;
        let mut request = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(self.body))
            .map_err(|e| Error::transport(format!("Failed to build request: {}", e)))?;

        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// Resolves service names through the registry and calls them.
#[derive(Clone)]
pub struct ServiceClient {
    registry: Arc<dyn RegistryApi>,
    transport: HttpTransport,
    options: ServiceClientOptions,
}

impl ServiceClient {
    pub fn new(config: &RegistryClientConfig, options: ServiceClientOptions) -> Self {
        Self::with_api(Arc::new(HttpRegistryApi::new(config)), options)
    }

    pub fn with_api(registry: Arc<dyn RegistryApi>, options: ServiceClientOptions) -> Self {
        Self {
            registry,
            transport: HttpTransport::new(options.timeout),
            options,
        }
    }

    pub fn options(&self) -> &ServiceClientOptions {
        &self.options
    }

    /// Resolves one live instance. `version` defaults to the caller's own
    /// version, [`ServiceClientOptions::default_version`].
    pub async fn get_service(&self, name: &str, version: Option<&str>) -> Result<ServiceRecord> {
        let version = version.unwrap_or(&self.options.default_version);
        self.registry.find(name, version).await
    }

    /// Every live instance. For diagnostics, not routing.
    pub async fn get_services(&self) -> Result<Vec<ServiceRecord>> {
        self.registry.services().await
    }

    /// Resolves `name`, sends `request` to it and decodes the JSON body.
    pub async fn call_service<T: DeserializeOwned>(
        &self,
        name: &str,
        request: ServiceRequest,
        version: Option<&str>,
    ) -> Result<T> {
        self.call_service_with_response(name, request, version)
            .await?
            .json()
    }

    /// Like [`call_service`](Self::call_service) but returns status, headers
    /// and raw body, for callers that forward the response.
    pub async fn call_service_with_response(
        &self,
        name: &str,
        request: ServiceRequest,
        version: Option<&str>,
    ) -> Result<ServiceResponse> {
        let record = self.get_service(name, version).await?;
        let method = request.method().clone();
        let http_request = request.into_http(&record.base_url())?;

        debug!("Calling {} at {}: {} {}", name, record.base_url(), method, http_request.uri());

        let response = self.transport.send(http_request).await?;
        if !(self.options.accept_status)(response.status) {
            debug!("{} answered {} which is not accepted", name, response.status);
            return Err(response.into_error());
        }

        Ok(response)
    }
}
