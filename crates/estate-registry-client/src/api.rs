//! The registry's HTTP surface as seen by clients.

use async_trait::async_trait;
use estate_common::{
    Error, FindRequest, Result, ServiceRecord, ServicesResponse, UnregisteredService,
};
use hyper::{Method, StatusCode};
use tracing::debug;

use crate::config::RegistryClientConfig;
use crate::http::HttpTransport;

/// Operations the clients need from a registry.
///
/// [`HttpRegistryApi`] is the production implementation; tests substitute
/// their own.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// `PUT /register`
    async fn register(&self, service: &UnregisteredService) -> Result<UnregisteredService>;

    /// `POST /de-register`
    async fn deregister(&self, service: &UnregisteredService) -> Result<UnregisteredService>;

    /// `POST /find`. No match is [`Error::ServiceNotFound`].
    async fn find(&self, name: &str, version: &str) -> Result<ServiceRecord>;

    /// `GET /services`
    async fn services(&self) -> Result<Vec<ServiceRecord>>;
}

/// Registry API over HTTP.
#[derive(Clone)]
pub struct HttpRegistryApi {
    base_url: String,
    transport: HttpTransport,
}

impl HttpRegistryApi {
    pub fn new(config: &RegistryClientConfig) -> Self {
        Self {
            base_url: config.registry_url.trim_end_matches('/').to_string(),
            transport: HttpTransport::new(config.timeout),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RegistryApi for HttpRegistryApi {
    async fn register(&self, service: &UnregisteredService) -> Result<UnregisteredService> {
        let response = self
            .transport
            .send_json(Method::PUT, &self.url("/register"), service)
            .await?;

        if !response.status.is_success() {
            return Err(response.into_error());
        }
        response.json()
    }

    async fn deregister(&self, service: &UnregisteredService) -> Result<UnregisteredService> {
        let response = self
            .transport
            .send_json(Method::POST, &self.url("/de-register"), service)
            .await?;

        if !response.status.is_success() {
            return Err(response.into_error());
        }
        response.json()
    }

    async fn find(&self, name: &str, version: &str) -> Result<ServiceRecord> {
        let request = FindRequest {
            name: name.to_string(),
            version: version.to_string(),
        };
        debug!("Resolving {}@{} via {}", name, version, self.base_url);

        let response = self
            .transport
            .send_json(Method::POST, &self.url("/find"), &request)
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(Error::service_not_found(name, version));
        }
        if !response.status.is_success() {
            return Err(response.into_error());
        }
        response.json()
    }

    async fn services(&self) -> Result<Vec<ServiceRecord>> {
        let response = self.transport.get(&self.url("/services")).await?;

        if !response.status.is_success() {
            return Err(response.into_error());
        }
        let listing: ServicesResponse = response.json()?;
        Ok(listing.results)
    }
}
