//! HTTP transport used by the client to reach the GitHub REST API.
//!
//! The [`Transport`] trait is the seam between the resilience machinery and
//! the wire: it returns successful responses verbatim and reports every other
//! outcome as a [`Fault`]. [`OctocrabTransport`] is the production
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Uri};
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig as OctocrabRetryConfig;
use serde::de::DeserializeOwned;

use super::error::ClientError;
use super::fault::{Fault, lowercase_headers};
use super::locator::PersonalAccessToken;

/// Path of the quota endpoint.
pub const RATE_LIMIT_PATH: &str = "/rate_limit";

/// A successful response from the GitHub API.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: String,
}

impl TransportResponse {
    /// Creates a response with an empty header map.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Deserialises the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] carrying the response status when the body does not
    /// match `T`, so a malformed success body is not mistaken for a transient
    /// failure.
    pub fn json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, Fault> {
        serde_json::from_str(&self.body).map_err(|error| Fault {
            status: Some(self.status),
            message: format!("response deserialisation failed: {error}"),
            headers: lowercase_headers(&self.headers),
            ..Fault::default()
        }
        .with_endpoint(endpoint)
        .with_method("GET"))
    }
}

/// Minimal GET transport against the GitHub REST API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues `GET {path}` relative to the API base.
    async fn get(&self, path: &str) -> Result<TransportResponse, Fault>;

    /// Issues `GET /rate_limit`.
    async fn rate_limit(&self) -> Result<TransportResponse, Fault> {
        self.get(RATE_LIMIT_PATH).await
    }
}

/// Octocrab-backed transport.
#[derive(Debug, Clone)]
pub struct OctocrabTransport {
    client: Octocrab,
}

impl OctocrabTransport {
    /// Wraps an existing Octocrab client.
    #[must_use]
    pub const fn new(client: Octocrab) -> Self {
        Self { client }
    }

    /// Builds an authenticated transport for the given API base.
    ///
    /// Octocrab's own retry layer is disabled because retries are owned by
    /// [`crate::github::retry::RetryEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when the base URI cannot be parsed
    /// or [`ClientError::Configuration`] when Octocrab fails to build.
    pub fn for_token(
        token: &PersonalAccessToken,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_uri: Uri = api_base
            .parse::<Uri>()
            .map_err(|error| ClientError::InvalidUrl(error.to_string()))?;

        let client = Octocrab::builder()
            .personal_token(token.as_ref())
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout))
            .add_retry_config(OctocrabRetryConfig::None)
            .base_uri(base_uri)
            .map_err(|error| ClientError::InvalidUrl(error.to_string()))?
            .build()
            .map_err(|error| ClientError::Configuration {
                message: format!("build client failed: {error}"),
            })?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for OctocrabTransport {
    async fn get(&self, path: &str) -> Result<TransportResponse, Fault> {
        let uri: Uri = path.parse::<Uri>().map_err(|error| {
            Fault::transport(format!("invalid request path: {error}"), None)
                .with_endpoint(path)
                .with_method("GET")
        })?;

        let response = self.client._get(uri).await.map_err(|error| {
            Fault::from_octocrab(&error)
                .with_endpoint(path)
                .with_method("GET")
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = self.client.body_to_string(response).await.map_err(|error| {
            Fault::from_octocrab(&error)
                .with_endpoint(path)
                .with_method("GET")
        })?;

        if status.is_success() {
            return Ok(TransportResponse {
                status: status.as_u16(),
                headers,
                body,
            });
        }

        Err(Fault::from_response(status.as_u16(), &headers, &body)
            .with_endpoint(path)
            .with_method("GET"))
    }
}
