//! Collaborator facades: node directory (org -> nodes) and node resolver
//! (node -> network address)
//!
//! Both are stateless request/response clients, each owning its own HTTP
//! client and timeout, safe to share between concurrent handlers.

use async_trait::async_trait;
use df_common::NodeId;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub mod lookup;
pub mod registry;

pub use lookup::LookupClient;
pub use registry::RegistryClient;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

/// Lists the nodes currently registered to an org
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn get_nodes_list(&self, org: &str) -> Result<Vec<NodeId>, ClientError>;
}

/// Maps a node to its current reachable address.
///
/// The address is `host`, `host:port` or a full `scheme://host[:port]` URL.
#[async_trait]
pub trait NodeResolver: Send + Sync {
    async fn resolve(&self, node: &NodeId) -> Result<String, ClientError>;
}

/// Base URL and timeout of a collaborator service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080", Duration::from_secs(3))
    }
}

/// Shared plumbing of the HTTP facades
#[derive(Debug, Clone)]
struct ServiceClient {
    client: Client,
    base_url: Url,
}

impl ServiceClient {
    fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base url {:?}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("{} cannot be a base url", base_url)));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended as escaped path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url` and decode a JSON body. `subject` names the looked-up entity
    /// in `NotFound` errors.
    async fn get_json<T: DeserializeOwned>(&self, url: Url, subject: &str) -> Result<T, ClientError> {
        debug!(url = %url, "Querying collaborator service");

        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Unavailable(format!("{} timed out", url))
                } else {
                    ClientError::Unavailable(format!("{}: {}", url, e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(subject.to_string()));
        }
        if status.is_server_error() {
            return Err(ClientError::Unavailable(format!("{} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
