//! Request Executor - delivers one concrete command to its device
//!
//! - Target parsing and node ID validation
//! - Address resolution through the `NodeResolver`
//! - HTTP call with a bounded per-request timeout
//! - Response classification into permanent/transient failures

use async_trait::async_trait;
use df_common::{Command, NodeId};
use reqwest::{Client, Method, Url};
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clients::NodeResolver;
use crate::dispatcher::CommandHandler;
use crate::error::{DispatchError, FeederError};
use crate::feeder_metrics;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Port forced onto resolved addresses (0 keeps the resolved one)
    pub device_port: u16,
    pub request_timeout: Duration,
    /// Treat "node not found" from the resolver as permanent instead of retrying
    pub resolver_not_found_permanent: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            device_port: 0,
            request_timeout: Duration::from_secs(3),
            resolver_not_found_permanent: false,
        }
    }
}

pub struct RequestExecutor {
    client: Client,
    resolver: Arc<dyn NodeResolver>,
    config: ExecutorConfig,
}

impl RequestExecutor {
    pub fn new(resolver: Arc<dyn NodeResolver>, config: ExecutorConfig) -> Result<Self, FeederError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(FeederError::HttpClient)?;

        info!(
            timeout_ms = config.request_timeout.as_millis() as u64,
            device_port = config.device_port,
            resolver_not_found_permanent = config.resolver_not_found_permanent,
            "RequestExecutor initialized"
        );

        Ok(Self {
            client,
            resolver,
            config,
        })
    }

    /// Resolve the command's device and perform the HTTP call.
    ///
    /// Every call is counted in the device request metric, including ones
    /// that fail before reaching the device.
    pub async fn execute(&self, command: &Command) -> Result<(), DispatchError> {
        let start = Instant::now();
        let result = self.try_execute(command).await;
        feeder_metrics::record_device_request(result.is_ok(), start.elapsed());
        result
    }

    async fn try_execute(&self, command: &Command) -> Result<(), DispatchError> {
        let (_, selector) = command
            .split_target()
            .ok_or_else(|| DispatchError::Permanent(FeederError::InvalidTarget(command.target.clone())))?;

        let node = NodeId::validate(selector).map_err(|source| {
            DispatchError::Permanent(FeederError::InvalidNodeId {
                id: selector.to_string(),
                source,
            })
        })?;

        let method = parse_method(&command.http_method)
            .ok_or_else(|| DispatchError::Permanent(FeederError::InvalidMethod(command.http_method.clone())))?;

        let address = self.resolve(&node).await?;
        let url = device_url(&address, self.config.device_port, &command.path)
            .map_err(DispatchError::Transient)?;

        self.send(&node, method, url, &command.body).await
    }

    async fn resolve(&self, node: &NodeId) -> Result<String, DispatchError> {
        match self.resolver.resolve(node).await {
            Ok(address) => {
                debug!(node_id = %node, address = %address, "Resolved node address");
                Ok(address)
            }
            Err(e) if e.is_not_found() => {
                let err = FeederError::NodeNotFound(node.clone());
                if self.config.resolver_not_found_permanent {
                    Err(DispatchError::Permanent(err))
                } else {
                    Err(DispatchError::Transient(err))
                }
            }
            Err(e) => Err(DispatchError::Transient(FeederError::Resolver(e))),
        }
    }

    async fn send(&self, node: &NodeId, method: Method, url: Url, body: &str) -> Result<(), DispatchError> {
        debug!(node_id = %node, method = %method, url = %url, "Sending device request");

        let mut request = self.client.request(method.clone(), url.clone());
        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(node_id = %node, url = %url, "Device request timed out");
            } else {
                warn!(node_id = %node, url = %url, error = %e, "Device request failed");
            }
            DispatchError::Transient(FeederError::DeviceUnreachable(e))
        })?;

        let status = response.status();
        let status_code = status.as_u16();

        if status.is_success() {
            info!(node_id = %node, method = %method, url = %url, status_code, "Device request succeeded");
            Ok(())
        } else if status.is_client_error() {
            warn!(node_id = %node, method = %method, url = %url, status_code, "Device rejected request");
            Err(DispatchError::Permanent(FeederError::Device4xx { status: status_code }))
        } else if status.is_server_error() {
            warn!(node_id = %node, method = %method, url = %url, status_code, "Device server error");
            Err(DispatchError::Transient(FeederError::Device5xx { status: status_code }))
        } else {
            warn!(node_id = %node, method = %method, url = %url, status_code, "Unexpected device status");
            Err(DispatchError::Transient(FeederError::UnexpectedStatus { status: status_code }))
        }
    }
}

#[async_trait]
impl CommandHandler for RequestExecutor {
    async fn handle(&self, command: &Command) -> Result<(), DispatchError> {
        self.execute(command).await
    }
}

fn parse_method(raw: &str) -> Option<Method> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "HEAD" => Some(Method::HEAD),
        "OPTIONS" => Some(Method::OPTIONS),
        _ => None,
    }
}

/// Device URL from a resolved address and a device-local path.
///
/// Addresses without a scheme are taken as plain HTTP and bare IPv6
/// literals are bracketed. A non-zero `port_override` replaces whatever
/// port the address carries.
fn device_url(address: &str, port_override: u16, path: &str) -> Result<Url, FeederError> {
    let invalid = |reason: String| FeederError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let address = address.trim();
    let base = if address.contains("://") {
        address.to_string()
    } else if let Ok(ip) = address.parse::<Ipv6Addr>() {
        format!("http://[{}]", ip)
    } else {
        format!("http://{}", address)
    };

    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    if port_override != 0 {
        url.set_port(Some(port_override))
            .map_err(|_| invalid("address cannot carry a port".to_string()))?;
    }

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Url::parse(&format!("{}{}", url.as_str().trim_end_matches('/'), path)).map_err(|e| invalid(e.to_string()))
}
