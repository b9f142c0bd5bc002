//! Lookup-backed node resolver

use async_trait::async_trait;
use df_common::NodeId;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

use super::{ClientConfig, ClientError, NodeResolver, ServiceClient};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeAddressResponse {
    #[serde(default)]
    ip: String,
    port: Option<u16>,
}

/// `GET {base}/v1/nodes/{nodeId}`
pub struct LookupClient {
    inner: ServiceClient,
}

impl LookupClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            inner: ServiceClient::new(config)?,
        })
    }
}

#[async_trait]
impl NodeResolver for LookupClient {
    async fn resolve(&self, node: &NodeId) -> Result<String, ClientError> {
        let url = self.inner.endpoint(&["v1", "nodes", node.as_str()])?;
        let response: NodeAddressResponse = self.inner.get_json(url, &format!("node {}", node)).await?;

        let ip = response.ip.trim();
        if ip.is_empty() {
            return Err(ClientError::InvalidResponse(format!("no address for node {}", node)));
        }

        Ok(host_address(ip, response.port))
    }
}

/// `host[:port]` with IPv6 literals bracketed
fn host_address(ip: &str, port: Option<u16>) -> String {
    let port = port.filter(|p| *p != 0);
    match (ip.parse::<IpAddr>(), port) {
        (Ok(addr), Some(port)) => SocketAddr::new(addr, port).to_string(),
        (Ok(IpAddr::V6(addr)), None) => format!("[{}]", addr),
        (_, Some(port)) => format!("{}:{}", ip, port),
        (_, None) => ip.to_string(),
    }
}
