//! Registry-backed node directory

use async_trait::async_trait;
use df_common::NodeId;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ClientConfig, ClientError, NodeDirectory, ServiceClient};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgNodesResponse {
    #[serde(default)]
    org_name: String,
    #[serde(default)]
    nodes: Vec<NodeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeEntry {
    node_id: String,
}

/// `GET {base}/v1/orgs/{org}/nodes`
pub struct RegistryClient {
    inner: ServiceClient,
}

impl RegistryClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            inner: ServiceClient::new(config)?,
        })
    }
}

#[async_trait]
impl NodeDirectory for RegistryClient {
    async fn get_nodes_list(&self, org: &str) -> Result<Vec<NodeId>, ClientError> {
        let url = self.inner.endpoint(&["v1", "orgs", org, "nodes"])?;
        let response: OrgNodesResponse = self.inner.get_json(url, &format!("org {}", org)).await?;

        let nodes: Vec<NodeId> = response
            .nodes
            .into_iter()
            .filter_map(|entry| match NodeId::validate(&entry.node_id) {
                Ok(node) => Some(node),
                Err(e) => {
                    warn!(org = %org, node_id = %entry.node_id, error = %e, "Skipping invalid node id from registry");
                    None
                }
            })
            .collect();

        debug!(org = %org, org_name = %response.org_name, count = nodes.len(), "Fetched org nodes");
        Ok(nodes)
    }
}
