use df_common::{NodeId, NodeIdError};
use df_queue::QueueError;
use thiserror::Error;

use crate::clients::ClientError;

/// Cause of a failed dispatch
#[derive(Error, Debug)]
pub enum FeederError {
    #[error("invalid target {0:?}")]
    InvalidTarget(String),

    #[error("invalid node id {id:?}: {source}")]
    InvalidNodeId {
        id: String,
        #[source]
        source: NodeIdError,
    },

    #[error("invalid http method {0:?}")]
    InvalidMethod(String),

    #[error("node {0} not found by resolver")]
    NodeNotFound(NodeId),

    #[error("address resolution failed: {0}")]
    Resolver(#[source] ClientError),

    #[error("node directory failed: {0}")]
    Directory(#[source] ClientError),

    #[error("invalid device address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("device rejected request with status {status}")]
    Device4xx { status: u16 },

    #[error("device failed request with status {status}")]
    Device5xx { status: u16 },

    #[error("device answered with unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("device unreachable: {0}")]
    DeviceUnreachable(#[source] reqwest::Error),

    #[error("failed to publish child command: {0}")]
    Publish(#[source] QueueError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl FeederError {
    /// Short label used for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            FeederError::InvalidTarget(_) => "invalid_target",
            FeederError::InvalidNodeId { .. } => "invalid_node_id",
            FeederError::InvalidMethod(_) => "invalid_method",
            FeederError::NodeNotFound(_) => "node_not_found",
            FeederError::Resolver(_) => "resolver",
            FeederError::Directory(_) => "directory",
            FeederError::InvalidAddress { .. } => "invalid_address",
            FeederError::Device4xx { .. } => "device_4xx",
            FeederError::Device5xx { .. } => "device_5xx",
            FeederError::UnexpectedStatus { .. } => "unexpected_status",
            FeederError::DeviceUnreachable(_) => "device_unreachable",
            FeederError::Publish(_) => "publish",
            FeederError::HttpClient(_) => "http_client",
        }
    }
}

/// Failure classified by whether retrying can help
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Never retried: the command cannot succeed as written
    #[error("{0}")]
    Permanent(FeederError),

    /// Retried through the waiting queue
    #[error("{0}")]
    Transient(FeederError),
}

impl DispatchError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, DispatchError::Permanent(_))
    }

    pub fn cause(&self) -> &FeederError {
        match self {
            DispatchError::Permanent(e) | DispatchError::Transient(e) => e,
        }
    }

    pub fn reason(&self) -> &'static str {
        self.cause().reason()
    }
}
