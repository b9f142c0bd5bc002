use serde::{Deserialize, Serialize};

pub mod logging;
pub mod node_id;

pub use node_id::{NodeId, NodeIdError, NodeType};

/// Separator between the org name and the device selector of a target
pub const TARGET_SEPARATOR: char = '.';

/// Selector addressing every node currently registered to an org
pub const WILDCARD: &str = "*";

// ============================================================================
// Core Message Types
// ============================================================================

/// A command addressed to one device, or to every device of an org.
///
/// Wire format uses camelCase field names:
/// `{"target": "org.node", "httpMethod": "POST", "path": "/x", "body": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// `<org>.<nodeId>` or `<org>.*`
    pub target: String,
    pub http_method: String,
    /// Path on the device, replayed as-is
    pub path: String,
    /// Opaque request body
    #[serde(default)]
    pub body: String,
}

impl Command {
    pub fn new(
        target: impl Into<String>,
        http_method: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            http_method: http_method.into(),
            path: path.into(),
            body: body.into(),
        }
    }

    /// Parse a command from a raw message body
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Split the target on its first separator into `(org, selector)`.
    ///
    /// Returns `None` when the target has no separator at all.
    pub fn split_target(&self) -> Option<(&str, &str)> {
        self.target.split_once(TARGET_SEPARATOR)
    }

    /// True when the selector is the wildcard token
    pub fn is_wildcard(&self) -> bool {
        matches!(self.split_target(), Some((_, WILDCARD)))
    }

    /// Copy of this command re-addressed to a single node of `org`
    pub fn for_node(&self, org: &str, node: &NodeId) -> Command {
        Command {
            target: format!("{}{}{}", org, TARGET_SEPARATOR, node),
            http_method: self.http_method.clone(),
            path: self.path.clone(),
            body: self.body.clone(),
        }
    }
}

/// Decision taken for a delivery once it has been handled.
///
/// The consume loop turns this into the matching broker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (successfully or with a permanent failure) - acknowledge
    Ack,
    /// Transient failure - reject without requeue so the broker dead-letters
    /// it into the waiting queue
    Retry,
    /// Dropped without processing (poison message or retries exhausted)
    Discard,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Retry => "retry",
            Disposition::Discard => "discard",
        }
    }
}
