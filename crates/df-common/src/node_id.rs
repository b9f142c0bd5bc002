//! Node Address Scheme
//!
//! Node IDs are fixed-length structured identifiers, e.g. `uk-sa2209-hnode-a1-00ff`:
//!
//! | bytes  | field                                   |
//! |--------|-----------------------------------------|
//! | 0..2   | org prefix (`uk`)                       |
//! | 3..5   | manufacturer code (`sa`)                |
//! | 5..9   | year/week of manufacture (`YYWW`)       |
//! | 10..15 | hardware type code (`hnode`, `tnode`, `anode`) |
//! | 16..18 | hardware version                        |
//! | 19..23 | serial suffix                           |
//!
//! Comparison is case-insensitive; the canonical form is lowercase.

use chrono::{Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exact length of a node ID
pub const NODE_ID_LENGTH: usize = 23;

/// Byte offset of the hardware type code
pub const TYPE_CODE_OFFSET: usize = 10;

const TYPE_CODE_LENGTH: usize = 5;

pub const HOME_NODE_CODE: &str = "hnode";
pub const TOWER_NODE_CODE: &str = "tnode";
pub const AMPLIFIER_NODE_CODE: &str = "anode";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeIdError {
    #[error("invalid node id length {length}, expected {expected}", expected = NODE_ID_LENGTH)]
    InvalidLength { length: usize },

    #[error("invalid node id type code, expected one of hnode, tnode, anode at offset {offset}", offset = TYPE_CODE_OFFSET)]
    InvalidTypeCode,
}

/// Coarse hardware classification derived from the type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Home,
    Tower,
    Amplifier,
    Unknown,
}

impl NodeType {
    /// Map a type code to its node type. Unrecognized codes are `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            HOME_NODE_CODE => NodeType::Home,
            TOWER_NODE_CODE => NodeType::Tower,
            AMPLIFIER_NODE_CODE => NodeType::Amplifier,
            _ => NodeType::Unknown,
        }
    }

    /// Type code embedded in node IDs of this type
    pub fn code(&self) -> Option<&'static str> {
        match self {
            NodeType::Home => Some(HOME_NODE_CODE),
            NodeType::Tower => Some(TOWER_NODE_CODE),
            NodeType::Amplifier => Some(AMPLIFIER_NODE_CODE),
            NodeType::Unknown => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Home => "HomeNode",
            NodeType::Tower => "TowerNode",
            NodeType::Amplifier => "AmplifierNode",
            NodeType::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A validated node ID in canonical (lowercase) form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Validate a raw node ID and return its canonical form
    pub fn validate(raw: &str) -> Result<Self, NodeIdError> {
        if raw.len() != NODE_ID_LENGTH {
            return Err(NodeIdError::InvalidLength { length: raw.len() });
        }

        let canonical = raw.to_ascii_lowercase();
        match type_code(&canonical) {
            Some(code) if NodeType::from_code(code) != NodeType::Unknown => Ok(NodeId(canonical)),
            _ => Err(NodeIdError::InvalidTypeCode),
        }
    }

    /// Generate a fresh node ID for the given type, stamped with the current
    /// year and ISO week
    pub fn new_virtual(node_type: NodeType) -> Result<Self, NodeIdError> {
        let code = node_type.code().ok_or(NodeIdError::InvalidTypeCode)?;
        let week = Utc::now().iso_week();
        let serial: u16 = rand::thread_rng().gen();

        let raw = format!(
            "uk-sa{:02}{:02}-{}-a1-{:04x}",
            week.year().rem_euclid(100),
            week.week(),
            code,
            serial
        );
        Self::validate(&raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Node type from the embedded type code
    pub fn node_type(&self) -> NodeType {
        type_code(&self.0).map(NodeType::from_code).unwrap_or(NodeType::Unknown)
    }
}

fn type_code(id: &str) -> Option<&str> {
    id.get(TYPE_CODE_OFFSET..TYPE_CODE_OFFSET + TYPE_CODE_LENGTH)
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "uk-sa2209-hnode-a1-00ff";
    const TOWER: &str = "uk-sa2209-tnode-a1-1234";
    const AMPLIFIER: &str = "uk-sa2209-anode-a1-beef";

    #[test]
    fn test_validate_returns_lowercase() {
        let id = NodeId::validate("UK-SA2209-HNODE-A1-00FF").unwrap();
        assert_eq!(id.as_str(), HOME);
        assert_eq!(id.to_string(), HOME);
    }

    #[test]
    fn test_validate_is_idempotent() {
        for raw in [HOME, TOWER, AMPLIFIER, "Uk-Sa2209-TNode-A1-ABCD"] {
            let once = NodeId::validate(raw).unwrap();
            let twice = NodeId::validate(&once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_invalid_length() {
        for raw in ["", "*", "uk-sa2209-hnode-a1-00f", "uk-sa2209-hnode-a1-00ff0"] {
            assert_eq!(
                NodeId::validate(raw),
                Err(NodeIdError::InvalidLength { length: raw.len() })
            );
        }
    }

    #[test]
    fn test_invalid_type_code() {
        for raw in [
            "uk-sa2209-xnode-a1-00ff",
            "uk-sa2209-a1-hnode-00ff",
            "hnode-uk-sa2209-a1-00ff",
        ] {
            assert_eq!(raw.len(), NODE_ID_LENGTH);
            assert_eq!(NodeId::validate(raw), Err(NodeIdError::InvalidTypeCode));
        }
    }

    #[test]
    fn test_type_code_offset_on_char_boundary() {
        // 23 bytes, but a multi-byte char straddles the type code offset
        let raw = "uk-sa2209é-node-a1-00f";
        assert_eq!(raw.len(), NODE_ID_LENGTH);
        assert_eq!(NodeId::validate(raw), Err(NodeIdError::InvalidTypeCode));
    }

    #[test]
    fn test_node_type() {
        assert_eq!(NodeId::validate(HOME).unwrap().node_type(), NodeType::Home);
        assert_eq!(NodeId::validate(TOWER).unwrap().node_type(), NodeType::Tower);
        assert_eq!(NodeId::validate(AMPLIFIER).unwrap().node_type(), NodeType::Amplifier);
    }

    #[test]
    fn test_node_type_from_code_is_lenient() {
        assert_eq!(NodeType::from_code("HNODE"), NodeType::Home);
        assert_eq!(NodeType::from_code("qnode"), NodeType::Unknown);
        assert_eq!(NodeType::from_code(""), NodeType::Unknown);
    }

    #[test]
    fn test_new_virtual() {
        for node_type in [NodeType::Home, NodeType::Tower, NodeType::Amplifier] {
            let id = NodeId::new_virtual(node_type).unwrap();
            assert_eq!(id.as_str().len(), NODE_ID_LENGTH);
            assert_eq!(id.node_type(), node_type);
        }
        assert_eq!(
            NodeId::new_virtual(NodeType::Unknown),
            Err(NodeIdError::InvalidTypeCode)
        );
    }

    #[test]
    fn test_serde_validates() {
        let id: NodeId = serde_json::from_str("\"UK-SA2209-HNODE-A1-00FF\"").unwrap();
        assert_eq!(id.as_str(), HOME);
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", HOME));

        assert!(serde_json::from_str::<NodeId>("\"*\"").is_err());
    }
}
