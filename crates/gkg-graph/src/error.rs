//! Error types for taxonomy access

use crate::types::ConceptId;

/// Graph query and loading errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Requested id does not exist
    #[error("node not found: {0}")]
    NodeNotFound(ConceptId),

    /// Detail requested on a node that is not a Rule
    #[error("invalid node kind for {id}: labels {labels:?} do not include Rule")]
    InvalidNodeKind {
        /// Offending node
        id: ConceptId,
        /// Labels the node actually carries
        labels: Vec<String>,
    },

    /// Taxonomy document is structurally invalid
    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    /// Neighbor expansion can revisit a node
    #[error("descent cycle: {path:?}")]
    DescentCycle {
        /// Nodes on the detected cycle
        path: Vec<ConceptId>,
    },

    /// Taxonomy file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Taxonomy file could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for GraphError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let err = GraphError::NodeNotFound(ConceptId::from("Articles"));
        assert_eq!(err.to_string(), "node not found: Articles");
    }

    #[test]
    fn parse_errors_convert() {
        let json = serde_json::from_str::<u32>("x").unwrap_err();
        assert!(matches!(GraphError::from(json), GraphError::Parse(_)));
    }
}
