//! Error types for GKG Core
//!
//! Two levels:
//! - `CoreError` aborts a whole analysis (bad input, initial classification
//!   unavailable, timeout, cancellation)
//! - `ItemError` fails one analysis item; the rest of the batch carries on

use gkg_graph::{ConceptId, GraphError};
use gkg_oracle::OracleError;
use serde::{Deserialize, Serialize};

/// Analysis-level error
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Empty or unusable input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Graph could not supply the top-level candidates
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Initial classification failed
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Timeout
    #[error("operation timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Oracle(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Per-item failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Graph id does not exist
    NodeNotFound,
    /// Rule-only access on a non-Rule node
    InvalidNodeKind,
    /// Oracle broke its contract twice
    OracleContractViolation,
    /// Non-Rule node has no candidates below it
    NarrowingDeadEnd,
    /// Round ceiling reached
    NarrowingExceededDepth,
    /// Oracle unreachable after retries
    OracleUnavailable,
    /// Graph store failed
    GraphUnavailable,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NodeNotFound => "NodeNotFound",
            Self::InvalidNodeKind => "InvalidNodeKind",
            Self::OracleContractViolation => "OracleContractViolation",
            Self::NarrowingDeadEnd => "NarrowingDeadEnd",
            Self::NarrowingExceededDepth => "NarrowingExceededDepth",
            Self::OracleUnavailable => "OracleUnavailable",
            Self::GraphUnavailable => "GraphUnavailable",
        };
        f.write_str(name)
    }
}

/// Item-level error
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// Graph query failed for this item
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Oracle response violated the contract after a reminder retry
    #[error("oracle contract violation: {0}")]
    ContractViolation(String),

    /// Oracle unavailable after retries
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Expansion produced no candidates
    #[error("narrowing dead end: {0} has no candidates")]
    DeadEnd(ConceptId),

    /// Round ceiling reached before a Rule
    #[error("narrowing exceeded {max_rounds} rounds at {concept}")]
    ExceededDepth {
        /// Configured ceiling
        max_rounds: u32,
        /// Concept the item was stuck at
        concept: ConceptId,
    },
}

impl ItemError {
    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Graph(GraphError::NodeNotFound(_)) => FailureKind::NodeNotFound,
            Self::Graph(GraphError::InvalidNodeKind { .. }) => FailureKind::InvalidNodeKind,
            Self::Graph(_) => FailureKind::GraphUnavailable,
            Self::ContractViolation(_) => FailureKind::OracleContractViolation,
            Self::OracleUnavailable(_) => FailureKind::OracleUnavailable,
            Self::DeadEnd(_) => FailureKind::NarrowingDeadEnd,
            Self::ExceededDepth { .. } => FailureKind::NarrowingExceededDepth,
        }
    }
}

impl From<OracleError> for ItemError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::ContractViolation(msg) | OracleError::Malformed(msg) => {
                Self::ContractViolation(msg)
            }
            OracleError::Unavailable(msg) | OracleError::Config(msg) => Self::OracleUnavailable(msg),
        }
    }
}

/// Failed item as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Index of the item in its batch
    pub item_index: usize,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

impl ItemFailure {
    /// Build from an item error
    #[must_use]
    pub fn new(item_index: usize, error: &ItemError) -> Self {
        Self {
            item_index,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_error_display() {
        let err = CoreError::InvalidInput("empty sentence".to_string());
        assert!(err.to_string().contains("invalid input"));
    }

    #[test]
    fn core_error_is_retryable() {
        assert!(CoreError::Timeout { duration_secs: 30 }.is_retryable());
        assert!(CoreError::Oracle(OracleError::Unavailable("503".into())).is_retryable());
        assert!(!CoreError::Oracle(OracleError::Malformed("x".into())).is_retryable());
        assert!(!CoreError::Cancelled.is_retryable());
    }

    #[test]
    fn item_error_kinds() {
        assert_eq!(
            ItemError::Graph(GraphError::NodeNotFound("x".into())).kind(),
            FailureKind::NodeNotFound
        );
        assert_eq!(ItemError::DeadEnd("x".into()).kind(), FailureKind::NarrowingDeadEnd);
        assert_eq!(
            ItemError::from(OracleError::Malformed("bad".into())).kind(),
            FailureKind::OracleContractViolation
        );
        assert_eq!(
            ItemError::from(OracleError::Unavailable("down".into())).kind(),
            FailureKind::OracleUnavailable
        );
    }

    #[test]
    fn failure_serializes_kind_in_snake_case() {
        let failure = ItemFailure::new(1, &ItemError::DeadEnd("Articles".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "narrowing_dead_end");
        assert_eq!(json["item_index"], 1);
    }
}
