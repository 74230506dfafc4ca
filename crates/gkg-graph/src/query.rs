//! Graph Query Interface
//!
//! All operations are read-only. Implementations must uphold the descent
//! rule: `neighbors` follows `BELONGS_TO` in either direction and
//! `HAS_SUBCLASS` only from its source, so that repeated expansion never
//! climbs back up the hierarchy.

use crate::error::GraphError;
use crate::types::{is_rule_labels, ConceptId, NodeDetail};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Shared, lifetime-scoped graph handle
pub type SharedGraph = Arc<dyn ConceptGraph>;

/// Read-only accessor over a concept taxonomy
#[async_trait::async_trait]
pub trait ConceptGraph: Send + Sync {
    /// All top-level grammar concepts
    async fn top_concepts(&self) -> Result<Vec<ConceptId>, GraphError>;

    /// Nodes one descent step away from `id`
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if `id` does not exist
    async fn neighbors(&self, id: &ConceptId) -> Result<Vec<ConceptId>, GraphError>;

    /// Type tags of `id`
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if `id` does not exist
    async fn labels(&self, id: &ConceptId) -> Result<BTreeSet<String>, GraphError>;

    /// Description and examples of a Rule node
    ///
    /// # Errors
    /// - `GraphError::NodeNotFound` if `id` does not exist
    /// - `GraphError::InvalidNodeKind` if `id` is not a Rule
    async fn detail(&self, id: &ConceptId) -> Result<NodeDetail, GraphError>;

    /// Whether `id` is a terminal Rule
    async fn is_rule(&self, id: &ConceptId) -> Result<bool, GraphError> {
        Ok(is_rule_labels(&self.labels(id).await?))
    }
}

#[async_trait::async_trait]
impl<G: ConceptGraph + ?Sized> ConceptGraph for Arc<G> {
    async fn top_concepts(&self) -> Result<Vec<ConceptId>, GraphError> {
        (**self).top_concepts().await
    }

    async fn neighbors(&self, id: &ConceptId) -> Result<Vec<ConceptId>, GraphError> {
        (**self).neighbors(id).await
    }

    async fn labels(&self, id: &ConceptId) -> Result<BTreeSet<String>, GraphError> {
        (**self).labels(id).await
    }

    async fn detail(&self, id: &ConceptId) -> Result<NodeDetail, GraphError> {
        (**self).detail(id).await
    }
}
