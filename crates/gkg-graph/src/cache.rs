//! Read-through cache in front of a concept graph
//!
//! The narrowing loop asks for the labels of the same ids repeatedly, and a
//! remote store pays a round trip for each. Results are cached per id; errors
//! are never cached.

use crate::error::GraphError;
use crate::query::ConceptGraph;
use crate::types::{ConceptId, NodeDetail};
use moka::future::Cache;
use std::collections::BTreeSet;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Cached label sets
    pub labels: u64,
    /// Cached neighbor lists
    pub neighbors: u64,
    /// Cached Rule details
    pub details: u64,
}

/// Caching graph decorator
#[derive(Debug)]
pub struct CachedGraph<G> {
    inner: G,
    labels: Cache<ConceptId, BTreeSet<String>>,
    neighbors: Cache<ConceptId, Vec<ConceptId>>,
    details: Cache<ConceptId, NodeDetail>,
}

impl<G: ConceptGraph> CachedGraph<G> {
    /// Wrap `inner` with bounded caches
    #[must_use]
    pub fn new(inner: G, max_capacity: u64) -> Self {
        Self {
            inner,
            labels: Cache::new(max_capacity),
            neighbors: Cache::new(max_capacity),
            details: Cache::new(max_capacity),
        }
    }

    /// Wrap `inner` with bounded, expiring caches
    #[must_use]
    pub fn with_ttl(inner: G, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            labels: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            neighbors: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            details: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Current entry counts
    pub async fn stats(&self) -> CacheStats {
        self.labels.run_pending_tasks().await;
        self.neighbors.run_pending_tasks().await;
        self.details.run_pending_tasks().await;
        CacheStats {
            labels: self.labels.entry_count(),
            neighbors: self.neighbors.entry_count(),
            details: self.details.entry_count(),
        }
    }
}

#[async_trait::async_trait]
impl<G: ConceptGraph> ConceptGraph for CachedGraph<G> {
    async fn top_concepts(&self) -> Result<Vec<ConceptId>, GraphError> {
        self.inner.top_concepts().await
    }

    async fn neighbors(&self, id: &ConceptId) -> Result<Vec<ConceptId>, GraphError> {
        if let Some(hit) = self.neighbors.get(id).await {
            return Ok(hit);
        }
        let value = self.inner.neighbors(id).await?;
        self.neighbors.insert(id.clone(), value.clone()).await;
        Ok(value)
    }

    async fn labels(&self, id: &ConceptId) -> Result<BTreeSet<String>, GraphError> {
        if let Some(hit) = self.labels.get(id).await {
            return Ok(hit);
        }
        let value = self.inner.labels(id).await?;
        self.labels.insert(id.clone(), value.clone()).await;
        Ok(value)
    }

    async fn detail(&self, id: &ConceptId) -> Result<NodeDetail, GraphError> {
        if let Some(hit) = self.details.get(id).await {
            return Ok(hit);
        }
        let value = self.inner.detail(id).await?;
        self.details.insert(id.clone(), value.clone()).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TaxonomyGraph;
    use crate::types::{ConceptNode, Relation};

    fn graph() -> TaxonomyGraph {
        let mut g = TaxonomyGraph::new();
        g.add_node(ConceptNode::top("Articles")).unwrap();
        g.add_node(ConceptNode::rule("Articles-Rule-1", "desc")).unwrap();
        g.add_edge(&"Articles-Rule-1".into(), &"Articles".into(), Relation::BelongsTo)
            .unwrap();
        g
    }

    #[tokio::test]
    async fn cached_results_match_inner() {
        let cached = CachedGraph::new(graph(), 64);
        let id = ConceptId::from("Articles");

        let first = cached.neighbors(&id).await.unwrap();
        let second = cached.neighbors(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.stats().await.neighbors, 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cached = CachedGraph::new(graph(), 64);
        assert!(cached.labels(&"Missing".into()).await.is_err());
        assert_eq!(cached.stats().await.labels, 0);
    }

    #[tokio::test]
    async fn invalid_kind_passes_through() {
        let cached = CachedGraph::with_ttl(graph(), 64, Duration::from_secs(60));
        let err = cached.detail(&"Articles".into()).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidNodeKind { .. }));
    }
}
