//! Detail expansion over a settled batch
//!
//! Fans out over resolved items only. Each item fetches its Rule detail and
//! asks the oracle to merge it into the analysis text. Results come back in
//! batch order whatever order the calls complete in.

use crate::error::ItemError;
use crate::item::{AnalysisItem, Batch};
use crate::retry::RetryPolicy;
use futures::stream::{self, StreamExt};
use gkg_graph::{labels, ConceptGraph, ConceptId, GraphError, NodeDetail, SharedGraph};
use gkg_oracle::{ClassificationOracle, EnrichRequest, OracleError, SharedOracle};
use serde::Serialize;

const ENRICH_REMINDER: &str =
    "answer with a non-empty prose explanation that uses the rule description and examples";

/// Enriched explanation for one resolved item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// Index of the item in its batch
    pub item_index: usize,
    /// Resolved Rule id
    pub concept: ConceptId,
    /// Analysis text before enrichment
    pub analysis: String,
    /// Enriched explanation
    pub text: String,
}

/// Detail expansion stage
#[derive(Clone)]
pub struct DetailExpander {
    graph: SharedGraph,
    oracle: SharedOracle,
    retry: RetryPolicy,
    max_concurrent: usize,
}

impl DetailExpander {
    /// Create expander with default retry and concurrency
    #[must_use]
    pub fn new(graph: SharedGraph, oracle: SharedOracle) -> Self {
        Self {
            graph,
            oracle,
            retry: RetryPolicy::default(),
            max_concurrent: 4,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Expand every resolved item, index-aligned with the batch
    ///
    /// Takes the settled batch; unresolved items are dropped here and must be
    /// reported from the batch beforehand.
    pub async fn expand(&self, batch: Batch) -> Vec<(usize, Result<Explanation, ItemError>)> {
        stream::iter(batch.into_resolved())
            .map(move |(idx, item)| async move { (idx, self.expand_item(idx, &item).await) })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    /// Expand one item
    ///
    /// # Errors
    /// - `GraphError::InvalidNodeKind` if the item's concept is not a Rule;
    ///   `detail` is never called in that case
    /// - Any other graph or oracle failure for this item
    pub async fn expand_item(&self, idx: usize, item: &AnalysisItem) -> Result<Explanation, ItemError> {
        let concept = item.concept().cloned().ok_or_else(|| {
            ItemError::ContractViolation(format!("item {idx} has no concept"))
        })?;

        let node_labels = self.graph.labels(&concept).await?;
        if !node_labels.contains(labels::RULE) {
            return Err(GraphError::InvalidNodeKind {
                id: concept,
                labels: node_labels.into_iter().collect(),
            }
            .into());
        }

        let detail = self.graph.detail(&concept).await?;
        let text = self.enrich(item.analysis(), &concept, detail).await?;
        tracing::debug!("Enriched item {idx} with {concept}");

        Ok(Explanation {
            item_index: idx,
            concept,
            analysis: item.analysis().to_string(),
            text,
        })
    }

    async fn enrich(
        &self,
        analysis: &str,
        concept: &ConceptId,
        detail: NodeDetail,
    ) -> Result<String, ItemError> {
        let request = EnrichRequest::new(analysis, concept.clone(), detail);

        match self.request_enrich(request.clone()).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_contract_violation() => {
                tracing::warn!("Enrichment for {concept} unusable ({e}), retrying once");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self
            .request_enrich(request.with_reminder(ENRICH_REMINDER))
            .await?)
    }

    async fn request_enrich(&self, request: EnrichRequest) -> Result<String, OracleError> {
        let oracle = &self.oracle;
        let text = self
            .retry
            .run("enrich", move || oracle.enrich(request.clone()))
            .await?;
        if text.trim().is_empty() {
            return Err(OracleError::ContractViolation("empty enrichment".to_string()));
        }
        Ok(text)
    }
}

impl std::fmt::Debug for DetailExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailExpander")
            .field("retry", &self.retry)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}
