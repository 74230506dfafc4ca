//! Grammar analyzer
//!
//! Single entry point per sentence: classify, narrow, expand. Returns the
//! enriched explanations of resolved items with failures reported alongside.

use crate::config::GkgConfig;
use crate::detail::{DetailExpander, Explanation};
use crate::error::{CoreError, ItemFailure};
use crate::narrowing::NarrowingEngine;
use gkg_graph::SharedGraph;
use gkg_oracle::SharedOracle;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;
use ulid::Ulid;

/// Identifier of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Create new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of analyzing one sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    /// Run identifier
    pub run_id: RunId,
    /// Enriched explanations in batch order
    pub explanations: Vec<Explanation>,
    /// Items that did not produce an explanation, in batch order
    pub failures: Vec<ItemFailure>,
    /// Narrowing rounds run
    pub rounds: u32,
}

impl AnalysisReport {
    /// Every item produced an explanation
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Enriched strings only
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.explanations.iter().map(|e| e.text.as_str()).collect()
    }
}

/// Classify, narrow and expand one sentence at a time
#[derive(Debug, Clone)]
pub struct GrammarAnalyzer {
    engine: NarrowingEngine,
    expander: DetailExpander,
}

impl GrammarAnalyzer {
    /// Create analyzer from configuration
    #[must_use]
    pub fn new(graph: SharedGraph, oracle: SharedOracle, config: &GkgConfig) -> Self {
        let engine = NarrowingEngine::new(graph.clone(), oracle.clone())
            .with_config(config.engine)
            .with_retry(config.retry);
        let expander = DetailExpander::new(graph, oracle)
            .with_retry(config.retry)
            .with_max_concurrent(config.engine.max_concurrent_items);
        Self { engine, expander }
    }

    /// Narrowing engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &NarrowingEngine {
        &self.engine
    }

    /// Analyze one sentence
    ///
    /// # Errors
    /// - `CoreError::InvalidInput` for a blank sentence
    /// - `CoreError::Graph` / `CoreError::Oracle` if initial classification fails
    ///
    /// Per-item failures never surface here; they are listed in the report.
    pub async fn analyze(&self, sentence: &str) -> Result<AnalysisReport, CoreError> {
        let run_id = RunId::new();
        let span = tracing::info_span!("analyze", %run_id);
        self.run(run_id, sentence).instrument(span).await
    }

    /// Analyze with a deadline
    pub async fn analyze_with_timeout(
        &self,
        sentence: &str,
        timeout: Duration,
    ) -> Result<AnalysisReport, CoreError> {
        tokio::time::timeout(timeout, self.analyze(sentence))
            .await
            .map_err(|_| CoreError::Timeout {
                duration_secs: timeout.as_secs(),
            })?
    }

    /// Analyze until `cancel` completes
    ///
    /// The batch is owned by the in-flight future, so cancellation discards
    /// it without side effects.
    pub async fn analyze_until<C>(&self, sentence: &str, cancel: C) -> Result<AnalysisReport, CoreError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            report = self.analyze(sentence) => report,
            () = cancel => {
                tracing::info!("Analysis cancelled");
                Err(CoreError::Cancelled)
            }
        }
    }

    async fn run(&self, run_id: RunId, sentence: &str) -> Result<AnalysisReport, CoreError> {
        let batch = match self.engine.classify(sentence).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("Initial classification failed: {e}");
                return Err(e);
            }
        };
        let batch = self.engine.narrow(batch).await;

        let rounds = batch.rounds();
        let mut failures = batch.failures();
        let mut explanations = Vec::new();
        for (idx, result) in self.expander.expand(batch).await {
            match result {
                Ok(explanation) => explanations.push(explanation),
                Err(err) => {
                    tracing::warn!("Detail expansion failed for item {idx}: {err}");
                    failures.push(ItemFailure::new(idx, &err));
                }
            }
        }
        failures.sort_by_key(|f| f.item_index);

        tracing::info!(
            explanations = explanations.len(),
            failures = failures.len(),
            rounds,
            "Analysis complete"
        );
        Ok(AnalysisReport {
            run_id,
            explanations,
            failures,
            rounds,
        })
    }
}
