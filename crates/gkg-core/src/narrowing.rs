//! Concept Narrowing Engine
//!
//! Drives the classify → descend → re-classify loop:
//! 1. One initial classification over the top-level concepts builds the batch
//! 2. Each round, every pending item expands its concept one level down and
//!    asks the oracle for the single most relevant neighbor
//! 3. An item resolves as soon as its concept is a Rule; it fails on its own
//!    (dead end, ceiling, oracle or graph error) without stopping the others
//! 4. The loop ends when no item is pending
//!
//! Per-item steps of one round run concurrently. Their results are committed
//! together once the whole round has completed, so dropping the future
//! mid-round leaves no partially applied round behind.

use crate::config::EngineConfig;
use crate::error::{CoreError, ItemError, ItemFailure};
use crate::item::{AnalysisItem, Batch};
use crate::retry::RetryPolicy;
use futures::stream::{self, StreamExt};
use gkg_graph::{ConceptGraph, ConceptId, GraphError, SharedGraph};
use gkg_oracle::{ClassificationOracle, ClassifyRequest, InitialEntry, OracleError, PickRequest, SharedOracle};

/// Result of one item's step within a round
#[derive(Debug)]
enum StepOutcome {
    /// Already at a Rule; no expansion performed
    AlreadyRule,
    /// Moved one level down, not yet at a Rule
    Descended(ConceptId),
    /// Moved one level down onto a Rule
    ResolvedAt(ConceptId),
    /// Item abandoned
    Failed(ItemError),
}

/// Iterative concept narrowing over a shared graph and oracle
#[derive(Clone)]
pub struct NarrowingEngine {
    graph: SharedGraph,
    oracle: SharedOracle,
    config: EngineConfig,
    retry: RetryPolicy,
}

impl std::fmt::Debug for NarrowingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrowingEngine")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl NarrowingEngine {
    /// Create engine with default settings
    #[must_use]
    pub fn new(graph: SharedGraph, oracle: SharedOracle) -> Self {
        Self {
            graph,
            oracle,
            config: EngineConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// With engine settings
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Engine settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classify and narrow a sentence until the batch settles
    pub async fn resolve(&self, sentence: &str) -> Result<Batch, CoreError> {
        let batch = self.classify(sentence).await?;
        Ok(self.narrow(batch).await)
    }

    /// Build the initial batch from one top-level classification
    ///
    /// Multi-concept entries are split into one item per concept. Entries
    /// that still break the contract after a reminder retry become failed
    /// items; an id outside the top level fails only its own item. Items
    /// whose concept is already a Rule start resolved.
    ///
    /// # Errors
    /// - `CoreError::InvalidInput` for a blank sentence
    /// - `CoreError::Graph` if the top-level concepts cannot be listed
    /// - `CoreError::Oracle` if classification fails after retries
    pub async fn classify(&self, sentence: &str) -> Result<Batch, CoreError> {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return Err(CoreError::InvalidInput("empty sentence".to_string()));
        }

        let candidates = self.graph.top_concepts().await?;
        if candidates.is_empty() {
            return Err(CoreError::Graph(GraphError::InvalidTaxonomy(
                "taxonomy has no top-level concepts".to_string(),
            )));
        }

        let request = ClassifyRequest::new(sentence, candidates.clone());
        let entries = match self.request_initial(request.clone()).await {
            Ok(entries) if entries.iter().all(|e| entry_violation(e, &candidates).is_none()) => {
                entries
            }
            Ok(_) => {
                tracing::warn!("Initial classification broke the contract, retrying with reminder");
                self.request_initial(request.with_reminder(classify_reminder(&candidates)))
                    .await?
            }
            Err(e) if e.is_contract_violation() => {
                tracing::warn!("Initial classification unusable ({e}), retrying with reminder");
                self.request_initial(request.with_reminder(classify_reminder(&candidates)))
                    .await?
            }
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        for entry in entries {
            if let Some(reason) = shape_violation(&entry) {
                tracing::warn!("Dropping initial entry: {reason}");
                let failure = ItemFailure::new(items.len(), &ItemError::ContractViolation(reason));
                items.push(AnalysisItem::failed(entry.analysis, entry.concepts, failure));
                continue;
            }

            let mut distinct: Vec<ConceptId> = Vec::with_capacity(entry.concepts.len());
            for concept in entry.concepts {
                if !distinct.contains(&concept) {
                    distinct.push(concept);
                }
            }
            if distinct.len() > 1 {
                tracing::debug!("Splitting entry across {} concepts", distinct.len());
            }
            for concept in distinct {
                if candidates.contains(&concept) {
                    items.push(AnalysisItem::new(entry.analysis.clone(), concept));
                    continue;
                }
                let reason = format!("{concept} is not a top-level concept");
                tracing::warn!("Dropping initial concept: {reason}");
                let failure = ItemFailure::new(items.len(), &ItemError::ContractViolation(reason));
                items.push(AnalysisItem::failed(entry.analysis.clone(), vec![concept], failure));
            }
        }

        let mut batch = Batch::new(items);
        for idx in batch.pending() {
            let Some(concept) = batch.items()[idx].concept().cloned() else {
                continue;
            };
            let verdict = self.graph.is_rule(&concept).await;
            if let Some(item) = batch.item_mut(idx) {
                match verdict {
                    Ok(true) => item.mark_resolved(),
                    Ok(false) => {}
                    Err(e) => item.fail(ItemFailure::new(idx, &ItemError::from(e))),
                }
            }
        }

        tracing::info!("Initial classification produced {} items", batch.len());
        Ok(batch)
    }

    /// Run rounds until no item is pending
    pub async fn narrow(&self, mut batch: Batch) -> Batch {
        while !batch.is_settled() {
            let stepped = self.run_round(&mut batch).await;
            tracing::debug!(round = batch.rounds(), stepped, "Narrowing round complete");
        }

        let resolved = batch.items().iter().filter(|i| i.is_resolved()).count();
        tracing::info!(
            rounds = batch.rounds(),
            resolved,
            failed = batch.len() - resolved,
            "Narrowing settled"
        );
        batch
    }

    /// One synchronized round over all pending items
    ///
    /// Returns the number of items stepped. Resolved and failed items are
    /// skipped without any graph or oracle call.
    pub async fn run_round(&self, batch: &mut Batch) -> usize {
        let pending = batch.pending();
        if pending.is_empty() {
            return 0;
        }

        let items = batch.items();
        let outcomes: Vec<(usize, StepOutcome)> = stream::iter(pending)
            .map(move |idx| {
                let item = &items[idx];
                async move { (idx, self.step(item).await) }
            })
            .buffered(self.config.max_concurrent_items.max(1))
            .collect()
            .await;

        batch.count_round();
        let stepped = outcomes.len();
        for (idx, outcome) in outcomes {
            let Some(item) = batch.item_mut(idx) else {
                continue;
            };
            match outcome {
                StepOutcome::AlreadyRule => item.mark_resolved(),
                StepOutcome::Descended(concept) => {
                    item.count_round();
                    item.descend_to(concept);
                }
                StepOutcome::ResolvedAt(concept) => {
                    item.count_round();
                    item.descend_to(concept);
                    item.mark_resolved();
                }
                StepOutcome::Failed(err) => {
                    if matches!(err, ItemError::ExceededDepth { .. }) {
                        tracing::warn!("Item {idx}: {err}");
                    } else {
                        item.count_round();
                        tracing::warn!("Item {idx} failed: {err}");
                    }
                    item.fail(ItemFailure::new(idx, &err));
                }
            }
        }
        stepped
    }

    async fn step(&self, item: &AnalysisItem) -> StepOutcome {
        let Some(current) = item.concept().cloned() else {
            return StepOutcome::Failed(ItemError::ContractViolation(
                "item has no concept".to_string(),
            ));
        };

        match self.graph.is_rule(&current).await {
            Ok(true) => return StepOutcome::AlreadyRule,
            Ok(false) => {}
            Err(e) => return StepOutcome::Failed(e.into()),
        }

        if item.rounds() >= self.config.max_rounds {
            return StepOutcome::Failed(ItemError::ExceededDepth {
                max_rounds: self.config.max_rounds,
                concept: current,
            });
        }

        let candidates = match self.graph.neighbors(&current).await {
            Ok(candidates) if candidates.is_empty() => {
                return StepOutcome::Failed(ItemError::DeadEnd(current));
            }
            Ok(candidates) => candidates,
            Err(e) => return StepOutcome::Failed(e.into()),
        };
        tracing::debug!("Expanded {current} into {} candidates", candidates.len());

        let picked = match self.pick(item.analysis(), candidates).await {
            Ok(picked) => picked,
            Err(e) => return StepOutcome::Failed(e),
        };

        match self.graph.is_rule(&picked).await {
            Ok(true) => StepOutcome::ResolvedAt(picked),
            Ok(false) => StepOutcome::Descended(picked),
            Err(e) => StepOutcome::Failed(e.into()),
        }
    }

    /// Ask for the most relevant candidate, with one reminder retry
    async fn pick(&self, analysis: &str, candidates: Vec<ConceptId>) -> Result<ConceptId, ItemError> {
        let request = PickRequest::new(analysis, candidates);

        match self.request_pick(request.clone()).await {
            Ok(id) if request.candidates.contains(&id) => return Ok(id),
            Ok(id) => tracing::warn!("Oracle picked {id} outside the candidate set, retrying with reminder"),
            Err(e) if e.is_contract_violation() => {
                tracing::warn!("Oracle pick unusable ({e}), retrying with reminder");
            }
            Err(e) => return Err(e.into()),
        }

        let reminder = format!(
            "answer with exactly one id copied from this list: {}",
            join_ids(&request.candidates)
        );
        let retry = request.clone().with_reminder(reminder);
        match self.request_pick(retry).await {
            Ok(id) if request.candidates.contains(&id) => Ok(id),
            Ok(id) => Err(ItemError::ContractViolation(format!(
                "picked {id}, which is not among {} candidates",
                request.candidates.len()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn request_pick(&self, request: PickRequest) -> Result<ConceptId, OracleError> {
        let oracle = &self.oracle;
        self.retry
            .run("pick_most_relevant", move || oracle.pick_most_relevant(request.clone()))
            .await
    }

    async fn request_initial(
        &self,
        request: ClassifyRequest,
    ) -> Result<Vec<InitialEntry>, OracleError> {
        let oracle = &self.oracle;
        self.retry
            .run("classify_initial", move || oracle.classify_initial(request.clone()))
            .await
    }
}

/// Why an initial entry breaks the contract, if it does
fn shape_violation(entry: &InitialEntry) -> Option<String> {
    if entry.analysis.trim().is_empty() {
        return Some("entry has an empty analysis".to_string());
    }
    if entry.concepts.is_empty() {
        return Some("entry has no concept".to_string());
    }
    None
}

fn entry_violation(entry: &InitialEntry, candidates: &[ConceptId]) -> Option<String> {
    if let Some(reason) = shape_violation(entry) {
        return Some(reason);
    }
    entry
        .concepts
        .iter()
        .find(|c| !candidates.contains(c))
        .map(|c| format!("{c} is not a top-level concept"))
}

fn classify_reminder(candidates: &[ConceptId]) -> String {
    format!(
        "every entry needs a non-empty analysis and exactly one concept id copied from: {}",
        join_ids(candidates)
    )
}

fn join_ids(ids: &[ConceptId]) -> String {
    ids.iter().map(ConceptId::as_str).collect::<Vec<_>>().join(", ")
}
