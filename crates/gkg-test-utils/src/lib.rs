//! Testing utilities for GKG workspace
//!
//! Shared taxonomy fixtures, a deterministic oracle and a call-counting
//! graph wrapper.

#![allow(missing_docs)]

use gkg_graph::{
    labels, ConceptGraph, ConceptId, ConceptNode, GraphError, NodeDetail, Relation, TaxonomyGraph,
};
use gkg_oracle::{
    ClassificationOracle, ClassifyRequest, EnrichRequest, InitialEntry, OracleError, PickRequest,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sentence with one article error and one possessive error
pub const SCENARIO_SENTENCE: &str = "I should ask the some people the Chinese cultures's beautiful.";

/// Depth-2 taxonomy: Grammar → {Articles, Possessives} → one Rule each
pub fn scenario_graph() -> TaxonomyGraph {
    let mut graph = TaxonomyGraph::new();
    graph.add_node(ConceptNode::concept("Grammar")).unwrap();
    graph.add_node(ConceptNode::top("Articles")).unwrap();
    graph.add_node(ConceptNode::top("Possessives")).unwrap();
    graph
        .add_node(
            ConceptNode::rule("Articles-Rule-1", "Use a single determiner before a noun.")
                .with_examples(["Ask some people.", "Ask the people."]),
        )
        .unwrap();
    graph
        .add_node(ConceptNode::rule(
            "Possessives-Rule-1",
            "Plural nouns ending in s take only an apostrophe.",
        ))
        .unwrap();
    graph
        .add_node(
            ConceptNode::new("Possessives-Example-1", labels::EXAMPLE)
                .with_example("The cultures' beauty."),
        )
        .unwrap();

    link(&mut graph, "Grammar", "Articles", Relation::HasSubclass);
    link(&mut graph, "Grammar", "Possessives", Relation::HasSubclass);
    link(&mut graph, "Articles-Rule-1", "Articles", Relation::BelongsTo);
    link(&mut graph, "Possessives-Rule-1", "Possessives", Relation::BelongsTo);
    link(&mut graph, "Possessives-Rule-1", "Possessives-Example-1", Relation::HasExample);
    graph
}

/// Single top concept `c0` descending through `c1..` to `rule`
///
/// The Rule is reached after exactly `depth` expansions (`depth >= 1`).
pub fn chain_graph(depth: usize) -> TaxonomyGraph {
    let depth = depth.max(1);
    let mut graph = TaxonomyGraph::new();
    graph.add_node(ConceptNode::top("c0")).unwrap();
    for i in 1..depth {
        graph.add_node(ConceptNode::concept(format!("c{i}"))).unwrap();
        link(&mut graph, &format!("c{}", i - 1), &format!("c{i}"), Relation::HasSubclass);
    }
    graph.add_node(ConceptNode::rule("rule", "chain leaf")).unwrap();
    link(&mut graph, "rule", &format!("c{}", depth - 1), Relation::BelongsTo);
    graph
}

/// Random tree: node `i > 0` hangs under parent `parents[i-1] % i`
///
/// `n0` is the only top concept. Leaves become Rules joined by `BELONGS_TO`,
/// inner nodes are joined by `HAS_SUBCLASS`.
pub fn tree_taxonomy(parents: &[usize]) -> TaxonomyGraph {
    let count = parents.len() + 1;
    let mut has_child = vec![false; count];
    for (i, &p) in parents.iter().enumerate() {
        has_child[p % (i + 1)] = true;
    }

    let mut graph = TaxonomyGraph::new();
    for i in 0..count {
        let node = if i == 0 {
            ConceptNode::top("n0")
        } else if has_child[i] {
            ConceptNode::concept(format!("n{i}"))
        } else {
            ConceptNode::rule(format!("n{i}"), format!("rule n{i}"))
        };
        graph.add_node(node).unwrap();
    }
    for (i, &p) in parents.iter().enumerate() {
        let child = format!("n{}", i + 1);
        let parent = format!("n{}", p % (i + 1));
        if has_child[i + 1] {
            link(&mut graph, &parent, &child, Relation::HasSubclass);
        } else {
            link(&mut graph, &child, &parent, Relation::BelongsTo);
        }
    }
    graph
}

fn link(graph: &mut TaxonomyGraph, from: &str, to: &str, relation: Relation) {
    graph.add_edge(&from.into(), &to.into(), relation).unwrap();
}

/// Deterministic oracle
///
/// - `classify_initial` returns the scripted entries, or one entry per
///   top-level candidate when none are scripted
/// - `pick_most_relevant` always answers the first candidate
/// - `enrich` appends the Rule id and description to the analysis
#[derive(Debug, Default)]
pub struct FirstCandidateOracle {
    initial: Option<Vec<InitialEntry>>,
    classify_calls: AtomicUsize,
    pick_calls: AtomicUsize,
    enrich_calls: AtomicUsize,
}

impl FirstCandidateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the initial classification
    pub fn with_initial(entries: Vec<InitialEntry>) -> Self {
        Self {
            initial: Some(entries),
            ..Self::default()
        }
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn pick_calls(&self) -> usize {
        self.pick_calls.load(Ordering::SeqCst)
    }

    pub fn enrich_calls(&self) -> usize {
        self.enrich_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ClassificationOracle for FirstCandidateOracle {
    async fn classify_initial(
        &self,
        request: ClassifyRequest,
    ) -> Result<Vec<InitialEntry>, OracleError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.initial.clone().unwrap_or_else(|| {
            request
                .candidates
                .iter()
                .map(|c| InitialEntry::new(format!("issue with {c}"), [c.clone()]))
                .collect()
        }))
    }

    async fn pick_most_relevant(&self, request: PickRequest) -> Result<ConceptId, OracleError> {
        self.pick_calls.fetch_add(1, Ordering::SeqCst);
        request
            .candidates
            .first()
            .cloned()
            .ok_or_else(|| OracleError::ContractViolation("no candidates".into()))
    }

    async fn enrich(&self, request: EnrichRequest) -> Result<String, OracleError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "{} [{}] {}",
            request.analysis, request.concept, request.detail.description
        ))
    }
}

/// Graph wrapper counting calls per operation
#[derive(Debug, Default)]
pub struct CountingGraph<G> {
    inner: G,
    top_calls: AtomicUsize,
    neighbor_calls: AtomicUsize,
    label_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl<G> CountingGraph<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            top_calls: AtomicUsize::new(0),
            neighbor_calls: AtomicUsize::new(0),
            label_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    pub fn top_calls(&self) -> usize {
        self.top_calls.load(Ordering::SeqCst)
    }

    pub fn neighbor_calls(&self) -> usize {
        self.neighbor_calls.load(Ordering::SeqCst)
    }

    pub fn label_calls(&self) -> usize {
        self.label_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.top_calls() + self.neighbor_calls() + self.label_calls() + self.detail_calls()
    }
}

#[async_trait::async_trait]
impl<G: ConceptGraph> ConceptGraph for CountingGraph<G> {
    async fn top_concepts(&self) -> Result<Vec<ConceptId>, GraphError> {
        self.top_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.top_concepts().await
    }

    async fn neighbors(&self, id: &ConceptId) -> Result<Vec<ConceptId>, GraphError> {
        self.neighbor_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.neighbors(id).await
    }

    async fn labels(&self, id: &ConceptId) -> Result<BTreeSet<String>, GraphError> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.labels(id).await
    }

    async fn detail(&self, id: &ConceptId) -> Result<NodeDetail, GraphError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.detail(id).await
    }
}
