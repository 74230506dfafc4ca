//! In-memory taxonomy store
//!
//! A `petgraph` directed graph of concept nodes connected by typed
//! relations, loadable from a JSON or YAML taxonomy document.

use crate::error::GraphError;
use crate::query::ConceptGraph;
use crate::types::{labels, ConceptId, ConceptNode, NodeDetail, Relation};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Serialized taxonomy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyDocument {
    /// Node declarations
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// Edge declarations
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// Node declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, alias = "type")]
    pub level: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub example: Option<String>,
}

/// Edge declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub relation: Relation,
}

/// Taxonomy graph
#[derive(Debug, Clone, Default)]
pub struct TaxonomyGraph {
    graph: DiGraph<ConceptNode, Relation>,
    index: HashMap<ConceptId, NodeIndex>,
}

impl TaxonomyGraph {
    /// Create empty taxonomy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed document
    ///
    /// # Errors
    /// - `GraphError::InvalidTaxonomy` on duplicate ids, missing labels,
    ///   unknown edge endpoints or misplaced `HAS_EXAMPLE` edges
    pub fn from_document(doc: TaxonomyDocument) -> Result<Self, GraphError> {
        let mut taxonomy = Self::new();

        for spec in doc.nodes {
            if spec.labels.is_empty() {
                return Err(GraphError::InvalidTaxonomy(format!(
                    "node {} has no labels",
                    spec.id
                )));
            }
            taxonomy.add_node(ConceptNode {
                id: ConceptId(spec.id),
                labels: spec.labels.into_iter().collect(),
                level: spec.level,
                description: spec.description,
                examples: spec.examples,
                example: spec.example,
            })?;
        }

        for edge in doc.edges {
            taxonomy.add_edge(&ConceptId(edge.from), &ConceptId(edge.to), edge.relation)?;
        }

        tracing::debug!(
            nodes = taxonomy.node_count(),
            edges = taxonomy.edge_count(),
            "Taxonomy built"
        );
        Ok(taxonomy)
    }

    /// Parse a JSON taxonomy document
    pub fn from_json_str(input: &str) -> Result<Self, GraphError> {
        let doc: TaxonomyDocument = serde_json::from_str(input)?;
        Self::from_document(doc)
    }

    /// Parse a YAML taxonomy document
    pub fn from_yaml_str(input: &str) -> Result<Self, GraphError> {
        let doc: TaxonomyDocument = serde_yaml::from_str(input)?;
        Self::from_document(doc)
    }

    /// Load a taxonomy file, format chosen by extension
    ///
    /// # Errors
    /// - `GraphError::Io` if the file cannot be read
    /// - `GraphError::Parse` for unsupported extensions or bad content
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::info!("Loading taxonomy from {}", path.display());

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            other => Err(GraphError::Parse(format!(
                "unsupported taxonomy format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Insert node
    pub fn add_node(&mut self, node: ConceptNode) -> Result<(), GraphError> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::InvalidTaxonomy(format!(
                "duplicate node id: {}",
                node.id
            )));
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        Ok(())
    }

    /// Insert typed edge
    pub fn add_edge(
        &mut self,
        from: &ConceptId,
        to: &ConceptId,
        relation: Relation,
    ) -> Result<(), GraphError> {
        let source = self.endpoint(from)?;
        let target = self.endpoint(to)?;

        if relation == Relation::HasExample && !self.graph[source].is_rule() {
            return Err(GraphError::InvalidTaxonomy(format!(
                "HAS_EXAMPLE edge from non-Rule node {from}"
            )));
        }

        self.graph.add_edge(source, target, relation);
        Ok(())
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, id: &ConceptId) -> Option<&ConceptNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Fail if repeated neighbor expansion can revisit a node
    pub fn validate_descent(&self) -> Result<(), GraphError> {
        let descent = self.descent_graph();

        if let Some(cycle) = tarjan_scc(&descent).into_iter().find(|scc| scc.len() > 1) {
            let path = cycle
                .into_iter()
                .map(|idx| self.graph[idx].id.clone())
                .collect();
            return Err(GraphError::DescentCycle { path });
        }
        Ok(())
    }

    /// Longest descent from any top concept, in expansion steps
    ///
    /// # Errors
    /// - `GraphError::DescentCycle` if the descent relation is cyclic
    pub fn descent_depth(&self) -> Result<usize, GraphError> {
        self.validate_descent()?;
        let descent = self.descent_graph();

        let order = toposort(&descent, None).map_err(|cycle| GraphError::DescentCycle {
            path: vec![self.graph[cycle.node_id()].id.clone()],
        })?;

        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        for &idx in order.iter().rev() {
            let below = descent
                .neighbors_directed(idx, Direction::Outgoing)
                .filter_map(|succ| depth.get(&succ).copied())
                .max()
                .map_or(0, |d| d + 1);
            depth.insert(idx, below);
        }

        Ok(self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_top())
            .filter_map(|idx| depth.get(&idx).copied())
            .max()
            .unwrap_or(0))
    }

    fn endpoint(&self, id: &ConceptId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::InvalidTaxonomy(format!("edge references unknown node {id}")))
    }

    fn index_of(&self, id: &ConceptId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    /// Descend-only neighbor indices, in node insertion order
    fn neighbor_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let outgoing = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| matches!(e.weight(), Relation::BelongsTo | Relation::HasSubclass))
            .map(|e| e.target());
        let incoming = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| *e.weight() == Relation::BelongsTo)
            .map(|e| e.source());

        let mut out: Vec<NodeIndex> = outgoing.chain(incoming).filter(|&n| n != idx).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Expansion relation: only non-Rule nodes are ever expanded
    fn descent_graph(&self) -> DiGraphMap<NodeIndex, ()> {
        let mut descent = DiGraphMap::new();
        for idx in self.graph.node_indices() {
            descent.add_node(idx);
            if self.graph[idx].is_rule() {
                continue;
            }
            for next in self.neighbor_indices(idx) {
                descent.add_edge(idx, next, ());
            }
        }
        descent
    }
}

#[async_trait::async_trait]
impl ConceptGraph for TaxonomyGraph {
    async fn top_concepts(&self) -> Result<Vec<ConceptId>, GraphError> {
        Ok(self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_top())
            .map(|idx| self.graph[idx].id.clone())
            .collect())
    }

    async fn neighbors(&self, id: &ConceptId) -> Result<Vec<ConceptId>, GraphError> {
        let idx = self.index_of(id)?;
        Ok(self
            .neighbor_indices(idx)
            .into_iter()
            .map(|n| self.graph[n].id.clone())
            .collect())
    }

    async fn labels(&self, id: &ConceptId) -> Result<BTreeSet<String>, GraphError> {
        let idx = self.index_of(id)?;
        Ok(self.graph[idx].labels.clone())
    }

    async fn detail(&self, id: &ConceptId) -> Result<NodeDetail, GraphError> {
        let idx = self.index_of(id)?;
        let node = &self.graph[idx];
        if !node.is_rule() {
            return Err(GraphError::InvalidNodeKind {
                id: id.clone(),
                labels: node.labels.iter().cloned().collect(),
            });
        }

        let mut example_edges: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == Relation::HasExample)
            .map(|e| (e.id(), e.target()))
            .collect();
        example_edges.sort_unstable();

        let mut examples = node.examples.clone();
        examples.extend(example_edges.into_iter().filter_map(|(_, target)| {
            let example = &self.graph[target];
            if example.labels.contains(labels::EXAMPLE) {
                example.example.clone()
            } else {
                None
            }
        }));

        Ok(NodeDetail {
            description: node.description.clone().unwrap_or_default(),
            examples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(values: &[&str]) -> Vec<ConceptId> {
        values.iter().map(|v| ConceptId::from(*v)).collect()
    }

    fn sample() -> TaxonomyGraph {
        let mut g = TaxonomyGraph::new();
        g.add_node(ConceptNode::concept("Grammar")).unwrap();
        g.add_node(ConceptNode::top("Articles")).unwrap();
        g.add_node(ConceptNode::concept("Definite")).unwrap();
        g.add_node(ConceptNode::rule("Articles-Rule-1", "Use 'the' for specific nouns"))
            .unwrap();
        let mut example = ConceptNode::new("Ex-1", labels::EXAMPLE);
        example.example = Some("Pass me the salt.".to_string());
        g.add_node(example).unwrap();

        g.add_edge(&"Grammar".into(), &"Articles".into(), Relation::HasSubclass)
            .unwrap();
        g.add_edge(&"Articles".into(), &"Definite".into(), Relation::HasSubclass)
            .unwrap();
        g.add_edge(&"Articles-Rule-1".into(), &"Definite".into(), Relation::BelongsTo)
            .unwrap();
        g.add_edge(&"Articles-Rule-1".into(), &"Ex-1".into(), Relation::HasExample)
            .unwrap();
        g
    }

    #[tokio::test]
    async fn top_concepts_only_tagged_roots() {
        let g = sample();
        assert_eq!(g.top_concepts().await.unwrap(), ids(&["Articles"]));
    }

    #[tokio::test]
    async fn subclass_edges_are_not_climbed() {
        let g = sample();
        // Grammar -> Articles is a subclass edge with Articles as target
        assert_eq!(g.neighbors(&"Articles".into()).await.unwrap(), ids(&["Definite"]));
    }

    #[tokio::test]
    async fn belongs_to_is_undirected() {
        let g = sample();
        assert_eq!(
            g.neighbors(&"Definite".into()).await.unwrap(),
            ids(&["Articles-Rule-1"])
        );
        assert_eq!(
            g.neighbors(&"Articles-Rule-1".into()).await.unwrap(),
            ids(&["Definite"])
        );
    }

    #[tokio::test]
    async fn detail_merges_inline_and_linked_examples() {
        let mut g = sample();
        let mut extra = ConceptNode::new("Ex-2", labels::EXAMPLE);
        extra.example = Some("The sun rises.".to_string());
        g.add_node(extra).unwrap();
        g.add_edge(&"Articles-Rule-1".into(), &"Ex-2".into(), Relation::HasExample)
            .unwrap();

        let detail = g.detail(&"Articles-Rule-1".into()).await.unwrap();
        assert_eq!(detail.description, "Use 'the' for specific nouns");
        assert_eq!(detail.examples, vec!["Pass me the salt.", "The sun rises."]);
    }

    #[tokio::test]
    async fn detail_rejects_non_rule() {
        let g = sample();
        let err = g.detail(&"Articles".into()).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidNodeKind { .. }));
    }

    #[tokio::test]
    async fn labels_of_unknown_node() {
        let g = sample();
        let err = g.labels(&"Nope".into()).await.unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(id) if id.as_str() == "Nope"));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut g = sample();
        let err = g.add_node(ConceptNode::top("Articles")).unwrap_err();
        assert!(matches!(err, GraphError::InvalidTaxonomy(_)));
    }

    #[test]
    fn example_edge_requires_rule_source() {
        let mut g = sample();
        let err = g
            .add_edge(&"Definite".into(), &"Ex-1".into(), Relation::HasExample)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidTaxonomy(_)));
    }

    #[test]
    fn descent_depth_counts_expansion_steps() {
        // Articles -> Definite -> Articles-Rule-1
        assert_eq!(sample().descent_depth().unwrap(), 2);
    }

    #[test]
    fn belongs_to_between_concepts_is_a_cycle() {
        let mut g = sample();
        g.add_node(ConceptNode::concept("Indefinite")).unwrap();
        g.add_edge(&"Definite".into(), &"Indefinite".into(), Relation::BelongsTo)
            .unwrap();
        let err = g.validate_descent().unwrap_err();
        assert!(matches!(err, GraphError::DescentCycle { path } if path.len() == 2));
    }
}
