//! Core taxonomy types
//!
//! Defines the data the query interface hands out:
//! - Concept identifiers
//! - Concept nodes and their labels
//! - Typed relations between nodes
//! - Rule details

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Well-known node labels
pub mod labels {
    /// Any grammar concept in the hierarchy
    pub const GRAMMAR_CONCEPT: &str = "GrammarConcept";
    /// Terminal concept carrying a description and examples
    pub const RULE: &str = "Rule";
    /// Example sentence attached to a Rule
    pub const EXAMPLE: &str = "Example";
}

/// `level` value marking a root of the taxonomy
pub const TOP_LEVEL: &str = "top";

/// Opaque concept identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(pub String);

impl ConceptId {
    /// Create new concept id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ConceptId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A taxonomy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Unique id
    pub id: ConceptId,
    /// Type tags
    pub labels: BTreeSet<String>,
    /// Hierarchy tier (`"top"` for roots)
    pub level: Option<String>,
    /// Rule description
    pub description: Option<String>,
    /// Inline Rule examples
    pub examples: Vec<String>,
    /// Example text carried by `Example` nodes
    pub example: Option<String>,
}

impl ConceptNode {
    /// Create node with a single label
    #[must_use]
    pub fn new(id: impl Into<ConceptId>, label: &str) -> Self {
        let mut set = BTreeSet::new();
        set.insert(label.to_string());
        Self {
            id: id.into(),
            labels: set,
            level: None,
            description: None,
            examples: Vec::new(),
            example: None,
        }
    }

    /// Top-level grammar concept
    #[must_use]
    pub fn top(id: impl Into<ConceptId>) -> Self {
        Self::new(id, labels::GRAMMAR_CONCEPT).with_level(TOP_LEVEL)
    }

    /// Intermediate grammar concept
    #[must_use]
    pub fn concept(id: impl Into<ConceptId>) -> Self {
        Self::new(id, labels::GRAMMAR_CONCEPT)
    }

    /// Terminal Rule
    #[must_use]
    pub fn rule(id: impl Into<ConceptId>, description: impl Into<String>) -> Self {
        Self::new(id, labels::RULE).with_description(description)
    }

    /// With level
    #[inline]
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// With extra label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With inline examples
    #[inline]
    #[must_use]
    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    /// With example sentence (Example nodes)
    #[inline]
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Check terminal status
    #[inline]
    #[must_use]
    pub fn is_rule(&self) -> bool {
        self.labels.contains(labels::RULE)
    }

    /// Check top-level status
    #[inline]
    #[must_use]
    pub fn is_top(&self) -> bool {
        self.labels.contains(labels::GRAMMAR_CONCEPT) && self.level.as_deref() == Some(TOP_LEVEL)
    }
}

/// Typed relation between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    /// Membership, traversed in both directions
    BelongsTo,
    /// Hierarchy, traversed from source only
    HasSubclass,
    /// Rule to Example, never traversed by expansion
    HasExample,
}

/// Leaf detail of a Rule node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDetail {
    /// Rule description
    pub description: String,
    /// Ordered examples
    pub examples: Vec<String>,
}

/// True when the label set marks a terminal node
#[inline]
#[must_use]
pub fn is_rule_labels(node_labels: &BTreeSet<String>) -> bool {
    node_labels.contains(labels::RULE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_wire_names() {
        let json = serde_json::to_string(&Relation::HasSubclass).unwrap();
        assert_eq!(json, "\"HAS_SUBCLASS\"");
        let parsed: Relation = serde_json::from_str("\"BELONGS_TO\"").unwrap();
        assert_eq!(parsed, Relation::BelongsTo);
    }

    #[test]
    fn node_kind_helpers() {
        assert!(ConceptNode::top("Articles").is_top());
        assert!(!ConceptNode::concept("Definite").is_top());
        assert!(ConceptNode::rule("Articles-Rule-1", "the + noun").is_rule());
        assert!(!ConceptNode::top("Articles").is_rule());
    }

    #[test]
    fn concept_id_is_transparent() {
        let id: ConceptId = serde_json::from_str("\"Possessives\"").unwrap();
        assert_eq!(id, ConceptId::from("Possessives"));
        assert_eq!(id.to_string(), "Possessives");
    }
}
