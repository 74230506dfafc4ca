//! Batch state model
//!
//! An `AnalysisItem` only moves forward: `Narrowing` to `Resolved` or
//! `Failed`, never back. Outside this crate items are read-only.

use crate::error::ItemFailure;
use gkg_graph::ConceptId;
use serde::Serialize;

/// Lifecycle of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    /// Still descending
    Narrowing,
    /// Holds exactly one Rule id
    Resolved,
    /// Abandoned with a reported failure
    Failed(ItemFailure),
}

/// One independently tracked grammar issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisItem {
    analysis: String,
    concepts: Vec<ConceptId>,
    state: ItemState,
    rounds: u32,
}

impl AnalysisItem {
    pub(crate) fn new(analysis: impl Into<String>, concept: ConceptId) -> Self {
        Self {
            analysis: analysis.into(),
            concepts: vec![concept],
            state: ItemState::Narrowing,
            rounds: 0,
        }
    }

    /// Item that never entered narrowing
    pub(crate) fn failed(analysis: impl Into<String>, concepts: Vec<ConceptId>, failure: ItemFailure) -> Self {
        Self {
            analysis: analysis.into(),
            concepts,
            state: ItemState::Failed(failure),
            rounds: 0,
        }
    }

    /// Explanation text
    #[inline]
    #[must_use]
    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    /// Current candidate concepts
    #[inline]
    #[must_use]
    pub fn concepts(&self) -> &[ConceptId] {
        &self.concepts
    }

    /// Current concept
    #[inline]
    #[must_use]
    pub fn concept(&self) -> Option<&ConceptId> {
        self.concepts.first()
    }

    /// Lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &ItemState {
        &self.state
    }

    /// Settled on a Rule
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, ItemState::Resolved)
    }

    /// Still narrowing
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, ItemState::Narrowing)
    }

    /// Failure, if the item was abandoned
    #[must_use]
    pub fn failure(&self) -> Option<&ItemFailure> {
        match &self.state {
            ItemState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Narrowing rounds this item took part in
    #[inline]
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub(crate) fn descend_to(&mut self, concept: ConceptId) {
        if self.is_pending() {
            self.concepts = vec![concept];
        }
    }

    pub(crate) fn mark_resolved(&mut self) {
        if self.is_pending() {
            self.state = ItemState::Resolved;
        }
    }

    pub(crate) fn fail(&mut self, failure: ItemFailure) {
        if self.is_pending() {
            self.state = ItemState::Failed(failure);
        }
    }

    pub(crate) fn count_round(&mut self) {
        self.rounds += 1;
    }

    #[cfg(test)]
    pub(crate) fn forced_resolved(analysis: &str, concept: &str) -> Self {
        let mut item = Self::new(analysis, ConceptId::from(concept));
        item.mark_resolved();
        item
    }
}

/// All items found in one sentence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Batch {
    items: Vec<AnalysisItem>,
    rounds: u32,
}

impl Batch {
    pub(crate) fn new(items: Vec<AnalysisItem>) -> Self {
        Self { items, rounds: 0 }
    }

    #[inline]
    #[must_use]
    pub fn items(&self) -> &[AnalysisItem] {
        &self.items
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Narrowing rounds run so far
    #[inline]
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Indices of items still narrowing
    #[must_use]
    pub fn pending(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_pending())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// No item is still narrowing
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.items.iter().all(|item| !item.is_pending())
    }

    /// Every item resolved to a Rule
    #[must_use]
    pub fn is_fully_resolved(&self) -> bool {
        self.items.iter().all(AnalysisItem::is_resolved)
    }

    /// Reported failures, in item order
    #[must_use]
    pub fn failures(&self) -> Vec<ItemFailure> {
        self.items.iter().filter_map(|i| i.failure().cloned()).collect()
    }

    /// Hand resolved items over with their batch indices
    #[must_use]
    pub fn into_resolved(self) -> Vec<(usize, AnalysisItem)> {
        self.items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| item.is_resolved())
            .collect()
    }

    pub(crate) fn item_mut(&mut self, idx: usize) -> Option<&mut AnalysisItem> {
        self.items.get_mut(idx)
    }

    pub(crate) fn count_round(&mut self) {
        self.rounds += 1;
    }

    #[cfg(test)]
    pub(crate) fn from_items(items: Vec<AnalysisItem>) -> Self {
        Self::new(items)
    }
}
