//! Oracle request/response records

use gkg_graph::{ConceptId, NodeDetail};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Initial top-level classification of a whole sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Sentence under analysis
    pub sentence: String,
    /// Top-level concepts to choose from
    pub candidates: Vec<ConceptId>,
    /// Restated constraint after a contract violation
    pub reminder: Option<String>,
}

impl ClassifyRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(sentence: impl Into<String>, candidates: Vec<ConceptId>) -> Self {
        Self {
            sentence: sentence.into(),
            candidates,
            reminder: None,
        }
    }

    /// With reminder
    #[inline]
    #[must_use]
    pub fn with_reminder(mut self, reminder: impl Into<String>) -> Self {
        self.reminder = Some(reminder.into());
        self
    }
}

/// One grammar issue found by the initial classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialEntry {
    /// Short explanation of the issue
    pub analysis: String,
    /// Concept ids (contractually exactly one)
    pub concepts: Vec<ConceptId>,
}

impl InitialEntry {
    /// Create new entry
    #[must_use]
    pub fn new<I, C>(analysis: impl Into<String>, concepts: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConceptId>,
    {
        Self {
            analysis: analysis.into(),
            concepts: concepts.into_iter().map(Into::into).collect(),
        }
    }
}

/// Pick the single most relevant candidate for one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRequest {
    /// Item analysis text
    pub analysis: String,
    /// Candidate concepts
    pub candidates: Vec<ConceptId>,
    /// Restated constraint after a contract violation
    pub reminder: Option<String>,
}

impl PickRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(analysis: impl Into<String>, candidates: Vec<ConceptId>) -> Self {
        Self {
            analysis: analysis.into(),
            candidates,
            reminder: None,
        }
    }

    /// With reminder
    #[inline]
    #[must_use]
    pub fn with_reminder(mut self, reminder: impl Into<String>) -> Self {
        self.reminder = Some(reminder.into());
        self
    }
}

/// Rewrite an analysis using the detail of its resolved Rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichRequest {
    /// Item analysis text
    pub analysis: String,
    /// Resolved Rule id
    pub concept: ConceptId,
    /// Rule detail
    pub detail: NodeDetail,
    /// Restated constraint after a contract violation
    #[serde(default)]
    pub reminder: Option<String>,
}

impl EnrichRequest {
    /// Create new request
    #[inline]
    #[must_use]
    pub fn new(analysis: impl Into<String>, concept: ConceptId, detail: NodeDetail) -> Self {
        Self {
            analysis: analysis.into(),
            concept,
            detail,
            reminder: None,
        }
    }

    /// With reminder
    #[inline]
    #[must_use]
    pub fn with_reminder(mut self, reminder: impl Into<String>) -> Self {
        self.reminder = Some(reminder.into());
        self
    }
}

/// Structured review of a letter essay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterReview {
    /// Score out of 15, as the model wrote it
    #[serde(deserialize_with = "score_text")]
    pub score: String,
    /// Error analysis
    #[serde(default)]
    pub errors: LetterErrors,
    /// Highlight analysis
    #[serde(default)]
    pub highlights: LetterHighlights,
    /// Writing suggestions
    #[serde(default)]
    pub suggestions: String,
}

/// Error analysis section of a letter review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterErrors {
    #[serde(default)]
    pub spelling: String,
    #[serde(default)]
    pub grammar: String,
    #[serde(default)]
    pub word_choice: String,
}

/// Highlight section of a letter review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterHighlights {
    #[serde(default)]
    pub advanced_vocabulary: String,
    #[serde(default)]
    pub expressions: String,
}

/// Models answer `"12"`, `12` or `12.5` for the score
fn score_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number score, got {other}"
        ))),
    }
}
