//! Oracle traits
//!
//! Calls are slow, non-deterministic across invocations and may fail
//! transiently. Implementations do not validate responses against the
//! candidate set; the engine does.

use crate::error::OracleError;
use crate::types::{ClassifyRequest, EnrichRequest, InitialEntry, LetterReview, PickRequest};
use gkg_graph::ConceptId;
use std::sync::Arc;

/// Shared oracle handle
pub type SharedOracle = Arc<dyn ClassificationOracle>;

/// Classification and generation contract used by the narrowing engine
#[async_trait::async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// One entry per grammar issue in the sentence
    async fn classify_initial(
        &self,
        request: ClassifyRequest,
    ) -> Result<Vec<InitialEntry>, OracleError>;

    /// The candidate judged most relevant to the analysis
    async fn pick_most_relevant(&self, request: PickRequest) -> Result<ConceptId, OracleError>;

    /// Analysis rewritten with the Rule's description and examples
    async fn enrich(&self, request: EnrichRequest) -> Result<String, OracleError>;
}

/// Whole-essay review
#[async_trait::async_trait]
pub trait LetterReviewer: Send + Sync {
    /// Score and annotate a letter essay
    ///
    /// `reminder` restates the output format after an unusable answer.
    async fn review_letter(
        &self,
        essay: &str,
        reminder: Option<&str>,
    ) -> Result<LetterReview, OracleError>;

    /// Free-form analysis of a single sentence
    async fn analyze_sentence(&self, sentence: &str) -> Result<String, OracleError>;
}

#[async_trait::async_trait]
impl<O: ClassificationOracle + ?Sized> ClassificationOracle for Arc<O> {
    async fn classify_initial(
        &self,
        request: ClassifyRequest,
    ) -> Result<Vec<InitialEntry>, OracleError> {
        (**self).classify_initial(request).await
    }

    async fn pick_most_relevant(&self, request: PickRequest) -> Result<ConceptId, OracleError> {
        (**self).pick_most_relevant(request).await
    }

    async fn enrich(&self, request: EnrichRequest) -> Result<String, OracleError> {
        (**self).enrich(request).await
    }
}
