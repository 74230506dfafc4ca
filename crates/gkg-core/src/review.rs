//! Letter essay review
//!
//! Recognized text arrives as separate lines or words. `normalize_essay`
//! joins them back into prose before the reviewer sees it.

use crate::error::CoreError;
use crate::retry::RetryPolicy;
use gkg_oracle::{LetterReview, LetterReviewer, OracleError};
use std::sync::Arc;

const REVIEW_REMINDER: &str = "answer with a single JSON object in the output format above; \
the score is a number out of 15";

/// Join recognized fragments and reattach detached punctuation
#[must_use]
pub fn normalize_essay<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = fragments
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    joined.replace(" .", ".").replace(" ,", ",")
}

/// Essay and single-sentence review over a `LetterReviewer`
#[derive(Clone)]
pub struct LetterReviewService {
    reviewer: Arc<dyn LetterReviewer>,
    retry: RetryPolicy,
}

impl LetterReviewService {
    /// Create service over a reviewer
    #[must_use]
    pub fn new(reviewer: Arc<dyn LetterReviewer>) -> Self {
        Self {
            reviewer,
            retry: RetryPolicy::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Review a whole letter
    ///
    /// An unusable answer is retried once with a format reminder.
    pub async fn review(&self, essay: &str) -> Result<LetterReview, CoreError> {
        let essay = essay.trim();
        if essay.is_empty() {
            return Err(CoreError::InvalidInput("empty essay".to_string()));
        }
        let review = match self.request_review(essay, None).await {
            Ok(review) => review,
            Err(e) if e.is_contract_violation() => {
                tracing::warn!("Letter review unusable ({e}), retrying once");
                self.request_review(essay, Some(REVIEW_REMINDER)).await?
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!("Letter reviewed, score {}", review.score);
        Ok(review)
    }

    async fn request_review(
        &self,
        essay: &str,
        reminder: Option<&str>,
    ) -> Result<LetterReview, OracleError> {
        let reviewer = &self.reviewer;
        self.retry
            .run("review_letter", move || reviewer.review_letter(essay, reminder))
            .await
    }

    /// Free-form analysis of one sentence
    pub async fn analyze_sentence(&self, sentence: &str) -> Result<String, CoreError> {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return Err(CoreError::InvalidInput("empty sentence".to_string()));
        }
        let reviewer = &self.reviewer;
        Ok(self
            .retry
            .run("analyze_sentence", move || reviewer.analyze_sentence(sentence))
            .await?)
    }
}

impl std::fmt::Debug for LetterReviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LetterReviewService")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyReviewer {
        failures_left: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LetterReviewer for FlakyReviewer {
        async fn review_letter(
            &self,
            essay: &str,
            _reminder: Option<&str>,
        ) -> Result<LetterReview, OracleError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(OracleError::Unavailable("503".into()));
            }
            Ok(LetterReview {
                score: format!("{}/15", essay.split_whitespace().count().min(15)),
                ..LetterReview::default()
            })
        }

        async fn analyze_sentence(&self, sentence: &str) -> Result<String, OracleError> {
            Ok(format!("analysis of {sentence}"))
        }
    }

    /// Answers in prose until reminded of the format
    struct ProseReviewer {
        calls: AtomicU32,
        reminded: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LetterReviewer for ProseReviewer {
        async fn review_letter(
            &self,
            _essay: &str,
            reminder: Option<&str>,
        ) -> Result<LetterReview, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match reminder {
                Some(_) => {
                    self.reminded.fetch_add(1, Ordering::SeqCst);
                    gkg_oracle::parse::parse_review(r#"{"score": 12}"#)
                }
                None => Err(OracleError::Malformed("letter review: no JSON value".into())),
            }
        }

        async fn analyze_sentence(&self, _sentence: &str) -> Result<String, OracleError> {
            Err(OracleError::Malformed("unused".into()))
        }
    }

    fn service(failures: u32) -> LetterReviewService {
        LetterReviewService::new(Arc::new(FlakyReviewer {
            failures_left: AtomicU32::new(failures),
        }))
        .with_retry(RetryPolicy::immediate(3))
    }

    #[test]
    fn normalize_reattaches_punctuation() {
        let essay = normalize_essay(["Dear Tom ,", "", "  I am fine .  ", "Yours"]);
        assert_eq!(essay, "Dear Tom, I am fine. Yours");
    }

    #[tokio::test]
    async fn review_retries_transient_failures() {
        let review = service(2).review("Dear Tom, I am fine.").await.unwrap();
        assert_eq!(review.score, "5/15");
    }

    #[tokio::test]
    async fn unusable_review_is_retried_once_with_reminder() {
        let reviewer = Arc::new(ProseReviewer {
            calls: AtomicU32::new(0),
            reminded: AtomicU32::new(0),
        });
        let review = LetterReviewService::new(reviewer.clone())
            .with_retry(RetryPolicy::immediate(3))
            .review("Dear Tom, I am fine.")
            .await
            .unwrap();

        assert_eq!(review.score, "12");
        assert_eq!(reviewer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reviewer.reminded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_essay_is_invalid_input() {
        assert!(matches!(
            service(0).review("   ").await,
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn sentence_analysis_passes_through() {
        let text = service(0).analyze_sentence(" He go home. ").await.unwrap();
        assert_eq!(text, "analysis of He go home.");
    }
}
