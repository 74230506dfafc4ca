//! LLM-backed oracle
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. Each call is
//! a single request; retries belong to the caller.

use crate::error::OracleError;
use crate::oracle::{ClassificationOracle, LetterReviewer};
use crate::parse::{parse_initial, parse_pick, parse_review};
use crate::prompts::{self, with_reminder};
use crate::types::{ClassifyRequest, EnrichRequest, InitialEntry, LetterReview, PickRequest};
use gkg_graph::ConceptId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// LLM client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint base, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// API key from the configured environment variable
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "GKG_LLM_API_KEY".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// Oracle backed by a chat-completions model
#[derive(Debug, Clone)]
pub struct LlmOracle {
    config: LlmConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LlmOracle {
    /// Build client from configuration
    ///
    /// # Errors
    /// - `OracleError::Config` if the HTTP client cannot be built
    pub fn new(config: LlmConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gkg/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Config(format!("failed to create HTTP client: {e}")))?;

        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!("{} is not set; sending unauthenticated requests", config.api_key_env);
        }

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// With explicit API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// One chat completion, returning the assistant text
    pub async fn complete(&self, user: &str) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompts::SYSTEM,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let mut request = self.client.post(self.config.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Config(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("response has no message content".to_string()))
    }
}

fn id_list(ids: &[ConceptId]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait::async_trait]
impl ClassificationOracle for LlmOracle {
    async fn classify_initial(
        &self,
        request: ClassifyRequest,
    ) -> Result<Vec<InitialEntry>, OracleError> {
        let nodes = id_list(&request.candidates);
        let prompt = prompts::CLASSIFY_INITIAL.render(&[
            ("message", request.sentence.as_str()),
            ("nodes", nodes.as_str()),
        ]);
        let text = self
            .complete(&with_reminder(prompt, request.reminder.as_deref()))
            .await?;
        tracing::debug!(response = %text, "classify_initial");
        parse_initial(&text)
    }

    async fn pick_most_relevant(&self, request: PickRequest) -> Result<ConceptId, OracleError> {
        let concepts = id_list(&request.candidates);
        let prompt = prompts::PICK_MOST_RELEVANT.render(&[
            ("analysis", request.analysis.as_str()),
            ("concepts", concepts.as_str()),
        ]);
        let text = self
            .complete(&with_reminder(prompt, request.reminder.as_deref()))
            .await?;
        tracing::debug!(response = %text, "pick_most_relevant");
        parse_pick(&text)
    }

    async fn enrich(&self, request: EnrichRequest) -> Result<String, OracleError> {
        let detail = serde_json::to_string(&request.detail)
            .map_err(|e| OracleError::Config(format!("detail serialization: {e}")))?;
        let prompt = prompts::ENRICH.render(&[
            ("analysis", request.analysis.as_str()),
            ("detail", detail.as_str()),
        ]);
        let text = self
            .complete(&with_reminder(prompt, request.reminder.as_deref()))
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(OracleError::ContractViolation("empty enrichment".to_string()));
        }
        Ok(text.to_string())
    }
}

#[async_trait::async_trait]
impl LetterReviewer for LlmOracle {
    async fn review_letter(
        &self,
        essay: &str,
        reminder: Option<&str>,
    ) -> Result<LetterReview, OracleError> {
        let prompt = prompts::LETTER_REVIEW.render(&[("essay", essay)]);
        let text = self.complete(&with_reminder(prompt, reminder)).await?;
        parse_review(&text)
    }

    async fn analyze_sentence(&self, sentence: &str) -> Result<String, OracleError> {
        let prompt = prompts::SINGLE_SENTENCE.render(&[("sentence", sentence)]);
        Ok(self.complete(&prompt).await?.trim().to_string())
    }
}
