//! GKG Oracle - External judgment service
//!
//! The narrowing engine depends on this contract but never on a concrete
//! model. Three call shapes:
//! - `classify_initial`: sentence + top-level candidates → one entry per issue
//! - `pick_most_relevant`: analysis + candidates → one id
//! - `enrich`: analysis + Rule detail → expanded explanation
//!
//! `LlmOracle` implements the contract (and letter review) against an
//! OpenAI-compatible chat-completions endpoint.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod llm;
pub mod oracle;
pub mod parse;
pub mod prompts;
pub mod types;

pub use error::OracleError;
pub use llm::{LlmConfig, LlmOracle};
pub use oracle::{ClassificationOracle, LetterReviewer, SharedOracle};
pub use prompts::PromptTemplate;
pub use types::{
    ClassifyRequest, EnrichRequest, InitialEntry, LetterErrors, LetterHighlights, LetterReview,
    PickRequest,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
