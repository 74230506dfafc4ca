//! GKG Core - Grammar concept narrowing
//!
//! Resolves every grammar issue in a sentence down to a leaf Rule of the
//! taxonomy, then expands each explanation with that Rule's detail:
//! - Initial top-level classification builds the batch
//! - Narrowing rounds descend one level per round per unresolved item
//! - Items fail independently; the batch settles when none is pending
//! - Detail expansion enriches every resolved item
//!
//! # Example
//!
//! ```rust,ignore
//! use gkg_core::{GkgConfig, GrammarAnalyzer};
//! use std::sync::Arc;
//!
//! # async fn example(graph: gkg_graph::SharedGraph, oracle: gkg_oracle::SharedOracle) -> Result<(), gkg_core::CoreError> {
//! let analyzer = GrammarAnalyzer::new(graph, oracle, &GkgConfig::new());
//! let report = analyzer
//!     .analyze("I should ask the some people the Chinese cultures's beautiful.")
//!     .await?;
//!
//! for explanation in &report.explanations {
//!     println!("[{}] {}", explanation.concept, explanation.text);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod analyzer;
pub mod config;
pub mod detail;
pub mod error;
pub mod item;
pub mod narrowing;
pub mod retry;
pub mod review;

// Re-exports for convenience
pub use analyzer::{AnalysisReport, GrammarAnalyzer, RunId};
pub use config::{EngineConfig, GkgConfig, GraphConfig};
pub use detail::{DetailExpander, Explanation};
pub use error::{CoreError, FailureKind, ItemError, ItemFailure};
pub use item::{AnalysisItem, Batch, ItemState};
pub use narrowing::NarrowingEngine;
pub use retry::RetryPolicy;
pub use review::{normalize_essay, LetterReviewService};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with GKG Core
    pub use crate::{
        AnalysisReport, Batch, CoreError, Explanation, FailureKind, GkgConfig, GrammarAnalyzer,
        NarrowingEngine,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
