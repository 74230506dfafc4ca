//! GKG Graph - Grammar concept taxonomy access
//!
//! Read-only view over a hierarchical grammar taxonomy:
//! - Top-level concept discovery
//! - Descend-only neighbor expansion (`BELONGS_TO` either way, `HAS_SUBCLASS` outgoing)
//! - Node labels and Rule details (description + examples)
//!
//! # Example
//!
//! ```rust,ignore
//! use gkg_graph::{ConceptGraph, TaxonomyGraph};
//!
//! # async fn example() -> Result<(), gkg_graph::GraphError> {
//! let graph = TaxonomyGraph::load("taxonomy.yaml")?;
//! graph.validate_descent()?;
//!
//! for id in graph.top_concepts().await? {
//!     println!("{id}: {:?}", graph.neighbors(&id).await?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod error;
pub mod query;
pub mod taxonomy;
pub mod types;

pub use cache::{CacheStats, CachedGraph};
pub use error::GraphError;
pub use query::{ConceptGraph, SharedGraph};
pub use taxonomy::{EdgeSpec, NodeSpec, TaxonomyDocument, TaxonomyGraph};
pub use types::{labels, ConceptId, ConceptNode, NodeDetail, Relation, TOP_LEVEL};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
