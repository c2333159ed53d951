//! Knowledge retrieval for retail-core
//!
//! Agents look up supporting snippets through [`KnowledgeBase`]. The
//! bundled [`SqliteKnowledgeStore`] ranks documents by keyword overlap;
//! [`EmptyKnowledgeBase`] stands in when retrieval is not configured.

mod store;
mod types;

pub use store::SqliteKnowledgeStore;
pub use types::{EmptyKnowledgeBase, KnowledgeBase, KnowledgeSnippet};
