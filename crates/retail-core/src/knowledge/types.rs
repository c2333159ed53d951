//! Knowledge snippet type and retrieval contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Result;

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: JsonValue,
    /// Relevance in `[0, 1]`, higher is better
    pub score: f64,
}

impl KnowledgeSnippet {
    pub fn new(id: impl Into<String>, content: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: JsonValue::Null,
            score,
        }
    }
}

/// Knowledge-retrieval service.
///
/// An empty result is a normal answer (nothing matched, or retrieval is
/// not configured) and must not be treated as a failure.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Search `collection` for `query`, best match first
    async fn search(
        &self,
        query: &str,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeSnippet>>;
}

/// Knowledge base with nothing in it
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyKnowledgeBase;

#[async_trait]
impl KnowledgeBase for EmptyKnowledgeBase {
    async fn search(
        &self,
        _query: &str,
        _collection: &str,
        _limit: usize,
    ) -> Result<Vec<KnowledgeSnippet>> {
        Ok(Vec::new())
    }
}
