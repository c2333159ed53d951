//! Knowledge storage implementation using SQLite

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::types::{KnowledgeBase, KnowledgeSnippet};
use crate::{Error, Result};

/// SQLite-backed document store with keyword-overlap ranking
pub struct SqliteKnowledgeStore {
    conn: Mutex<Connection>,
}

impl SqliteKnowledgeStore {
    /// Open (or create) the knowledge database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening knowledge database at: {}", db_path);
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        info!("SqliteKnowledgeStore initialized successfully");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("knowledge store lock poisoned".to_string()))
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
            [],
        )?;
        Ok(())
    }

    /// Store a document in `collection` and return its id
    pub fn add_document(
        &self,
        collection: &str,
        content: &str,
        metadata: JsonValue,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(&metadata)?;

        self.lock()?.execute(
            "INSERT INTO documents (id, collection, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, collection, content, metadata_json, Utc::now().to_rfc3339()],
        )?;

        debug!("Stored document {} in collection {}", id, collection);
        Ok(id)
    }

    /// Number of documents in `collection`
    pub fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete a document by id
    pub fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .lock()?
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn search_blocking(
        &self,
        query: &str,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeSnippet>> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, metadata FROM documents
             WHERE collection = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt
            .query_map(params![collection], |row| {
                let id: String = row.get(0)?;
                let content: String = row.get(1)?;
                let metadata_str: Option<String> = row.get(2)?;
                Ok((id, content, metadata_str))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut snippets: Vec<KnowledgeSnippet> = rows
            .into_iter()
            .filter_map(|(id, content, metadata_str)| {
                let score = overlap_score(&terms, &content);
                if score <= 0.0 {
                    return None;
                }
                let metadata = metadata_str
                    .and_then(|s| serde_json::from_str(&s).ok())
                    .unwrap_or(JsonValue::Null);
                Some(KnowledgeSnippet {
                    id,
                    content,
                    metadata,
                    score,
                })
            })
            .collect();

        // stable: equal scores keep newest-first order
        snippets.sort_by(|a, b| b.score.total_cmp(&a.score));
        snippets.truncate(limit);

        debug!(
            "Found {} snippets in {} matching query: {}",
            snippets.len(),
            collection,
            query
        );
        Ok(snippets)
    }
}

#[async_trait]
impl KnowledgeBase for SqliteKnowledgeStore {
    async fn search(
        &self,
        query: &str,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeSnippet>> {
        self.search_blocking(query, collection, limit)
    }
}

/// Lowercased distinct words of at least two characters
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
    {
        let word = word.to_lowercase();
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Fraction of query terms present in `content`
fn overlap_score(terms: &[String], content: &str) -> f64 {
    let content = content.to_lowercase();
    let hits = terms.iter().filter(|t| content.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_terms() {
        assert_eq!(
            query_terms("Q4 sales, sales revenue?"),
            vec!["q4".to_string(), "sales".to_string(), "revenue".to_string()]
        );
        assert!(query_terms("a ? !").is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() -> Result<()> {
        let store = SqliteKnowledgeStore::in_memory()?;
        store.add_document("sales_reports", "Q4 revenue grew 12% year over year", json!({}))?;
        store.add_document("sales_reports", "Revenue and sales by region for Q4", json!({"region": "west"}))?;
        store.add_document("inventory_data", "Q4 sales revenue for stock planning", json!({}))?;

        let hits = store.search("Q4 sales revenue", "sales_reports", 5).await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "Revenue and sales by region for Q4");
        assert!((hits[0].score - 1.0).abs() < f64::EPSILON);
        assert!(hits[1].score < hits[0].score);
        assert_eq!(hits[0].metadata["region"], "west");
        Ok(())
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_collection() -> Result<()> {
        let store = SqliteKnowledgeStore::in_memory()?;
        for i in 0..4 {
            store.add_document("inventory_data", &format!("stock level report {}", i), json!({}))?;
        }

        assert_eq!(store.search("stock", "inventory_data", 2).await?.len(), 2);
        assert!(store.search("stock", "sales_reports", 5).await?.is_empty());
        assert_eq!(store.count("inventory_data")?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() -> Result<()> {
        let store = SqliteKnowledgeStore::in_memory()?;
        store.add_document("retail_documents", "store layout guidelines", json!({}))?;

        let hits = store.search("warranty", "retail_documents", 5).await?;
        assert!(hits.is_empty());
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let store = SqliteKnowledgeStore::in_memory()?;
        let id = store.add_document("sales_reports", "temporary", json!({}))?;

        assert!(store.delete(&id)?);
        assert!(!store.delete(&id)?);
        assert_eq!(store.count("sales_reports")?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_knowledge_base() -> Result<()> {
        let kb = crate::knowledge::EmptyKnowledgeBase;
        assert!(kb.search("anything", "sales_reports", 5).await?.is_empty());
        Ok(())
    }
}
