//! Knowledge store: a persistent, searchable index over extraction results.
//!
//! Three tables carry the whole model:
//!
//! ```text
//! documents          one row per file path (upsert on re-ingest)
//! keywords           one row per normalized keyword, unique
//! document_keywords  document × keyword × page, with context + relevance
//! ```
//!
//! The "concept network" the `related` query exposes is deliberately *not* a
//! stored structure: co-occurrence is a query-time self-join over
//! `document_keywords`, so re-ingesting a document can never leave a stale
//! graph behind.
//!
//! ## Ingestion semantics
//!
//! `ingest` runs as a single transaction: upsert the document row, delete its
//! previous associations, insert the new ones, drop orphaned keywords.
//! Re-ingesting the same file path is therefore idempotent, and readers never
//! observe a half-completed ingest. The connection lives behind a `Mutex`,
//! which also provides the required write serialization per file path.

use crate::error::PaperdexError;
use crate::output::ExtractionResult;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Relevance assigned to a keyword the AI surfaced but that does not occur
/// literally in the page text (paraphrased concepts, expanded acronyms).
/// Counting them as a single occurrence keeps them searchable without letting
/// them outrank keywords that actually appear.
const IMPLIED_OCCURRENCES: usize = 1;

/// One search result row: a keyword hit joined back to its document.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_path: String,
    pub cite_key: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub keyword: String,
    pub page_number: i64,
    pub context: String,
    pub relevance: f64,
}

/// Aggregate statistics, computed live from the tables — never cached.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub document_count: i64,
    pub unique_keywords: i64,
    pub keyword_associations: i64,
    pub top_keywords: Vec<(String, i64)>,
}

#[derive(Serialize)]
struct GraphNode {
    id: String,
    frequency: i64,
}

#[derive(Serialize)]
struct GraphEdge {
    source: String,
    target: String,
    weight: i64,
}

#[derive(Serialize)]
struct GraphExport {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    metadata: GraphMetadata,
}

#[derive(Serialize)]
struct GraphMetadata {
    generated: String,
    node_count: usize,
    edge_count: usize,
}

/// SQLite-backed knowledge index.
pub struct KnowledgeStore {
    conn: Mutex<Connection>,
}

impl KnowledgeStore {
    /// Open (or create) the store at `path`, initialising the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PaperdexError> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, PaperdexError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PaperdexError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS documents (
                id         INTEGER PRIMARY KEY,
                file_path  TEXT NOT NULL UNIQUE,
                cite_key   TEXT,
                title      TEXT NOT NULL,
                authors    TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS keywords (
                id      INTEGER PRIMARY KEY,
                keyword TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS document_keywords (
                id          INTEGER PRIMARY KEY,
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                keyword_id  INTEGER NOT NULL REFERENCES keywords(id),
                page_number INTEGER NOT NULL,
                context     TEXT NOT NULL,
                relevance   REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_keywords_keyword
                ON keywords(keyword);
            CREATE INDEX IF NOT EXISTS idx_dk_document
                ON document_keywords(document_id);
            CREATE INDEX IF NOT EXISTS idx_dk_keyword
                ON document_keywords(keyword_id);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PaperdexError> {
        self.conn.lock().map_err(|_| PaperdexError::StoreIntegrity {
            detail: "store mutex poisoned".into(),
        })
    }

    /// Index an extraction result under `file_path`.
    ///
    /// Upserts the document row, replaces all of its keyword associations
    /// (one per keyword × containing page, with a context snippet and a
    /// term-frequency relevance score), and drops keywords no longer
    /// referenced by any document — all in one transaction.
    pub fn ingest(
        &self,
        result: &ExtractionResult,
        file_path: &str,
        snippet_chars: usize,
    ) -> Result<(), PaperdexError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let authors_json = serde_json::to_string(&result.metadata.authors)
            .map_err(|e| PaperdexError::Internal(format!("serialize authors: {e}")))?;

        tx.execute(
            "INSERT INTO documents (file_path, cite_key, title, authors, page_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(file_path) DO UPDATE SET
                 cite_key   = excluded.cite_key,
                 title      = excluded.title,
                 authors    = excluded.authors,
                 page_count = excluded.page_count,
                 indexed_at = excluded.indexed_at",
            params![
                file_path,
                result.metadata.cite_key,
                result.metadata.title,
                authors_json,
                result.pages.len() as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        let document_id: i64 = tx.query_row(
            "SELECT id FROM documents WHERE file_path = ?1",
            params![file_path],
            |row| row.get(0),
        )?;

        tx.execute(
            "DELETE FROM document_keywords WHERE document_id = ?1",
            params![document_id],
        )?;

        for page in &result.pages {
            let page_text_lower = page.cleaned_text.to_lowercase();
            let word_count = page.cleaned_text.split_whitespace().count().max(1);

            for keyword in &page.keywords {
                let normalized = normalize_keyword(keyword);
                if normalized.is_empty() {
                    continue;
                }

                tx.execute(
                    "INSERT OR IGNORE INTO keywords (keyword) VALUES (?1)",
                    params![normalized],
                )?;
                let keyword_id: i64 = tx.query_row(
                    "SELECT id FROM keywords WHERE keyword = ?1",
                    params![normalized],
                    |row| row.get(0),
                )?;

                let occurrences =
                    count_occurrences(&page_text_lower, &normalized).max(IMPLIED_OCCURRENCES);
                let relevance = occurrences as f64 / word_count as f64;
                let context = keyword_context(&normalized, &page.cleaned_text, snippet_chars);

                tx.execute(
                    "INSERT INTO document_keywords
                         (document_id, keyword_id, page_number, context, relevance)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        document_id,
                        keyword_id,
                        page.page_number as i64,
                        context,
                        relevance,
                    ],
                )?;
            }
        }

        // Re-ingestion can drop keywords; without this the unique-keyword
        // count would drift away from the persisted associations.
        tx.execute(
            "DELETE FROM keywords
             WHERE id NOT IN (SELECT DISTINCT keyword_id FROM document_keywords)",
            [],
        )?;

        tx.commit()?;
        info!(file_path, "knowledge index updated");
        Ok(())
    }

    /// Case-insensitive substring search over normalized keywords.
    ///
    /// Ranked by relevance descending, tie-broken by document recency.
    /// An unmatched query returns an empty list, not an error.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, PaperdexError> {
        let conn = self.lock()?;
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));

        let mut stmt = conn.prepare(
            "SELECT d.file_path, d.cite_key, d.title, d.authors,
                    k.keyword, dk.page_number, dk.context, dk.relevance
             FROM document_keywords dk
             JOIN keywords  k ON k.id = dk.keyword_id
             JOIN documents d ON d.id = dk.document_id
             WHERE k.keyword LIKE ?1 ESCAPE '\\'
             ORDER BY dk.relevance DESC, d.indexed_at DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            let authors_json: String = row.get(3)?;
            Ok(SearchHit {
                file_path: row.get(0)?,
                cite_key: row.get(1)?,
                title: row.get(2)?,
                authors: serde_json::from_str(&authors_json).unwrap_or_default(),
                keyword: row.get(4)?,
                page_number: row.get(5)?,
                context: row.get(6)?,
                relevance: row.get(7)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Keywords that co-occur with `term` within the same document, ranked by
    /// the number of distinct shared documents.
    pub fn related(&self, term: &str, limit: usize) -> Result<Vec<(String, i64)>, PaperdexError> {
        let conn = self.lock()?;
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));

        let mut stmt = conn.prepare(
            "SELECT k2.keyword, COUNT(DISTINCT dk1.document_id) AS shared_docs
             FROM document_keywords dk1
             JOIN keywords k1 ON k1.id = dk1.keyword_id
             JOIN document_keywords dk2
                  ON dk2.document_id = dk1.document_id
                 AND dk2.keyword_id <> dk1.keyword_id
             JOIN keywords k2 ON k2.id = dk2.keyword_id
             WHERE k1.keyword LIKE ?1 ESCAPE '\\'
             GROUP BY k2.keyword
             ORDER BY shared_docs DESC, k2.keyword ASC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Live aggregate counts plus the ten most frequent keywords.
    pub fn stats(&self) -> Result<StoreStats, PaperdexError> {
        let conn = self.lock()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let unique_keywords: i64 =
            conn.query_row("SELECT COUNT(*) FROM keywords", [], |row| row.get(0))?;
        let keyword_associations: i64 =
            conn.query_row("SELECT COUNT(*) FROM document_keywords", [], |row| {
                row.get(0)
            })?;

        let mut stmt = conn.prepare(
            "SELECT k.keyword, COUNT(*) AS frequency
             FROM document_keywords dk
             JOIN keywords k ON k.id = dk.keyword_id
             GROUP BY k.keyword
             ORDER BY frequency DESC, k.keyword ASC
             LIMIT 10",
        )?;
        let top_keywords = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            document_count,
            unique_keywords,
            keyword_associations,
            top_keywords,
        })
    }

    /// Export the co-occurrence graph as JSON for visualisation.
    ///
    /// Nodes are keywords with at least `min_frequency` associations; edges
    /// are document-level co-occurrence pairs, weighted by shared-document
    /// count. Both are computed at export time from the association table.
    pub fn export_graph(
        &self,
        output: impl AsRef<Path>,
        min_frequency: i64,
    ) -> Result<(), PaperdexError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT k.keyword, COUNT(*) AS frequency
             FROM document_keywords dk
             JOIN keywords k ON k.id = dk.keyword_id
             GROUP BY k.keyword
             HAVING frequency >= ?1
             ORDER BY frequency DESC
             LIMIT 100",
        )?;
        let nodes = stmt
            .query_map(params![min_frequency], |row| {
                Ok(GraphNode {
                    id: row.get(0)?,
                    frequency: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT k1.keyword, k2.keyword, COUNT(DISTINCT dk1.document_id) AS weight
             FROM document_keywords dk1
             JOIN document_keywords dk2
                  ON dk2.document_id = dk1.document_id
                 AND dk1.keyword_id < dk2.keyword_id
             JOIN keywords k1 ON k1.id = dk1.keyword_id
             JOIN keywords k2 ON k2.id = dk2.keyword_id
             GROUP BY k1.keyword, k2.keyword
             ORDER BY weight DESC
             LIMIT 200",
        )?;
        let edges = stmt
            .query_map([], |row| {
                Ok(GraphEdge {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    weight: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let graph = GraphExport {
            metadata: GraphMetadata {
                generated: chrono::Utc::now().to_rfc3339(),
                node_count: nodes.len(),
                edge_count: edges.len(),
            },
            nodes,
            edges,
        };

        let json = serde_json::to_string_pretty(&graph)
            .map_err(|e| PaperdexError::Internal(format!("serialize graph: {e}")))?;
        std::fs::write(output.as_ref(), json).map_err(|e| PaperdexError::OutputWriteFailed {
            path: output.as_ref().to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

/// Normalize a keyword into its stable lookup form: lower-cased, trimmed,
/// internal whitespace collapsed to single spaces.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        count += 1;
        start += pos + needle.len();
    }
    count
}

/// A short snippet of page text surrounding the keyword's first occurrence,
/// with ellipses marking truncation. Empty when the keyword does not occur
/// literally.
fn keyword_context(keyword: &str, text: &str, snippet_chars: usize) -> String {
    let lower = text.to_lowercase();
    let Some(pos) = lower.find(keyword) else {
        return String::new();
    };

    // Byte offsets found in the lowercased text are only safe to apply to the
    // original when lowercasing was length-preserving; otherwise snip from
    // the lowercased copy.
    let source: &str = if lower.len() == text.len() && text.is_char_boundary(pos) {
        text
    } else {
        &lower
    };

    let half = snippet_chars / 2;
    let start = source[..pos]
        .char_indices()
        .rev()
        .take(half)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos);
    let end = source[pos..]
        .char_indices()
        .nth(keyword.len() + half)
        .map(|(i, _)| pos + i)
        .unwrap_or(source.len());

    let mut context = source[start..end].trim().to_string();
    if start > 0 {
        context = format!("...{context}");
    }
    if end < source.len() {
        context = format!("{context}...");
    }
    context
}

/// Escape SQL LIKE wildcards in user input.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ContentType, DocumentMetadata, ExtractionResult, PageContent};

    fn page(n: usize, text: &str, keywords: &[&str]) -> PageContent {
        PageContent {
            page_number: n,
            raw_text: text.to_string(),
            cleaned_text: text.to_string(),
            content_type: ContentType::Other,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn result(title: &str, pages: Vec<PageContent>) -> ExtractionResult {
        let metadata = DocumentMetadata {
            title: title.to_string(),
            authors: vec!["A. Author".to_string()],
            ..DocumentMetadata::default()
        };
        ExtractionResult::new(metadata, pages, None)
    }

    #[test]
    fn normalization_is_case_and_whitespace_insensitive() {
        assert_eq!(normalize_keyword("  Selective   Catalytic\tReduction "), "selective catalytic reduction");
        assert_eq!(normalize_keyword("NOx"), "nox");
    }

    #[test]
    fn ingest_then_search_round_trips() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let r = result(
            "Paper A",
            vec![page(1, "catalysis of nox over copper", &["catalysis", "NOx"])],
        );
        store.ingest(&r, "a.pdf", 200).unwrap();

        let hits = store.search("catalysis", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_path, "a.pdf");
        assert_eq!(hits[0].keyword, "catalysis");
        assert_eq!(hits[0].page_number, 1);
        assert!(hits[0].context.contains("catalysis"));
    }

    #[test]
    fn reingestion_is_idempotent() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let r = result(
            "Paper A",
            vec![
                page(1, "catalysis here", &["catalysis"]),
                page(2, "ammonia there", &["ammonia"]),
            ],
        );
        store.ingest(&r, "a.pdf", 200).unwrap();
        let before = store.stats().unwrap();

        store.ingest(&r, "a.pdf", 200).unwrap();
        let after = store.stats().unwrap();

        assert_eq!(before.document_count, after.document_count);
        assert_eq!(before.unique_keywords, after.unique_keywords);
        assert_eq!(before.keyword_associations, after.keyword_associations);
    }

    #[test]
    fn reingestion_replaces_stale_keywords() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let v1 = result("Paper A", vec![page(1, "old topic", &["old topic"])]);
        store.ingest(&v1, "a.pdf", 200).unwrap();

        let v2 = result("Paper A", vec![page(1, "new topic", &["new topic"])]);
        store.ingest(&v2, "a.pdf", 200).unwrap();

        assert!(store.search("old topic", 20).unwrap().is_empty());
        assert_eq!(store.stats().unwrap().unique_keywords, 1);
    }

    #[test]
    fn search_ranks_by_relevance_descending() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        // Dense mention: 3 occurrences in 6 words.
        let dense = result(
            "Dense",
            vec![page(1, "catalysis catalysis catalysis is studied here", &["catalysis"])],
        );
        // Sparse mention: 1 occurrence in many words.
        let sparse = result(
            "Sparse",
            vec![page(
                1,
                "we briefly mention catalysis once within a much longer page of text \
                 about entirely different subjects and their many properties",
                &["catalysis"],
            )],
        );
        store.ingest(&sparse, "sparse.pdf", 200).unwrap();
        store.ingest(&dense, "dense.pdf", 200).unwrap();

        let hits = store.search("catalysis", 20).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].file_path, "dense.pdf");
        assert!(hits[0].relevance > hits[1].relevance);
    }

    #[test]
    fn unmatched_search_returns_empty() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        assert!(store.search("anything", 20).unwrap().is_empty());
    }

    #[test]
    fn stats_count_documents_and_distinct_keywords() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let docs = [
            ("a.pdf", vec!["k1", "k2", "k3", "k4"]),
            ("b.pdf", vec!["k4", "k5", "k6", "k7"]),
            ("c.pdf", vec!["k8", "k9", "k10", "k1"]),
        ];
        for (path, kws) in &docs {
            let r = result(path, vec![page(1, "body text", kws)]);
            store.ingest(&r, path, 200).unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.document_count, 3);
        assert_eq!(stats.unique_keywords, 10);
        assert_eq!(stats.keyword_associations, 12);
    }

    #[test]
    fn related_ranks_by_shared_documents() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        // "catalysis" shares two documents with "ammonia", one with "zeolite".
        let a = result("A", vec![page(1, "x", &["catalysis", "ammonia"])]);
        let b = result("B", vec![page(1, "x", &["catalysis", "ammonia", "zeolite"])]);
        store.ingest(&a, "a.pdf", 200).unwrap();
        store.ingest(&b, "b.pdf", 200).unwrap();

        let related = store.related("catalysis", 10).unwrap();
        assert_eq!(related[0], ("ammonia".to_string(), 2));
        assert_eq!(related[1], ("zeolite".to_string(), 1));
    }

    #[test]
    fn export_graph_writes_nodes_and_edges() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let a = result("A", vec![page(1, "x", &["catalysis", "ammonia"])]);
        store.ingest(&a, "a.pdf", 200).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("graph.json");
        store.export_graph(&out, 1).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["metadata"]["node_count"], 2);
        assert_eq!(json["metadata"]["edge_count"], 1);
        assert_eq!(json["edges"][0]["weight"], 1);
    }

    #[test]
    fn like_wildcards_in_queries_are_literal() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let r = result("A", vec![page(1, "x", &["100% conversion"])]);
        store.ingest(&r, "a.pdf", 200).unwrap();

        assert_eq!(store.search("100%", 20).unwrap().len(), 1);
        assert!(store.search("%_%", 20).unwrap().is_empty());
    }

    #[test]
    fn context_snippet_is_bounded_with_ellipses() {
        let long = format!("{} catalysis {}", "x".repeat(500), "y".repeat(500));
        let snippet = keyword_context("catalysis", &long, 100);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("catalysis"));
        assert!(snippet.len() < 200);
    }

    #[test]
    fn occurrence_counting_is_non_overlapping() {
        assert_eq!(count_occurrences("aaa", "aa"), 1);
        assert_eq!(count_occurrences("ab ab ab", "ab"), 3);
        assert_eq!(count_occurrences("abc", ""), 0);
    }
}
