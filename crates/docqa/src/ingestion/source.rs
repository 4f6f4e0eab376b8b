//! Document sources feeding the index build

use async_trait::async_trait;
use parking_lot::RwLock;
use rusqlite::Connection;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::types::Document;

/// Supplies the raw documents of the corpus
///
/// Implementations:
/// - `SqliteDocumentSource`: rows from a relational table
/// - `DirectoryDocumentSource`: files under a directory
/// - `InMemorySource`: a fixed list, replaceable at runtime
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load every document; an error aborts the index build
    async fn load_documents(&self) -> Result<Vec<Document>>;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Build the source described by the configuration
pub fn source_from_config(config: &SourceConfig) -> Box<dyn DocumentSource> {
    match config {
        SourceConfig::Sqlite { path, query } => {
            Box::new(SqliteDocumentSource::new(path.clone(), query.clone()))
        }
        SourceConfig::Directory { path, recursive } => {
            Box::new(DirectoryDocumentSource::new(path.clone(), *recursive))
        }
    }
}

/// Reads `(id, file_name, raw_text)` rows from SQLite
pub struct SqliteDocumentSource {
    path: PathBuf,
    query: String,
}

impl SqliteDocumentSource {
    /// Create a new SQLite source
    pub fn new(path: PathBuf, query: String) -> Self {
        Self { path, query }
    }

    fn load_blocking(path: &PathBuf, query: &str) -> Result<Vec<Document>> {
        if !path.exists() {
            return Err(Error::Source(format!("database '{}' does not exist", path.display())));
        }

        let conn = Connection::open(path)?;
        let mut stmt = conn.prepare(query)?;
        let rows = stmt.query_map([], |row| {
            Ok(Document {
                id: row.get(0)?,
                file_name: row.get(1)?,
                raw_text: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for SqliteDocumentSource {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        let path = self.path.clone();
        let query = self.query.clone();

        let documents = tokio::task::spawn_blocking(move || Self::load_blocking(&path, &query))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        tracing::info!("Loaded {} documents from {}", documents.len(), self.path.display());
        Ok(documents)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Reads UTF-8 files under a directory
///
/// Ids are assigned in sorted walk order starting at 1. Files that cannot be
/// read as UTF-8 are skipped with a warning.
pub struct DirectoryDocumentSource {
    root: PathBuf,
    recursive: bool,
}

impl DirectoryDocumentSource {
    /// Create a new directory source
    pub fn new(root: PathBuf, recursive: bool) -> Self {
        Self { root, recursive }
    }

    fn load_blocking(root: &PathBuf, recursive: bool) -> Result<Vec<Document>> {
        if !root.is_dir() {
            return Err(Error::Source(format!("'{}' is not a directory", root.display())));
        }

        let walker = WalkDir::new(root)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();

        let mut documents = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| Error::Source(format!("walk failed: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let file_name = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            match std::fs::read_to_string(path) {
                Ok(raw_text) => {
                    let id = documents.len() as i64 + 1;
                    documents.push(Document { id, file_name, raw_text });
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable file '{}': {}", path.display(), e);
                }
            }
        }

        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for DirectoryDocumentSource {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        let root = self.root.clone();
        let recursive = self.recursive;

        let documents = tokio::task::spawn_blocking(move || Self::load_blocking(&root, recursive))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        tracing::info!("Loaded {} files from {}", documents.len(), self.root.display());
        Ok(documents)
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// Fixed in-memory document list
#[derive(Default)]
pub struct InMemorySource {
    documents: RwLock<Vec<Document>>,
}

impl InMemorySource {
    /// Create a source holding `documents`
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Replace the documents returned by later loads
    pub fn replace(&self, documents: Vec<Document>) {
        *self.documents.write() = documents;
    }
}

#[async_trait]
impl DocumentSource for InMemorySource {
    async fn load_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.read().clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_source_reads_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("docs.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE documents (id INTEGER PRIMARY KEY, file_name TEXT NOT NULL, raw_text TEXT);
                 INSERT INTO documents VALUES (2, 'b.txt', 'bravo');
                 INSERT INTO documents VALUES (1, 'a.txt', 'alpha');
                 INSERT INTO documents VALUES (3, 'c.txt', NULL);",
            )
            .unwrap();
        }

        let source = SqliteDocumentSource::new(
            db_path,
            "SELECT id, file_name, raw_text FROM documents ORDER BY id".to_string(),
        );
        let docs = source.load_documents().await.unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0], Document::new(1, "a.txt", "alpha"));
        assert_eq!(docs[2].raw_text, "");
    }

    #[tokio::test]
    async fn test_sqlite_missing_database_is_error() {
        let source = SqliteDocumentSource::new(PathBuf::from("/nonexistent/docs.db"), "SELECT 1".to_string());
        assert!(matches!(source.load_documents().await, Err(Error::Source(_))));
    }

    #[tokio::test]
    async fn test_directory_source_walks_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# B").unwrap();
        std::fs::write(dir.path().join("a.txt"), "A").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "C").unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0xffu8, 0xfe, 0x00]).unwrap();

        let docs = DirectoryDocumentSource::new(dir.path().to_path_buf(), true)
            .load_documents()
            .await
            .unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md", "nested/c.txt"]);
        assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let flat = DirectoryDocumentSource::new(dir.path().to_path_buf(), false)
            .load_documents()
            .await
            .unwrap();
        assert_eq!(flat.len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_source_replace() {
        let source = InMemorySource::new(vec![Document::new(1, "a.txt", "a")]);
        assert_eq!(source.load_documents().await.unwrap().len(), 1);
        source.replace(Vec::new());
        assert!(source.load_documents().await.unwrap().is_empty());
    }
}
