//! Document catalog persisted in the `documents` table.
//!
//! Storage failures surface as [`CoreError::Storage`]; "not found" is never an
//! error (`None`, `false`, or 0 rows).
//!
//! Reads are tolerant: a row whose `creation_date` does not parse gets the current
//! time substituted and a warning is logged, so one bad row never hides the rest.

use escan_db::{DbRow, DbValue, Migration, SqliteEngine, StorageEngine};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::document::{self, ExtractedDocument};
use crate::error::Result;

pub const DATABASE_NAME: &str = "escan_documents.db";

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create documents table",
    sql: r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    category TEXT NOT NULL,
    extracted_text TEXT,
    image_path TEXT,
    creation_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);
"#,
}];

const SELECT_DOCUMENT: &str =
    "SELECT id, file_name, category, extracted_text, image_path, creation_date FROM documents";

/// Catalog of extracted documents.
#[derive(Clone)]
pub struct DocumentStore {
    engine: Arc<dyn StorageEngine>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.engine.backend_name())
            .finish()
    }
}

impl DocumentStore {
    /// Wrap an engine and bring its schema up to date.
    pub fn new(engine: Arc<dyn StorageEngine>) -> Result<Self> {
        let version = engine.migrate(MIGRATIONS)?;
        debug!(backend = engine.backend_name(), version, "Document store ready");
        Ok(Self { engine })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::new(Arc::new(SqliteEngine::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Arc::new(SqliteEngine::open_in_memory()?))
    }

    /// Insert a new document and return its id. `doc.id` is ignored.
    ///
    /// An unset `creation_date` is stored as the current time.
    pub fn save(&self, doc: &ExtractedDocument) -> Result<i64> {
        let created = doc.creation_date.unwrap_or_else(document::now);
        let id = self.engine.insert(
            "INSERT INTO documents (file_name, category, extracted_text, image_path, creation_date) \
             VALUES (?, ?, ?, ?, ?)",
            &[
                DbValue::from(doc.file_name.as_str()),
                DbValue::from(doc.category.as_str()),
                DbValue::from(doc.extracted_text.as_deref()),
                DbValue::from(path_to_text(doc.image_path.as_deref())),
                DbValue::from(document::format_creation_date(&created)),
            ],
        )?;
        debug!(id, category = %doc.category, "Saved document");
        Ok(id)
    }

    /// Update every mutable field by id. `creation_date` is never rewritten.
    ///
    /// Returns the number of rows changed (0 when the id does not exist).
    pub fn update(&self, doc: &ExtractedDocument) -> Result<u64> {
        let rows = self.engine.execute(
            "UPDATE documents SET file_name = ?, category = ?, extracted_text = ?, image_path = ? \
             WHERE id = ?",
            &[
                DbValue::from(doc.file_name.as_str()),
                DbValue::from(doc.category.as_str()),
                DbValue::from(doc.extracted_text.as_deref()),
                DbValue::from(path_to_text(doc.image_path.as_deref())),
                DbValue::from(doc.id),
            ],
        )?;
        Ok(rows)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<ExtractedDocument>> {
        let row = self
            .engine
            .query_optional(&format!("{} WHERE id = ?", SELECT_DOCUMENT), &[DbValue::from(id)])?;
        row.map(|r| row_to_document(&r)).transpose()
    }

    /// Documents in `category`, most recent first. `None` or an empty category
    /// lists everything. Documents created in the same second keep insertion order.
    pub fn list_by_category(&self, category: Option<&str>) -> Result<Vec<ExtractedDocument>> {
        let rows = match category.filter(|c| !c.is_empty()) {
            Some(category) => self.engine.query_all(
                &format!("{} WHERE category = ? ORDER BY id ASC", SELECT_DOCUMENT),
                &[DbValue::from(category)],
            )?,
            None => self
                .engine
                .query_all(&format!("{} ORDER BY id ASC", SELECT_DOCUMENT), &[])?,
        };

        let mut docs = rows
            .iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>>>()?;
        // Stable sort: equal timestamps stay in id order.
        docs.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        Ok(docs)
    }

    pub fn list_all(&self) -> Result<Vec<ExtractedDocument>> {
        self.list_by_category(None)
    }

    /// Remove a document row. Returns whether a row was deleted.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let rows = self
            .engine
            .execute("DELETE FROM documents WHERE id = ?", &[DbValue::from(id)])?;
        Ok(rows > 0)
    }

    /// Number of documents per category, including categories outside the
    /// configured tab list.
    pub fn count_by_category(&self) -> Result<BTreeMap<String, i64>> {
        let rows = self.engine.query_all(
            "SELECT category, COUNT(*) AS n FROM documents GROUP BY category",
            &[],
        )?;
        let mut counts = BTreeMap::new();
        for row in rows {
            counts.insert(row.get_by_name::<String>("category")?, row.get_by_name::<i64>("n")?);
        }
        Ok(counts)
    }
}

fn path_to_text(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

fn row_to_document(row: &DbRow) -> Result<ExtractedDocument> {
    let id: i64 = row.get_by_name("id")?;
    let raw_date: String = row.get_by_name("creation_date")?;
    let creation_date = match document::parse_creation_date(&raw_date) {
        Some(date) => date,
        None => {
            warn!(id, raw = %raw_date, "Malformed creation_date; substituting current time");
            document::now()
        }
    };

    Ok(ExtractedDocument {
        id,
        file_name: row.get_by_name("file_name")?,
        category: row.get_by_name("category")?,
        extracted_text: row.get_by_name("extracted_text")?,
        image_path: row
            .get_by_name::<Option<String>>("image_path")?
            .map(PathBuf::from),
        creation_date: Some(creation_date),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn unset_creation_date_is_filled_on_save() {
        let store = DocumentStore::open_in_memory().unwrap();
        let id = store
            .save(&ExtractedDocument::new("Scan", "Work").with_text("hello"))
            .unwrap();
        assert!(id > 0);

        let doc = store.get_by_id(id).unwrap().unwrap();
        assert!(doc.creation_date.is_some());
        assert_eq!(doc.extracted_text.as_deref(), Some("hello"));
        assert_eq!(doc.image_path, None);
    }

    #[test]
    fn missing_id_is_not_an_error() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert!(store.get_by_id(42).unwrap().is_none());
        assert!(!store.delete(42).unwrap());
        let mut ghost = ExtractedDocument::new("Ghost", "Work");
        ghost.id = 42;
        assert_eq!(store.update(&ghost).unwrap(), 0);
    }

    #[test]
    fn count_by_category_groups_rows() {
        let store = DocumentStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for (name, category) in [("a", "Work"), ("b", "Work"), ("c", "Receipts")] {
            store
                .save(&ExtractedDocument::new(name, category).created_at(date))
                .unwrap();
        }
        let counts = store.count_by_category().unwrap();
        assert_eq!(counts.get("Work"), Some(&2));
        assert_eq!(counts.get("Receipts"), Some(&1));
        assert_eq!(counts.get("Personal"), None);
    }
}
