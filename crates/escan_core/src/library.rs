//! Library operations that span the catalog and the image store.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::document::ExtractedDocument;
use crate::error::{CoreError, Result};
use crate::images::ImageStore;
use crate::store::DocumentStore;

/// Summary shown by the document info view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub id: i64,
    pub file_name: String,
    pub category: String,
    pub created: Option<NaiveDateTime>,
    pub text_length: usize,
    pub image_path: Option<PathBuf>,
    /// `None` when there is no image or the file is missing.
    pub image_size_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Library {
    store: DocumentStore,
    images: ImageStore,
}

impl Library {
    pub fn new(store: DocumentStore, images: ImageStore) -> Self {
        Self { store, images }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Delete a document and then its image.
    ///
    /// The image is only touched after the row is gone. A failure to remove the
    /// image is logged; the document is still reported as deleted.
    pub fn delete_document(&self, id: i64) -> Result<bool> {
        let Some(doc) = self.store.get_by_id(id)? else {
            return Ok(false);
        };
        if !self.store.delete(id)? {
            return Ok(false);
        }
        if let Some(path) = doc.image_path.as_deref() {
            match self.images.remove(path) {
                Ok(true) => {}
                Ok(false) => warn!(id, path = %path.display(), "Image already missing"),
                Err(e) => warn!(id, path = %path.display(), error = %e, "Failed to remove image"),
            }
        }
        info!(id, "Deleted document");
        Ok(true)
    }

    pub fn rename(&self, id: i64, new_name: &str) -> Result<bool> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CoreError::invalid_input("file name must not be empty"));
        }
        self.modify(id, |doc| doc.file_name = new_name.to_string())
    }

    pub fn change_category(&self, id: i64, category: &str) -> Result<bool> {
        let category = category.trim();
        if category.is_empty() {
            return Err(CoreError::invalid_input("category must not be empty"));
        }
        self.modify(id, |doc| doc.category = category.to_string())
    }

    /// Most recent documents across all categories.
    pub fn recent(&self, limit: usize) -> Result<Vec<ExtractedDocument>> {
        let mut docs = self.store.list_all()?;
        docs.truncate(limit);
        Ok(docs)
    }

    pub fn category_counts(&self) -> Result<BTreeMap<String, i64>> {
        self.store.count_by_category()
    }

    pub fn document_info(&self, id: i64) -> Result<Option<DocumentInfo>> {
        Ok(self.store.get_by_id(id)?.map(|doc| DocumentInfo {
            id: doc.id,
            text_length: doc.text_len(),
            image_size_bytes: doc.image_path.as_deref().and_then(ImageStore::size_of),
            file_name: doc.file_name,
            category: doc.category,
            created: doc.creation_date,
            image_path: doc.image_path,
        }))
    }

    fn modify(&self, id: i64, f: impl FnOnce(&mut ExtractedDocument)) -> Result<bool> {
        let Some(mut doc) = self.store.get_by_id(id)? else {
            return Ok(false);
        };
        f(&mut doc);
        Ok(self.store.update(&doc)? == 1)
    }
}
