//! Tabbed library browser state.
//!
//! One tab per category; the first is selected initially. Every tab change reloads
//! the visible documents from the store.

use crate::document::{ExtractedDocument, DEFAULT_CATEGORIES};
use crate::error::Result;
use crate::library::Library;
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct LibraryView {
    categories: Vec<String>,
    selected: usize,
    documents: Vec<ExtractedDocument>,
}

impl Default for LibraryView {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect())
    }
}

impl LibraryView {
    /// An empty list falls back to the default categories.
    pub fn new(categories: Vec<String>) -> Self {
        if categories.is_empty() {
            return Self::default();
        }
        Self {
            categories,
            selected: 0,
            documents: Vec::new(),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_category(&self) -> &str {
        &self.categories[self.selected]
    }

    pub fn documents(&self) -> &[ExtractedDocument] {
        &self.documents
    }

    /// True when the current tab has nothing to show.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn refresh(&mut self, store: &DocumentStore) -> Result<()> {
        self.documents = store.list_by_category(Some(&self.categories[self.selected]))?;
        Ok(())
    }

    /// Switch to tab `index`. Out-of-range indexes leave the view unchanged.
    pub fn select_tab(&mut self, index: usize, store: &DocumentStore) -> Result<bool> {
        if index >= self.categories.len() {
            return Ok(false);
        }
        self.selected = index;
        self.refresh(store)?;
        Ok(true)
    }

    /// Switch to the tab named `category`. Unknown names are ignored.
    pub fn select_category(&mut self, category: &str, store: &DocumentStore) -> Result<bool> {
        match self.categories.iter().position(|c| c == category) {
            Some(index) => self.select_tab(index, store),
            None => Ok(false),
        }
    }

    /// Delete a document and reload the current tab.
    pub fn delete(&mut self, library: &Library, id: i64) -> Result<bool> {
        let deleted = library.delete_document(id)?;
        if deleted {
            self.refresh(library.store())?;
        }
        Ok(deleted)
    }
}
