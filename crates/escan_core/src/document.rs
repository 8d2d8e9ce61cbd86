//! Extracted document model.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted `creation_date` format. Second precision, local time, no zone.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_CATEGORY: &str = "Personal";

/// Library tabs in display order.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Personal", "Work", "School", "Others"];

/// A saved text extraction.
///
/// `id` is 0 until the document has been saved. `creation_date` is `None` until
/// saved; the store fills in the current time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub id: i64,
    pub file_name: String,
    pub category: String,
    pub extracted_text: Option<String>,
    pub image_path: Option<PathBuf>,
    pub creation_date: Option<NaiveDateTime>,
}

impl ExtractedDocument {
    pub fn new(file_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: 0,
            file_name: file_name.into(),
            category: category.into(),
            extracted_text: None,
            image_path: None,
            creation_date: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.extracted_text = Some(text.into());
        self
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn created_at(mut self, date: NaiveDateTime) -> Self {
        self.creation_date = Some(truncate_to_seconds(date));
        self
    }

    pub fn is_saved(&self) -> bool {
        self.id > 0
    }

    /// Number of characters of extracted text.
    pub fn text_len(&self) -> usize {
        self.extracted_text
            .as_deref()
            .map(|t| t.chars().count())
            .unwrap_or(0)
    }
}

pub fn format_creation_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_creation_date(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Current local time at second precision.
pub fn now() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

pub(crate) fn truncate_to_seconds(date: NaiveDateTime) -> NaiveDateTime {
    date.with_nanosecond(0).unwrap_or(date)
}
