//! Image-to-document extraction.
//!
//! One run: gate check, name resolution, quota consumption, recognition, image copy,
//! catalog insert. Quota is consumed before recognition starts, so a failed
//! recognition still counts as a use. Nothing that can be decided up front is left
//! to fail after the use has been recorded.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::document::{self, ExtractedDocument, DEFAULT_CATEGORY};
use crate::error::Result;
use crate::images::ImageStore;
use crate::library::Library;
use crate::recognition::{ImageSource, LanguageModel, Recognizer};
use crate::usage::{Access, Feature, Notice, RemainingUses, UsageGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[default]
    Text,
    Handwriting,
}

impl DocumentKind {
    pub fn feature(&self) -> Feature {
        match self {
            DocumentKind::Text => Feature::ExtractText,
            DocumentKind::Handwriting => Feature::ExtractHandwriting,
        }
    }

    fn name_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Text => "Text",
            DocumentKind::Handwriting => "Handwriting",
        }
    }
}

/// `Text_20240309_140530` style name for a new document.
pub fn default_file_name(kind: DocumentKind, at: NaiveDateTime) -> String {
    format!("{}_{}", kind.name_prefix(), at.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: ImageSource,
    pub language: LanguageModel,
    pub kind: DocumentKind,
    /// Defaults to [`default_file_name`].
    pub file_name: Option<String>,
    /// Defaults to [`DEFAULT_CATEGORY`].
    pub category: Option<String>,
}

impl ExtractionRequest {
    pub fn new(image: ImageSource) -> Self {
        Self {
            image,
            language: LanguageModel::default(),
            kind: DocumentKind::default(),
            file_name: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Saved {
        document: ExtractedDocument,
        remaining: RemainingUses,
    },
    /// The gate refused the request; nothing was consumed or stored.
    Blocked { access: Access, notice: Notice },
}

pub struct ExtractionFlow<'a> {
    gate: &'a UsageGate,
    recognizer: &'a dyn Recognizer,
    library: &'a Library,
}

impl<'a> ExtractionFlow<'a> {
    pub fn new(gate: &'a UsageGate, recognizer: &'a dyn Recognizer, library: &'a Library) -> Self {
        Self {
            gate,
            recognizer,
            library,
        }
    }

    pub async fn run(&self, request: ExtractionRequest) -> Result<ExtractionOutcome> {
        let feature = request.kind.feature();
        let access = self.gate.check_access(feature);
        if let Some(notice) = access.notice() {
            info!(%feature, ?access, "Extraction blocked");
            return Ok(ExtractionOutcome::Blocked { access, notice });
        }

        let created = document::now();
        let file_name = request
            .file_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_file_name(request.kind, created));
        // A name like "..." is a valid document name but not a usable file name.
        let image_name = if ImageStore::is_usable_name(&file_name) {
            file_name.clone()
        } else {
            default_file_name(request.kind, created)
        };
        let category = request
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let remaining = self.gate.consume(feature)?;

        let text = self
            .recognizer
            .recognize(&request.image, request.language)
            .await?;

        let images = self.library.images();
        let image_path = match &request.image {
            ImageSource::Path(source) => images.import(&image_name, source)?,
            ImageSource::Bytes(bytes) => images.save_bytes(&image_name, bytes)?,
        };

        let mut doc = ExtractedDocument::new(file_name, category)
            .with_text(text)
            .with_image(&image_path)
            .created_at(created);
        doc.id = match self.library.store().save(&doc) {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = images.remove(&image_path) {
                    warn!(path = %image_path.display(), error = %cleanup, "Failed to remove orphaned image");
                }
                return Err(e);
            }
        };

        info!(id = doc.id, category = %doc.category, chars = doc.text_len(), "Saved extraction");
        Ok(ExtractionOutcome::Saved {
            document: doc,
            remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_names_follow_kind_and_time() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 30)
            .unwrap();
        assert_eq!(default_file_name(DocumentKind::Text, at), "Text_20240309_140530");
        assert_eq!(
            default_file_name(DocumentKind::Handwriting, at),
            "Handwriting_20240309_140530"
        );
    }

    #[test]
    fn kinds_map_to_features() {
        assert_eq!(DocumentKind::Text.feature(), Feature::ExtractText);
        assert_eq!(DocumentKind::Handwriting.feature(), Feature::ExtractHandwriting);
    }
}
