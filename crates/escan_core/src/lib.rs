//! eScan core: usage gating, the document library, and text extraction.
//!
//! - [`UsageGate`] meters anonymous use of text extraction and refuses other
//!   features until the user has a permanent account.
//! - [`DocumentStore`] persists extracted documents in SQLite via `escan_db`.
//! - [`ExtractionFlow`] ties the two together with a [`Recognizer`].

mod atomic;
pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod images;
pub mod library;
pub mod library_view;
pub mod paths;
pub mod prefs;
pub mod recognition;
pub mod store;
pub mod usage;

pub use auth::{AuthBackend, AuthError, AuthOutcome, Credential, Identity, LocalAuthBackend};
pub use config::{EscanConfig, RecognitionConfig};
pub use document::{ExtractedDocument, DEFAULT_CATEGORIES, DEFAULT_CATEGORY};
pub use error::{CoreError, Result};
pub use extract::{DocumentKind, ExtractionFlow, ExtractionOutcome, ExtractionRequest};
pub use images::ImageStore;
pub use library::{DocumentInfo, Library};
pub use library_view::LibraryView;
pub use prefs::{JsonPreferences, MemoryPreferences, PreferenceStore};
pub use recognition::{CommandRecognizer, ImageSource, LanguageModel, RecognitionError, Recognizer};
pub use store::DocumentStore;
pub use usage::{Access, Feature, Notice, RemainingUses, UsageGate};
