//! Wiring shared by commands: config, usage gate and library.

use anyhow::{Context, Result};
use escan_core::usage::USAGE_PREFS_NAME;
use escan_core::{
    paths, CommandRecognizer, DocumentStore, EscanConfig, ImageStore, JsonPreferences, Library,
    LibraryView, LocalAuthBackend, UsageGate,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::error::HelpfulError;

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(paths::default_config_path)
}

pub fn load_config(explicit: Option<&Path>) -> Result<(EscanConfig, PathBuf)> {
    let path = config_path(explicit);
    let config = EscanConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok((config, path))
}

pub struct AppContext {
    pub config: EscanConfig,
    pub gate: UsageGate,
    pub library: Library,
}

impl AppContext {
    pub fn open(explicit_config: Option<&Path>) -> Result<Self> {
        let (config, _) = load_config(explicit_config)?;

        let auth = LocalAuthBackend::open(&config.accounts_path)
            .with_context(|| format!("Failed to open {}", config.accounts_path.display()))?;
        let prefs = JsonPreferences::open(&config.preferences_dir, USAGE_PREFS_NAME)
            .context("Failed to open usage preferences")?;
        let gate = UsageGate::new(Arc::new(auth), Arc::new(prefs));

        let store = DocumentStore::open(&config.database_path).with_context(|| {
            format!(
                "Failed to open document database {}",
                config.database_path.display()
            )
        })?;
        let library = Library::new(store, ImageStore::new(config.scans_dir.clone()));

        Ok(Self {
            config,
            gate,
            library,
        })
    }

    pub fn recognizer(&self) -> CommandRecognizer {
        CommandRecognizer::from_config(&self.config.recognition)
    }

    pub fn library_view(&self) -> LibraryView {
        LibraryView::new(self.config.categories.clone())
    }

    /// Resolve a user-supplied category against the configured tabs,
    /// ignoring case.
    pub fn resolve_category(&self, category: &str) -> Result<String> {
        self.config
            .categories
            .iter()
            .find(|c| c.eq_ignore_ascii_case(category.trim()))
            .cloned()
            .ok_or_else(|| HelpfulError::unknown_category(category, &self.config.categories).into())
    }
}
