//! Configuration for eScan.
//!
//! Loaded from `$ESCAN_HOME/config.toml`. Every field has a default so a missing
//! file (or a partial one) is always usable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::DEFAULT_CATEGORIES;
use crate::error::{CoreError, Result};
use crate::paths;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscanConfig {
    /// Document database file.
    #[serde(default = "paths::default_database_path")]
    pub database_path: PathBuf,

    /// Directory holding named preference files (usage counters).
    #[serde(default = "paths::default_preferences_dir")]
    pub preferences_dir: PathBuf,

    /// Directory where source images of saved documents are copied.
    #[serde(default = "paths::default_scans_dir")]
    pub scans_dir: PathBuf,

    /// Local account database used by the bundled auth backend.
    #[serde(default = "paths::default_accounts_path")]
    pub accounts_path: PathBuf,

    /// Library tabs, in display order. The first entry is the initial tab.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    #[serde(default)]
    pub recognition: RecognitionConfig,
}

/// External OCR command.
///
/// `{image}` and `{lang}` in `args` are replaced with the image path and the
/// engine language code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

fn default_program() -> String {
    "tesseract".to_string()
}

fn default_args() -> Vec<String> {
    ["{image}", "stdout", "-l", "{lang}"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EscanConfig {
    fn default() -> Self {
        Self {
            database_path: paths::default_database_path(),
            preferences_dir: paths::default_preferences_dir(),
            scans_dir: paths::default_scans_dir(),
            accounts_path: paths::default_accounts_path(),
            categories: default_categories(),
            recognition: RecognitionConfig::default(),
        }
    }
}

impl EscanConfig {
    /// Defaults rooted at an explicit home directory instead of `ESCAN_HOME`.
    pub fn for_home(home: &Path) -> Self {
        Self {
            database_path: home.join(crate::store::DATABASE_NAME),
            preferences_dir: home.join("prefs"),
            scans_dir: home.join("scans"),
            accounts_path: home.join("accounts.json"),
            categories: default_categories(),
            recognition: RecognitionConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration as TOML, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(CoreError::config("categories must list at least one entry"));
        }
        if let Some(blank) = self.categories.iter().position(|c| c.trim().is_empty()) {
            return Err(CoreError::config(format!(
                "categories[{}] must not be blank",
                blank
            )));
        }
        if self.recognition.program.trim().is_empty() {
            return Err(CoreError::config("recognition.program must not be empty"));
        }
        if self.recognition.timeout_secs == 0 {
            return Err(CoreError::config("recognition.timeout_secs must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EscanConfig::for_home(Path::new("/tmp/escan"));
        assert_eq!(config.categories, vec!["Personal", "Work", "School", "Others"]);
        assert_eq!(
            config.database_path,
            PathBuf::from("/tmp/escan/escan_documents.db")
        );
        assert_eq!(config.recognition.program, "tesseract");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
categories = ["Receipts", "Notes"]

[recognition]
program = "ocr"
"#;
        let config: EscanConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.categories, vec!["Receipts", "Notes"]);
        assert_eq!(config.recognition.program, "ocr");
        assert_eq!(config.recognition.args, default_args());
        assert_eq!(config.recognition.timeout_secs, 60);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let mut config = EscanConfig::for_home(tmp.path());
        config.recognition.timeout_secs = 5;

        config.save(&path).unwrap();
        let loaded = EscanConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_empty_categories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "categories = []\n").unwrap();

        let err = EscanConfig::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = EscanConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.categories.len(), 4);
    }
}
