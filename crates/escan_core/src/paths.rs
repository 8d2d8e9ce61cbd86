//! Default on-disk locations.
//!
//! Everything lives under the eScan home directory:
//! 1) `ESCAN_HOME` when set
//! 2) `~/.escan`
//! 3) `./.escan` when no home directory can be determined

use std::path::PathBuf;

pub const HOME_ENV: &str = "ESCAN_HOME";

pub fn escan_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        if !override_path.trim().is_empty() {
            return PathBuf::from(override_path);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".escan"))
        .unwrap_or_else(|| PathBuf::from(".").join(".escan"))
}

/// `~/.escan/config.toml`
pub fn default_config_path() -> PathBuf {
    escan_home().join("config.toml")
}

/// `~/.escan/escan_documents.db`
pub fn default_database_path() -> PathBuf {
    escan_home().join(crate::store::DATABASE_NAME)
}

/// `~/.escan/prefs`
pub fn default_preferences_dir() -> PathBuf {
    escan_home().join("prefs")
}

/// `~/.escan/scans`
pub fn default_scans_dir() -> PathBuf {
    escan_home().join("scans")
}

/// `~/.escan/accounts.json`
pub fn default_accounts_path() -> PathBuf {
    escan_home().join("accounts.json")
}

/// `~/.escan/logs`
pub fn default_logs_dir() -> PathBuf {
    escan_home().join("logs")
}
