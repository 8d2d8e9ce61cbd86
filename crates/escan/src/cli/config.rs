//! `escan config`: show resolved paths and settings.

use anyhow::Result;
use escan_core::paths;
use std::path::{Path, PathBuf};

use crate::cli::context::load_config;

#[derive(Debug)]
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let (config, config_path) = load_config(args.config.as_deref())?;
    let home = paths::escan_home();

    if args.json {
        let value = serde_json::json!({
            "home": home.to_string_lossy(),
            "config": path_entry(&config_path),
            "database": path_entry(&config.database_path),
            "preferences": path_entry(&config.preferences_dir),
            "scans": path_entry(&config.scans_dir),
            "accounts": path_entry(&config.accounts_path),
            "logs": path_entry(&paths::default_logs_dir()),
            "categories": config.categories,
            "recognition": {
                "program": config.recognition.program,
                "args": config.recognition.args,
                "timeout_secs": config.recognition.timeout_secs,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("ESCAN CONFIGURATION");
        println!("===================");
        println!();
        println!("Home:        {}", home.display());
        print_path("Config", &config_path);
        print_path("Database", &config.database_path);
        print_path("Preferences", &config.preferences_dir);
        print_path("Scans", &config.scans_dir);
        print_path("Accounts", &config.accounts_path);
        print_path("Logs", &paths::default_logs_dir());
        println!();
        println!("Categories:  {}", config.categories.join(", "));
        println!(
            "Recognizer:  {} {}",
            config.recognition.program,
            config.recognition.args.join(" ")
        );
        println!("Timeout:     {}s", config.recognition.timeout_secs);
    }
    Ok(())
}

fn path_entry(path: &Path) -> serde_json::Value {
    serde_json::json!({
        "path": path.to_string_lossy(),
        "exists": path.exists(),
    })
}

fn print_path(label: &str, path: &Path) {
    println!(
        "{:<12} {} ({})",
        format!("{}:", label),
        path.display(),
        if path.exists() { "exists" } else { "not found" }
    );
}
