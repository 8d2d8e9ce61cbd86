//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use escan_core::{Access, AuthOutcome};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions
            .extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The image to extract text from does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                "TRY: Pass the full path to a JPEG or PNG image".to_string(),
            ])
    }

    pub fn document_not_found(id: i64) -> Self {
        Self::new(format!("Document not found: #{}", id))
            .with_context("No document with this id exists in the library")
            .with_suggestion("TRY: List documents and their ids: escan library list")
    }

    pub fn unknown_category(category: &str, categories: &[String]) -> Self {
        Self::new(format!("Unknown category: '{}'", category))
            .with_context(format!("Valid categories: {}", categories.join(", ")))
            .with_suggestion("TRY: Edit `categories` in config.toml to add a new one")
    }

    /// The usage gate refused a feature.
    pub fn access_denied(access: Access) -> Self {
        let notice = access.notice();
        let (title, message) = notice
            .map(|n| (n.title.to_string(), n.message))
            .unwrap_or_else(|| ("Access denied".to_string(), String::new()));
        let err = Self::new(title).with_context(message.replace("\n\n", " "));
        match access {
            Access::SignInRequired => err.with_suggestions([
                "TRY: Continue as a guest: escan auth guest",
                "TRY: Sign in: escan auth sign-in --email <EMAIL>",
            ]),
            _ => err.with_suggestions([
                "TRY: Sign in: escan auth sign-in --email <EMAIL>",
                "TRY: Create an account: escan auth sign-up --name <NAME> --email <EMAIL>",
            ]),
        }
    }

    pub fn auth_failed(operation: &str, outcome: &AuthOutcome) -> Self {
        Self::new(format!("{} failed", operation))
            .with_context(
                outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| "Authentication failed".to_string()),
            )
            .with_suggestion("TRY: Check the email and password and try again")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a JSON object on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": {
                "message": helpful.message,
                "context": helpful.context,
                "suggestions": helpful.suggestions,
            }
        }),
        None => serde_json::json!({
            "error": {
                "message": format!("{:#}", err),
                "context": null,
                "suggestions": [],
            }
        }),
    };
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:?}", err),
    }
}
