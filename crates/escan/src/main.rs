//! eScan command-line front end.
//!
//! Extract text from images into a categorized library. Guests get a small number
//! of free extractions; registered users are unlimited.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use escan_core::{paths, LanguageModel};
use escan_logging::LogConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "escan", version, about = "Scan images to text and keep them organized")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: $ESCAN_HOME/config.toml)
    #[arg(long, global = true, env = "ESCAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognize text in an image and save it to the library
    Extract {
        /// Image file (JPEG or PNG)
        image: PathBuf,

        /// Script of the text in the image
        #[arg(short, long, default_value = "latin")]
        language: LanguageModel,

        /// Treat the image as handwriting (registered users only)
        #[arg(long)]
        handwriting: bool,

        /// Document name (default: Text_<timestamp>)
        #[arg(short, long)]
        name: Option<String>,

        /// Library category (default: Personal)
        #[arg(short, long)]
        category: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse and manage saved documents
    Library {
        #[command(subcommand)]
        action: LibraryCommands,
    },

    /// Sign in, sign up, or continue as a guest
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },

    /// Show remaining extractions and feature access
    Usage {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration paths and settings
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum LibraryCommands {
    /// List documents, most recent first
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum number of documents
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a document's details and full text
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a document
    Rename {
        id: i64,
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a document to another category
    Move {
        id: i64,
        category: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a document and its image
    Delete {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Document counts per category
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommands {
    /// Show the current session
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Continue as a guest (limited free extractions)
    Guest {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,

        #[arg(long, env = "ESCAN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create an account and sign in
    SignUp {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "ESCAN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// End the current session
    SignOut {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Extract { json, .. }
        | Commands::Usage { json }
        | Commands::Config { json } => *json,
        Commands::Library { action } => match action {
            LibraryCommands::List { json, .. }
            | LibraryCommands::Show { json, .. }
            | LibraryCommands::Rename { json, .. }
            | LibraryCommands::Move { json, .. }
            | LibraryCommands::Delete { json, .. }
            | LibraryCommands::Stats { json } => *json,
        },
        Commands::Auth { action } => match action {
            AuthCommands::Status { json }
            | AuthCommands::Guest { json }
            | AuthCommands::SignIn { json, .. }
            | AuthCommands::SignUp { json, .. }
            | AuthCommands::SignOut { json } => *json,
        },
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let config = cli.config;
    match cli.command {
        Commands::Extract {
            image,
            language,
            handwriting,
            name,
            category,
            json,
        } => {
            cli::extract::run(cli::extract::ExtractArgs {
                config,
                image,
                language,
                handwriting,
                name,
                category,
                json,
            })
            .await
        }
        Commands::Library { action } => {
            use cli::library::{LibraryAction, LibraryArgs};
            let (action, json) = match action {
                LibraryCommands::List {
                    category,
                    limit,
                    json,
                } => (LibraryAction::List { category, limit }, json),
                LibraryCommands::Show { id, json } => (LibraryAction::Show { id }, json),
                LibraryCommands::Rename { id, name, json } => {
                    (LibraryAction::Rename { id, name }, json)
                }
                LibraryCommands::Move { id, category, json } => {
                    (LibraryAction::Move { id, category }, json)
                }
                LibraryCommands::Delete { id, json } => (LibraryAction::Delete { id }, json),
                LibraryCommands::Stats { json } => (LibraryAction::Stats, json),
            };
            cli::library::run(LibraryArgs {
                config,
                action,
                json,
            })
        }
        Commands::Auth { action } => {
            use cli::auth::{AuthAction, AuthArgs};
            let (action, json) = match action {
                AuthCommands::Status { json } => (AuthAction::Status, json),
                AuthCommands::Guest { json } => (AuthAction::Guest, json),
                AuthCommands::SignIn {
                    email,
                    password,
                    json,
                } => (AuthAction::SignIn { email, password }, json),
                AuthCommands::SignUp {
                    name,
                    email,
                    password,
                    json,
                } => (
                    AuthAction::SignUp {
                        name,
                        email,
                        password,
                    },
                    json,
                ),
                AuthCommands::SignOut { json } => (AuthAction::SignOut, json),
            };
            cli::auth::run(AuthArgs {
                config,
                action,
                json,
            })
            .await
        }
        Commands::Usage { json } => cli::usage::run(cli::usage::UsageArgs { config, json }),
        Commands::Config { json } => cli::config::run(cli::config::ConfigArgs { config, json }),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    match escan_logging::init_logging(LogConfig {
        app_name: "escan".to_string(),
        log_dir: paths::default_logs_dir(),
        verbose: cli.verbose,
    }) {
        Ok(log_path) => debug!(log = %log_path.display(), "Logging initialized"),
        Err(err) => eprintln!("Warning: failed to initialize logging: {:#}", err),
    }

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
        .and_then(|runtime| runtime.block_on(run_command(cli)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else if let Some(helpful) = err.downcast_ref::<cli::error::HelpfulError>() {
                eprint!("{}", helpful);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
