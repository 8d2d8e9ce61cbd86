//! `escan auth`: sessions and accounts.

use anyhow::Result;
use escan_core::{AuthOutcome, Credential, Identity};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::AppContext;
use crate::cli::error::HelpfulError;
use crate::cli::output::print_json;

#[derive(Debug)]
pub enum AuthAction {
    Status,
    Guest,
    SignIn { email: String, password: String },
    SignUp { name: String, email: String, password: String },
    SignOut,
}

#[derive(Debug)]
pub struct AuthArgs {
    pub config: Option<PathBuf>,
    pub action: AuthAction,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SessionStatus {
    signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<Identity>,
}

pub async fn run(args: AuthArgs) -> Result<()> {
    let ctx = AppContext::open(args.config.as_deref())?;
    let gate = &ctx.gate;

    let (operation, outcome) = match args.action {
        AuthAction::Status => {
            let identity = gate.current_identity();
            let status = SessionStatus {
                signed_in: identity.is_some(),
                identity,
            };
            if args.json {
                return print_json(&status);
            }
            match &status.identity {
                Some(id) if id.is_anonymous => println!("Signed in as a guest ({})", id.uid),
                Some(id) => println!(
                    "Signed in as {}{}",
                    id.label(),
                    id.email
                        .as_deref()
                        .map(|e| format!(" <{}>", e))
                        .unwrap_or_default()
                ),
                None => println!("Not signed in"),
            }
            return Ok(());
        }
        AuthAction::Guest => ("Guest sign-in", gate.sign_in_anonymously().await),
        AuthAction::SignIn { email, password } => (
            "Sign-in",
            gate.sign_in_with_credential(&Credential::email_password(email, password))
                .await,
        ),
        AuthAction::SignUp {
            name,
            email,
            password,
        } => ("Sign-up", gate.sign_up(&email, &password, &name).await),
        AuthAction::SignOut => ("Sign-out", gate.sign_out().await),
    };

    report(operation, &outcome, args.json)
}

fn report(operation: &str, outcome: &AuthOutcome, json: bool) -> Result<()> {
    if !outcome.success {
        return Err(HelpfulError::auth_failed(operation, outcome).into());
    }
    if json {
        return print_json(outcome);
    }
    match &outcome.identity {
        Some(id) if id.is_anonymous => {
            println!("Continuing as a guest.");
            println!("Guests can extract text a limited number of times; run `escan usage` to check.");
        }
        Some(id) => println!("Welcome, {}.", id.label()),
        None => println!("Signed out."),
    }
    Ok(())
}
