//! `escan extract`: recognize text in an image and save it to the library.

use anyhow::Result;
use escan_core::usage::anonymous_limit_notice;
use escan_core::{
    DocumentKind, ExtractionFlow, ExtractionOutcome, ExtractionRequest, ImageSource,
    LanguageModel, RemainingUses,
};
use std::path::PathBuf;
use tracing::info;

use crate::cli::context::AppContext;
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_date, print_json};

#[derive(Debug)]
pub struct ExtractArgs {
    pub config: Option<PathBuf>,
    pub image: PathBuf,
    pub language: LanguageModel,
    pub handwriting: bool,
    pub name: Option<String>,
    pub category: Option<String>,
    pub json: bool,
}

pub async fn run(args: ExtractArgs) -> Result<()> {
    if !args.image.is_file() {
        return Err(HelpfulError::file_not_found(&args.image).into());
    }
    let ctx = AppContext::open(args.config.as_deref())?;
    let category = args
        .category
        .as_deref()
        .map(|c| ctx.resolve_category(c))
        .transpose()?;

    if !args.json && ctx.gate.is_anonymous_user() {
        if let RemainingUses::Limited(n) = ctx.gate.remaining_extract_uses() {
            if n > 0 {
                eprintln!("{}\n", anonymous_limit_notice(n).message);
            }
        }
    }

    let recognizer = ctx.recognizer();
    let flow = ExtractionFlow::new(&ctx.gate, &recognizer, &ctx.library);
    let request = ExtractionRequest {
        image: ImageSource::Path(args.image.clone()),
        language: args.language,
        kind: if args.handwriting {
            DocumentKind::Handwriting
        } else {
            DocumentKind::Text
        },
        file_name: args.name,
        category,
    };
    info!(image = %args.image.display(), language = %args.language, "Starting extraction");

    match flow.run(request).await? {
        ExtractionOutcome::Blocked { access, .. } => {
            Err(HelpfulError::access_denied(access).into())
        }
        outcome @ ExtractionOutcome::Saved { .. } if args.json => print_json(&outcome),
        ExtractionOutcome::Saved {
            document,
            remaining,
        } => {
            println!(
                "Saved #{} \"{}\" in {} ({})",
                document.id,
                document.file_name,
                document.category,
                format_date(document.creation_date.as_ref())
            );
            println!();
            match document.extracted_text.as_deref() {
                Some(text) if !text.trim().is_empty() => println!("{}", text),
                _ => println!("(no text recognized)"),
            }
            if let RemainingUses::Limited(n) = remaining {
                println!();
                println!("Guest extract uses remaining: {}", n);
            }
            Ok(())
        }
    }
}
