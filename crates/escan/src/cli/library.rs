//! `escan library`: browse and manage saved documents.

use anyhow::Result;
use escan_core::ExtractedDocument;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::AppContext;
use crate::cli::error::HelpfulError;
use crate::cli::output::{format_date, format_size, preview, print_json, print_table};

#[derive(Debug)]
pub enum LibraryAction {
    /// Documents in one tab, or the most recent across all tabs.
    List {
        category: Option<String>,
        limit: Option<usize>,
    },
    Show { id: i64 },
    Rename { id: i64, name: String },
    Move { id: i64, category: String },
    Delete { id: i64 },
    Stats,
}

#[derive(Debug)]
pub struct LibraryArgs {
    pub config: Option<PathBuf>,
    pub action: LibraryAction,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct CategoryCount {
    category: String,
    documents: i64,
}

#[derive(Debug, Serialize)]
struct ActionResult {
    id: i64,
    action: &'static str,
    ok: bool,
}

pub fn run(args: LibraryArgs) -> Result<()> {
    let ctx = AppContext::open(args.config.as_deref())?;
    let library = &ctx.library;

    match args.action {
        LibraryAction::List { category, limit } => {
            let docs = match category {
                Some(category) => {
                    let category = ctx.resolve_category(&category)?;
                    let mut view = ctx.library_view();
                    view.select_category(&category, library.store())?;
                    if view.is_empty() && !args.json {
                        println!("No documents in {}.", view.selected_category());
                        return Ok(());
                    }
                    limited(view.documents().to_vec(), limit)
                }
                None => library.recent(limit.unwrap_or(usize::MAX))?,
            };
            if args.json {
                return print_json(&docs);
            }
            print_documents(&docs);
        }
        LibraryAction::Show { id } => {
            let doc = library
                .store()
                .get_by_id(id)?
                .ok_or_else(|| HelpfulError::document_not_found(id))?;
            let info = library
                .document_info(id)?
                .ok_or_else(|| HelpfulError::document_not_found(id))?;
            if args.json {
                return print_json(&serde_json::json!({
                    "document": doc,
                    "info": info,
                }));
            }
            println!("Name:      {}", info.file_name);
            println!("Category:  {}", info.category);
            println!("Created:   {}", format_date(info.created.as_ref()));
            println!("Length:    {} characters", info.text_length);
            match (&info.image_path, info.image_size_bytes) {
                (Some(path), Some(size)) => {
                    println!("Image:     {} ({})", path.display(), format_size(size))
                }
                (Some(path), None) => println!("Image:     {} (missing)", path.display()),
                (None, _) => println!("Image:     -"),
            }
            println!();
            println!("{}", doc.extracted_text.as_deref().unwrap_or(""));
        }
        LibraryAction::Rename { id, name } => {
            let ok = library.rename(id, &name)?;
            finish(id, "rename", ok, args.json)?;
        }
        LibraryAction::Move { id, category } => {
            let category = ctx.resolve_category(&category)?;
            let ok = library.change_category(id, &category)?;
            finish(id, "move", ok, args.json)?;
        }
        LibraryAction::Delete { id } => {
            let ok = library.delete_document(id)?;
            finish(id, "delete", ok, args.json)?;
        }
        LibraryAction::Stats => {
            let counts = library.category_counts()?;
            let mut rows: Vec<CategoryCount> = ctx
                .config
                .categories
                .iter()
                .map(|c| CategoryCount {
                    category: c.clone(),
                    documents: counts.get(c).copied().unwrap_or(0),
                })
                .collect();
            // Categories that are no longer configured still hold documents.
            rows.extend(
                counts
                    .iter()
                    .filter(|(c, _)| !ctx.config.categories.contains(*c))
                    .map(|(c, n)| CategoryCount {
                        category: c.clone(),
                        documents: *n,
                    }),
            );
            if args.json {
                return print_json(&rows);
            }
            print_table(
                &["CATEGORY", "DOCUMENTS"],
                rows.iter()
                    .map(|r| vec![r.category.clone(), r.documents.to_string()])
                    .collect(),
            );
        }
    }
    Ok(())
}

fn limited(mut docs: Vec<ExtractedDocument>, limit: Option<usize>) -> Vec<ExtractedDocument> {
    if let Some(limit) = limit {
        docs.truncate(limit);
    }
    docs
}

fn print_documents(docs: &[ExtractedDocument]) {
    if docs.is_empty() {
        println!("No documents yet. Extract one with: escan extract <IMAGE>");
        return;
    }
    print_table(
        &["ID", "NAME", "CATEGORY", "CREATED", "TEXT"],
        docs.iter()
            .map(|d| {
                vec![
                    d.id.to_string(),
                    d.file_name.clone(),
                    d.category.clone(),
                    format_date(d.creation_date.as_ref()),
                    preview(d.extracted_text.as_deref(), 40),
                ]
            })
            .collect(),
    );
}

fn finish(id: i64, action: &'static str, ok: bool, json: bool) -> Result<()> {
    if !ok {
        return Err(HelpfulError::document_not_found(id).into());
    }
    if json {
        return print_json(&ActionResult { id, action, ok });
    }
    println!("Document #{}: {} done", id, action);
    Ok(())
}
