//! Brand management commands

use crate::app::{BrandAction, BrandArgs, OutputFormat};
use anyhow::Result;
use manualroot_core::Database;

pub async fn run(args: BrandArgs, db: &Database, format: OutputFormat) -> Result<()> {
    match args.action {
        BrandAction::Add { slug, name } => {
            let name = name.unwrap_or_else(|| slug.clone());
            db.add_brand(&slug, &name)?;
            println!("Added brand '{}' ({})", slug.trim().to_lowercase(), name);
        }
        BrandAction::List => {
            let brands = db.list_brands()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&brands)?),
                OutputFormat::Cli if brands.is_empty() => println!("No brands"),
                OutputFormat::Cli => {
                    for brand in brands {
                        println!("{}: {} ({} documents)", brand.slug, brand.name, brand.document_count);
                    }
                }
            }
        }
        BrandAction::Documents { slug } => {
            db.require_brand(&slug)?;
            let documents = db.list_brand_documents(&slug)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&documents)?),
                OutputFormat::Cli if documents.is_empty() => println!("No documents"),
                OutputFormat::Cli => {
                    for doc in documents {
                        println!(
                            "#{} {} ({} pages, {})",
                            doc.id,
                            doc.filename,
                            doc.total_pages,
                            doc.status.as_str()
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
