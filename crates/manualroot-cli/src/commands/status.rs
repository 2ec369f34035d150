//! Status command

use crate::app::OutputFormat;
use anyhow::Result;
use manualroot_core::Database;

pub async fn run(db: &Database, format: OutputFormat) -> Result<()> {
    let stats = db.stats()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Cli => {
            println!("Brands:          {}", stats.brands);
            println!("Documents:       {}", stats.documents);
            println!("  Ready:         {}", stats.documents_ready);
            println!("Pages:           {}", stats.pages);
            println!("Chunks:          {}", stats.chunks);
            println!();
            println!("Conversations:   {}", stats.conversations);
            println!("Turns:           {}", stats.turns);
        }
    }
    Ok(())
}
