//! Index command

use crate::app::{IndexArgs, OutputFormat};
use crate::progress::ProgressReporter;
use anyhow::{Context, Result};
use manualroot_core::index::IndexProgress;
use manualroot_core::{Config, Database, FilenameCache, HttpEmbedder, Indexer, LLMClient, VLLMClient};
use std::sync::Arc;

/// Page separator in extracted text files
const PAGE_BREAK: char = '\u{c}';

pub async fn run(args: IndexArgs, db: Database, config: &Config, format: OutputFormat) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();

    let filename = match args.filename {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.txt")
            .to_string(),
    };

    let llm: Arc<dyn LLMClient> = Arc::new(VLLMClient::new(config.llm_service.clone())?);
    let embedder = Arc::new(HttpEmbedder::new(
        llm,
        config.llm_service.embedding_model.clone(),
    ));
    let indexer = Indexer::new(Arc::new(db), embedder, Arc::new(FilenameCache::default()));

    let reporter = ProgressReporter::new(filename.clone());
    let on_page = |progress: IndexProgress| reporter.update(&progress);
    let report = indexer
        .index_document(&args.brand, &filename, &pages, Some(&on_page))
        .await?;
    reporter.finish();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Cli => {
            println!("Indexed '{}' into {}:", filename, args.brand);
            println!("  Document:  #{}", report.document_id);
            println!("  Pages:     {}", report.pages);
            println!("  Unchanged: {}", report.unchanged_pages);
            println!("  Empty:     {}", report.empty_pages);
            println!("  Chunks:    {}", report.chunks);
        }
    }
    Ok(())
}
