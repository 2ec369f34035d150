//! Search command

use crate::app::{OutputFormat, SearchArgs};
use crate::output;
use anyhow::Result;
use manualroot_core::search::SearchBackend;
use manualroot_core::{
    analyze, Config, Database, FilenameCache, HttpEmbedder, HybridSearch, LLMClient, VLLMClient,
};
use std::sync::Arc;

pub async fn run(args: SearchArgs, db: Database, config: &Config, format: OutputFormat) -> Result<()> {
    db.require_brand(&args.brand)?;
    let query = args.query.join(" ");

    let llm: Arc<dyn LLMClient> = Arc::new(VLLMClient::new(config.llm_service.clone())?);
    let embedder = Arc::new(HttpEmbedder::new(
        llm,
        config.llm_service.embedding_model.clone(),
    ));
    let backend: Arc<dyn SearchBackend> = Arc::new(db);
    let search = HybridSearch::new(
        backend,
        embedder,
        Arc::new(FilenameCache::default()),
        config.retrieval.clone(),
    );

    let limit = args.limit.unwrap_or(config.retrieval.limit);
    let outcome = search.search(&args.brand, &query, limit).await?;
    let verdict = analyze(&outcome.chunks, &outcome.query, &config.confidence);

    print!("{}", output::format_search(&outcome, &verdict, format));
    Ok(())
}
