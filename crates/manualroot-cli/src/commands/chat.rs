//! Chat command

use crate::app::{ChatArgs, OutputFormat};
use crate::output;
use anyhow::Result;
use manualroot_core::{ChatService, Config, Database, FilenameCache};
use std::sync::Arc;

pub async fn run(args: ChatArgs, db: Database, config: &Config, format: OutputFormat) -> Result<()> {
    let message = args.message.join(" ");
    let chat = ChatService::from_config(Arc::new(db), Arc::new(FilenameCache::default()), config)?;

    let response = chat
        .handle_turn(
            &args.brand,
            args.conversation.as_deref(),
            &args.participant,
            &message,
        )
        .await?;

    print!("{}", output::format_chat(&response, format));
    Ok(())
}
