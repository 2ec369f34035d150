//! History command

use crate::app::{HistoryArgs, OutputFormat};
use crate::output;
use anyhow::Result;
use manualroot_core::{Database, ManualRootError};

pub async fn run(args: HistoryArgs, db: &Database, format: OutputFormat) -> Result<()> {
    let info = db
        .get_conversation(&args.conversation_id)?
        .ok_or_else(|| ManualRootError::ConversationNotFound(args.conversation_id.clone()))?;
    let turns = db.get_turns(&info.id)?;

    print!("{}", output::format_history(&info, &turns, format));
    Ok(())
}
