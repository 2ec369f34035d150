//! Output formatters

pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use manualroot_core::{ChatResponse, ConversationInfo, SearchOutcome, Turn, Verdict};

pub fn format_search(outcome: &SearchOutcome, verdict: &Verdict, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::format_search(outcome, verdict),
        OutputFormat::Cli => terminal::format_search(outcome, verdict),
    }
}

pub fn format_chat(response: &ChatResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::format_chat(response),
        OutputFormat::Cli => terminal::format_chat(response),
    }
}

pub fn format_history(info: &ConversationInfo, turns: &[Turn], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::format_history(info, turns),
        OutputFormat::Cli => terminal::format_history(info, turns),
    }
}
