//! JSON output formatter

use manualroot_core::search::display_name;
use manualroot_core::{ChatResponse, ConversationInfo, SearchOutcome, Turn, Verdict};

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

pub fn format_search(outcome: &SearchOutcome, verdict: &Verdict) -> String {
    let results: Vec<serde_json::Value> = outcome
        .chunks
        .iter()
        .map(|c| {
            serde_json::json!({
                "document_id": c.document_id,
                "file": display_name(&c.filename),
                "page": c.page,
                "chunk": c.chunk_index,
                "score": c.score,
                "bonus": c.bonus,
                "final_score": c.final_score(),
                "text": c.text,
            })
        })
        .collect();

    pretty(&serde_json::json!({
        "query": outcome.query,
        "verdict": verdict,
        "stats": outcome.stats,
        "results": results,
    }))
}

pub fn format_chat(response: &ChatResponse) -> String {
    pretty(&serde_json::to_value(response).unwrap_or_default())
}

pub fn format_history(info: &ConversationInfo, turns: &[Turn]) -> String {
    pretty(&serde_json::json!({
        "conversation": info,
        "turns": turns,
    }))
}
