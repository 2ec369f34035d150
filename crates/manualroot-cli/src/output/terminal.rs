//! Terminal output formatter

use manualroot_core::search::display_name;
use manualroot_core::{ChatResponse, ConversationInfo, Role, SearchOutcome, Turn, Verdict};

const PREVIEW_LINES: usize = 3;

fn timestamp(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| rfc3339.to_string())
}

pub fn format_search(outcome: &SearchOutcome, verdict: &Verdict) -> String {
    let mut output = format!(
        "Verdict: {} (confident: {}, top {:.3}, spread {:.3}, {} documents)\n",
        verdict.reason,
        if verdict.confident { "yes" } else { "no" },
        verdict.top_score,
        verdict.score_spread,
        verdict.unique_docs.len()
    );
    let stats = &outcome.stats;
    output.push_str(&format!(
        "Phases: dense {}, filename +{}, keyword +{}, multi-query +{}\n",
        stats.dense, stats.filename_injected, stats.keyword_injected, stats.multi_query_injected
    ));
    if !stats.skipped.is_empty() {
        output.push_str(&format!("Skipped: {}\n", stats.skipped.join(", ")));
    }
    if outcome.chunks.is_empty() {
        output.push_str("No results\n");
        return output;
    }

    output.push('\n');
    for chunk in &outcome.chunks {
        let score_pct = (chunk.final_score() * 100.0).round() as i64;
        output.push_str(&format!(
            "{:>3}% {} p.{} #{}\n",
            score_pct,
            display_name(&chunk.filename),
            chunk.page,
            chunk.document_id
        ));
        let lines: Vec<&str> = chunk.text.lines().take(PREVIEW_LINES).collect();
        for line in &lines {
            output.push_str(&format!("  {}\n", line));
        }
        if chunk.text.lines().count() > PREVIEW_LINES {
            output.push_str("  ...\n");
        }
    }
    output
}

pub fn format_chat(response: &ChatResponse) -> String {
    let mut output = format!("{}\n", response.answer.trim_end());
    if !response.sources.is_empty() {
        output.push_str("\nSources:\n");
        for source in &response.sources {
            output.push_str(&format!(
                "  - {}, página {} ({:.3})\n",
                source.filename, source.page, source.score
            ));
        }
    }
    output.push_str(&format!(
        "\n[{}] conversation {}\n",
        response.state, response.conversation_id
    ));
    output
}

pub fn format_history(info: &ConversationInfo, turns: &[Turn]) -> String {
    let mut output = format!(
        "Conversation {} ({}, {})\nStarted {}, last active {}\n",
        info.id,
        info.brand,
        info.participant,
        timestamp(&info.created_at),
        timestamp(&info.last_active_at)
    );
    for turn in turns {
        let who = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        output.push_str(&format!("\n[{}] {}\n", who, turn.content.trim_end()));
        for source in &turn.sources {
            output.push_str(&format!("    {} p.{}\n", source.filename, source.page));
        }
    }
    output
}
