//! Contextual page chunking for embedding
//!
//! Manual pages mix prose with fault tables whose rows wrap over several
//! lines. Chunks follow logical table rows and fault-code lines first so a
//! code is never split from its description.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Chunks kept per page
pub const MAX_PAGE_CHUNKS: usize = 8;

/// Pages at or under both limits become a single chunk
pub const SMALL_PAGE_LINES: usize = 8;
pub const SMALL_PAGE_CHARS: usize = 1600;

const MAX_TABLE_ROW_CHUNKS: usize = 4;
const MIN_TABLE_ROW_CHARS: usize = 40;
const MIN_FAULT_WINDOW_CHARS: usize = 60;
const MIN_SLIDING_WINDOW_CHARS: usize = 120;

/// Lines above which the wider sliding window is used
const LONG_PAGE_LINES: usize = 35;

/// Fault codes that count even without the generic pattern
const FAULT_CODE_HINTS: &[&str] = &[
    "UV", "OV", "OC", "OH", "OL", "FU", "MC", "DC", "PUV", "CUV", "EF", "GF",
];

lazy_static! {
    static ref FAULT_CODE: Regex = Regex::new(r"\b[A-Z]{1,4}\d{0,3}\b").unwrap();
    static ref TABLE_SEPARATOR: Regex =
        Regex::new(r"^\|?\s*[:\-]{2,}(\s*\|\s*[:\-]{2,})+\|?$").unwrap();
}

fn contains_fault_code(line: &str) -> bool {
    let upper = line.to_uppercase();
    FAULT_CODE_HINTS.iter().any(|hint| upper.contains(hint)) || FAULT_CODE.is_match(&upper)
}

fn dedupe_key(chunk: &str) -> String {
    chunk.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Logical rows of a markdown table, continuation lines folded into their row
pub fn table_row_chunks(text: &str, max_chunks: usize) -> Vec<String> {
    let table_lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.contains('|'))
        .collect();
    if table_lines.len() < 3 {
        return Vec::new();
    }

    let mut rows: Vec<String> = Vec::new();
    let mut current_code = String::new();
    let mut block: Vec<String> = Vec::new();

    for line in table_lines {
        if TABLE_SEPARATOR.is_match(line) {
            continue;
        }
        let cells: Vec<&str> = line.trim_matches('|').split('|').map(str::trim).collect();
        let first_cell = cells.first().copied().unwrap_or("");

        if let Some(code) = FAULT_CODE.find(&first_cell.to_uppercase()) {
            if !block.is_empty() {
                rows.push(block.join("\n"));
            }
            current_code = code.as_str().to_string();
            block = vec![line.to_string()];
            continue;
        }

        if block.is_empty() {
            continue;
        }
        if !current_code.is_empty() && first_cell.is_empty() {
            block.push(format!(
                "| {} [continuação] | {}",
                current_code,
                cells[1..].join(" | ")
            ));
        } else {
            block.push(line.to_string());
        }
    }
    if !block.is_empty() {
        rows.push(block.join("\n"));
    }

    let mut seen = HashSet::new();
    rows.into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| r.chars().count() >= MIN_TABLE_ROW_CHARS && seen.insert(dedupe_key(r)))
        .take(max_chunks)
        .collect()
}

/// Split one page of extracted text into contextual chunks.
///
/// Small pages stay whole. Larger pages yield table rows, then windows
/// around fault-code lines, then overlapping line windows, deduplicated
/// and capped at [`MAX_PAGE_CHUNKS`]. Blank pages yield nothing.
pub fn build_contextual_chunks(text: &str) -> Vec<String> {
    let normalized = text.trim();
    if normalized.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = normalized
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() <= SMALL_PAGE_LINES && normalized.chars().count() <= SMALL_PAGE_CHARS {
        return vec![normalized.to_string()];
    }

    let mut candidates = table_row_chunks(normalized, MAX_TABLE_ROW_CHUNKS);

    for (idx, line) in lines.iter().enumerate() {
        if !contains_fault_code(line) {
            continue;
        }
        let start = idx.saturating_sub(1);
        let end = (idx + 5).min(lines.len());
        let window = lines[start..end].join("\n");
        if window.chars().count() >= MIN_FAULT_WINDOW_CHARS {
            candidates.push(window);
        }
    }

    let window_size = if lines.len() > LONG_PAGE_LINES { 12 } else { 9 };
    let step = (window_size - 3).max(4);
    let mut start = 0;
    while start < lines.len() {
        let end = (start + window_size).min(lines.len());
        let window = lines[start..end].join("\n");
        if window.chars().count() >= MIN_SLIDING_WINDOW_CHARS {
            candidates.push(window);
        }
        if end >= lines.len() {
            break;
        }
        start += step;
    }

    let mut seen = HashSet::new();
    let chunks: Vec<String> = candidates
        .into_iter()
        .filter(|c| seen.insert(dedupe_key(c)))
        .take(MAX_PAGE_CHUNKS)
        .collect();

    if chunks.is_empty() {
        vec![normalized.to_string()]
    } else {
        chunks
    }
}
