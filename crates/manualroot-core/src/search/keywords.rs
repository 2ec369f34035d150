//! Literal keyword extraction and lexical bonuses

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Short fault mnemonics that count as codes without digits
pub const FAULT_CODE_HINTS: &[&str] = &[
    "UV", "OV", "OC", "OH", "OL", "FU", "MC", "DC", "PUV", "CUV", "EF", "GF",
];

const MAX_KEYWORDS: usize = 8;

lazy_static! {
    // "XO 508", "URM-311", "ADV 210"
    static ref SPACED_CODE: Regex =
        Regex::new(r"\b([A-Za-z]{1,5})[\s-](\d{2,4}[A-Za-z]?)\b").unwrap();
    // "OVF10", "gen2", "LCB2", "E2"
    static ref GLUED_CODE: Regex =
        Regex::new(r"\b[A-Za-z]{1,6}\d{1,4}[A-Za-z]{0,3}\b").unwrap();
    // "C.07.10", "3.2.1"
    static ref DOTTED_CODE: Regex =
        Regex::new(r"\b[A-Za-z]?\.?\d{1,3}(?:\.\d{1,3}){1,3}\b").unwrap();
    static ref LONG_NUMBER: Regex = Regex::new(r"\b\d{3,}\b").unwrap();
    // "Mag Completo", "Manual Geral Otis"
    static ref PROPER_SEQUENCE: Regex =
        Regex::new(r"\b\p{Lu}\p{Ll}+(?:\s+\p{Lu}\p{Ll}+){1,2}\b").unwrap();
    static ref ACRONYM: Regex = Regex::new(r"\b[A-Z]{3,}\b").unwrap();
    static ref QUERY_FAULT_TOKEN: Regex = Regex::new(r"\b[a-zA-Z]{1,5}\d{0,3}\b").unwrap();
}

/// Literal keywords worth looking up in raw page text.
///
/// Returns at most eight entries, deduplicated case-insensitively, in
/// discovery order: codes first, then numbers, dotted codes, proper-noun
/// sequences and acronyms.
pub fn extract_search_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |kw: String| {
        let kw = kw.trim().to_string();
        if kw.len() >= 2 && seen.insert(kw.to_lowercase()) {
            keywords.push(kw);
        }
    };

    for caps in SPACED_CODE.captures_iter(query) {
        push(caps[0].to_uppercase());
        push(format!("{}{}", &caps[1], &caps[2]).to_uppercase());
    }
    for m in GLUED_CODE.find_iter(query) {
        push(m.as_str().to_uppercase());
    }
    for m in LONG_NUMBER.find_iter(query) {
        push(m.as_str().to_string());
    }
    for m in DOTTED_CODE.find_iter(query) {
        push(m.as_str().to_uppercase());
    }
    for m in PROPER_SEQUENCE.find_iter(query) {
        push(m.as_str().to_string());
    }
    for m in ACRONYM.find_iter(query) {
        push(m.as_str().to_string());
    }

    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Uppercased query tokens that look like fault codes
pub fn fault_tokens(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut seen = HashSet::new();
    QUERY_FAULT_TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_uppercase())
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()) || FAULT_CODE_HINTS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Bonus for fault tokens literally present in chunk text:
/// +0.08 per whole-word hit, +0.04 per substring hit, capped.
pub fn lexical_bonus(text: &str, tokens: &[String], cap: f64) -> f64 {
    if text.is_empty() || tokens.is_empty() {
        return 0.0;
    }
    let upper = text.to_uppercase();
    let mut bonus: f64 = 0.0;
    for token in tokens {
        if contains_word(&upper, token) {
            bonus += 0.08;
        } else if upper.contains(token.as_str()) {
            bonus += 0.04;
        }
    }
    bonus.min(cap)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}
