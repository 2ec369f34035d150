//! Validation of generated clarification text

use lazy_static::lazy_static;
use regex::Regex;

const MIN_QUESTION_WORDS: usize = 5;

const FILLER_REPLIES: &[&str] = &["proceed", "ok", "certo", "entendi"];

lazy_static! {
    static ref EXCESS_BLANK_LINES: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref TRAILING_SPACES: Regex = Regex::new(r"[ \t]+\n").unwrap();
    static ref DANGLING_CONNECTIVE: Regex =
        Regex::new(r"(?i)\b(de|do|da|dos|das|um|uma|e|ou|com|para|sobre|no|na|nos|nas)$").unwrap();
}

/// Why a generated question was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionDefect {
    Empty,
    Filler,
    TooShort,
    NotAQuestion,
    UnbalancedBrackets,
    DanglingConnective,
}

/// Tidy model output while keeping markdown intact
pub fn normalize_assistant_text(text: &str) -> String {
    let cleaned = EXCESS_BLANK_LINES.replace_all(text.trim(), "\n\n");
    let cleaned = TRAILING_SPACES.replace_all(&cleaned, "\n");
    cleaned
        .replace(" ?", "?")
        .replace(" .", ".")
        .replace(" ,", ",")
}

/// Check a clarification or disambiguation question before showing it
pub fn check_question(text: &str) -> Result<(), QuestionDefect> {
    let t = text.trim();
    if t.is_empty() {
        return Err(QuestionDefect::Empty);
    }
    if FILLER_REPLIES.contains(&t.to_lowercase().as_str()) {
        return Err(QuestionDefect::Filler);
    }
    if t.split_whitespace().count() < MIN_QUESTION_WORDS {
        return Err(QuestionDefect::TooShort);
    }
    if !t.ends_with('?') {
        return Err(QuestionDefect::NotAQuestion);
    }
    if t.matches('(').count() != t.matches(')').count()
        || t.matches('[').count() != t.matches(']').count()
    {
        return Err(QuestionDefect::UnbalancedBrackets);
    }
    let body = t.trim_end_matches('?').trim_end();
    if DANGLING_CONNECTIVE.is_match(body) {
        return Err(QuestionDefect::DanglingConnective);
    }
    Ok(())
}

pub fn is_valid_question(text: &str) -> bool {
    check_question(text).is_ok()
}
