//! Pre-search gates: greetings, mandatory identification, short queries

use super::{Role, Turn};
use crate::entity::has_identifier_hint;
use crate::text::normalize;
use lazy_static::lazy_static;
use regex::Regex;

/// Normalized messages answered with a canned greeting
const GREETINGS: &[&str] = &[
    "oi", "ola", "opa", "salve", "hey", "hi", "hello", "e ai", "eai", "bom dia", "boa tarde",
    "boa noite", "tudo bem", "oi tudo bem", "ola tudo bem", "oi bom dia", "ola bom dia",
    "oi boa tarde", "ola boa tarde", "oi boa noite", "ola boa noite",
];

lazy_static! {
    static ref TECHNICAL_HINTS: Vec<Regex> = [
        r"\bfalha\b", r"\berro\b", r"\bc[oó]digo\b", r"\bdefeito\b", r"\bproblema\b",
        r"\bn[aã]o\s+funciona\b", r"\bn[aã]o\s+liga\b", r"\bn[aã]o\s+sobe\b",
        r"\bn[aã]o\s+desce\b", r"\bn[aã]o\s+fecha\b", r"\bn[aã]o\s+abre\b",
        r"\babre\s+e\s+fecha\b", r"\bporta\b", r"\btrinco\b", r"\bintertrav", r"\bdw\b",
        r"\bdfc\b", r"\bes\b", r"\bliga[cç][aã]o\b", r"\besquema\b", r"\bplaca\b",
        r"\bdrive\b", r"\binversor\b", r"\bcalibra[cç][aã]o\b", r"\bajuste\b", r"\bparametr",
        r"\bconfigura", r"\bmanual\b", r"\bresgate\b", r"\bfreio\b", r"\bencoder\b",
        r"\bmotor\b", r"\bnivel", r"\bvibra",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect();

    static ref GENERIC_INDICATORS: Regex =
        Regex::new(r"(?i)\b(qualquer|todos|geral|tudo|qualquer modelo|qualquer marca)\b").unwrap();
}

pub fn is_greeting(message: &str) -> bool {
    let normalized = normalize(message);
    GREETINGS.contains(&normalized.as_str())
}

pub fn is_technical(message: &str) -> bool {
    TECHNICAL_HINTS.iter().any(|re| re.is_match(message))
}

pub fn token_count(message: &str) -> usize {
    message.split_whitespace().count()
}

/// Whether the last assistant turn asked something
pub fn last_assistant_asked(history: &[Turn]) -> bool {
    history
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .is_some_and(Turn::is_question)
}

/// Technical question with no model, board or code anywhere in the conversation
pub fn requires_identification(message: &str, history: &[Turn]) -> bool {
    if message.trim().is_empty() || has_identifier_hint(message) {
        return false;
    }
    let prior_hint = history
        .iter()
        .filter(|t| t.role == Role::User)
        .any(|t| has_identifier_hint(&t.content));
    !prior_hint && is_technical(message) && token_count(message) > 2
}

/// Two tokens or fewer, or explicitly generic wording
pub fn is_short_or_generic(message: &str) -> bool {
    token_count(message) <= 2 || GENERIC_INDICATORS.is_match(message)
}
