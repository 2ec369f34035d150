//! History-aware query enrichment

use crate::dialogue::{Role, Turn};
use crate::llm::{ChatMessage, CompletionOptions, LLMClient};
use crate::text::strip_word_punctuation;
use serde::Serialize;
use std::collections::HashSet;

/// Where the enriched query came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    /// Too little history; the query was used as typed
    Unchanged,
    /// Deduplicated concatenation of the user's turns
    Heuristic,
    /// Single-line rewrite from the reasoning service
    Rewrite,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedQuery {
    pub text: String,
    pub source: EnrichmentSource,
    /// Identifier tokens that had to be appended to keep them in the query
    pub patched: Vec<String>,
}

const HISTORY_WINDOW: usize = 8;

/// Tokens of the current message that must survive enrichment:
/// anything with a digit or at least four characters, punctuation stripped.
pub fn identifier_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .map(|w| strip_word_punctuation(w).to_lowercase())
        .filter(|w| !w.is_empty())
        .filter(|w| w.chars().any(|c| c.is_ascii_digit()) || w.chars().count() >= 4)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Whether `candidate` contains `token`, ignoring case and enricher punctuation
pub fn contains_identifier(candidate: &str, token: &str) -> bool {
    strip_word_punctuation(candidate)
        .to_lowercase()
        .contains(token)
}

/// Append any identifier token of `query` that `candidate` lost
pub fn preserve_identifiers(candidate: String, query: &str) -> (String, Vec<String>) {
    let missing: Vec<String> = identifier_tokens(query)
        .into_iter()
        .filter(|t| !contains_identifier(&candidate, t))
        .collect();
    if missing.is_empty() {
        (candidate, missing)
    } else {
        let patched = format!("{} {}", candidate.trim_end(), missing.join(" "));
        (patched, missing)
    }
}

/// All prior user turns plus the query, words deduplicated case-insensitively
pub fn heuristic_query(query: &str, history: &[Turn]) -> String {
    let user_text: Vec<&str> = history
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .chain(std::iter::once(query))
        .collect();

    let mut seen = HashSet::new();
    user_text
        .join(" ")
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && seen.insert(w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accept a rewrite only if it is a single non-trivial line
pub fn valid_rewrite(text: &str) -> bool {
    let len = text.chars().count();
    !text.is_empty() && len > 5 && len < 300 && !text.contains('\n')
}

fn rewrite_prompt(query: &str, brand_name: &str, history: &[Turn]) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let history_text: Vec<String> = history[start..]
        .iter()
        .map(|t| {
            let who = match t.role {
                Role::User => "Técnico",
                Role::Assistant => "Assistente",
            };
            format!("{}: {}", who, t.content)
        })
        .collect();

    format!(
        "Analise o histórico desta conversa técnica sobre elevadores {brand}\n\
         e construa uma consulta de busca otimizada.\n\n\
         Histórico:\n{history}\n\n\
         Pergunta/resposta atual: {query}\n\n\
         REGRAS:\n\
         1. Combine TODAS as informações relevantes numa frase de busca.\n\
         2. Se o técnico respondeu com um modelo/placa, combine com a pergunta ORIGINAL que ele fez antes.\n\
         3. Inclua: modelo, placa, código de erro, sintoma, procedimento.\n\
         4. Se o técnico só disse \"sim\" ou \"ok\", use a pergunta original sem mudança.\n\n\
         Retorne APENAS a consulta de busca (uma linha), sem explicação.",
        brand = brand_name,
        history = history_text.join("\n"),
        query = query,
    )
}

/// Build the retrieval query for this turn.
///
/// With fewer than two prior turns the query is used as typed. Otherwise a
/// reasoning-service rewrite is preferred when valid, falling back to the
/// heuristic concatenation. Identifier tokens of `query` always survive.
pub async fn enrich_query(
    llm: &dyn LLMClient,
    query: &str,
    brand_name: &str,
    history: &[Turn],
) -> EnrichedQuery {
    if history.len() < 2 {
        return EnrichedQuery {
            text: query.to_string(),
            source: EnrichmentSource::Unchanged,
            patched: Vec::new(),
        };
    }

    let heuristic = heuristic_query(query, history);
    let messages = vec![ChatMessage::user(rewrite_prompt(query, brand_name, history))];

    let (candidate, source) = match llm.chat_completion(messages, CompletionOptions::REWRITE).await {
        Ok(text) => {
            let text = text.trim().trim_matches('"').trim().to_string();
            if valid_rewrite(&text) {
                (text, EnrichmentSource::Rewrite)
            } else {
                tracing::info!("Rejected query rewrite {:?}, using heuristic", text);
                (heuristic, EnrichmentSource::Heuristic)
            }
        }
        Err(e) => {
            tracing::warn!("Query enrichment failed, using heuristic: {}", e);
            (heuristic, EnrichmentSource::Heuristic)
        }
    };

    let (text, patched) = preserve_identifiers(candidate, query);
    if patched.is_empty() {
        tracing::info!("Enriched query: {:?} -> {:?}", query, text);
    } else {
        tracing::info!(
            "Enriched query (patched missing {:?}): {:?} -> {:?}",
            patched,
            query,
            text
        );
    }

    EnrichedQuery {
        text,
        source,
        patched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_tokens() {
        assert_eq!(
            identifier_tokens("Como calibrar o OVF-10 (erro E2)?"),
            vec!["como", "calibrar", "ovf10", "erro", "e2"]
        );
    }

    #[test]
    fn test_heuristic_dedupes_case_insensitively() {
        let history = vec![
            Turn::user("porta não fecha"),
            Turn::assistant("Qual o modelo do elevador que você atende?"),
        ];
        assert_eq!(
            heuristic_query("PORTA gen2", &history),
            "porta não fecha gen2"
        );
    }

    #[test]
    fn test_preserve_identifiers_appends_missing() {
        let (text, missing) =
            preserve_identifiers("calibração do drive".to_string(), "calibrar OVF10");
        assert_eq!(missing, vec!["calibrar", "ovf10"]);
        assert!(text.ends_with("calibrar ovf10"));
    }

    #[test]
    fn test_punctuated_identifier_counts_as_present() {
        assert!(contains_identifier("falha no OVF-10", "ovf10"));
        let (text, missing) = preserve_identifiers("OVF-10".to_string(), "OVF-10");
        assert!(missing.is_empty());
        assert_eq!(text, "OVF-10");
    }

    #[test]
    fn test_valid_rewrite() {
        assert!(valid_rewrite("calibração drive OVF10"));
        assert!(!valid_rewrite("ok"));
        assert!(!valid_rewrite("linha um\nlinha dois"));
        assert!(!valid_rewrite(&"x".repeat(300)));
    }
}
