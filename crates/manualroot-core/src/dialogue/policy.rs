//! Per-turn dialogue policy
//!
//! Decides whether a turn greets, asks for identification, asks a
//! progressive or disambiguation question, or answers from the manuals.
//! Every reasoning-service call degrades to a canned fallback, so a turn
//! always produces a response.

use super::gates::{is_greeting, is_short_or_generic, last_assistant_asked, requires_identification};
use super::prompts;
use super::rounds::count_clarification_rounds;
use super::validate::{check_question, normalize_assistant_text};
use super::{Role, Source, Turn};
use crate::confidence::{analyze, Verdict};
use crate::config::{ConfidenceConfig, DialogueConfig};
use crate::domain::DomainProfile;
use crate::entity::{extract_known_context, KnownContext};
use crate::llm::{ChatMessage, CompletionOptions, LLMClient, Reranker};
use crate::query::{enrich_query, expand_query};
use crate::search::{
    apply_rerank, display_name, extract_search_keywords, CandidateChunk, HybridSearch,
};
use crate::text::token_jaccard;
use serde::Serialize;
use std::sync::Arc;

/// Documents listed in clarification prompts
const PROMPT_DOC_LIMIT: usize = 10;

/// Documents listed in disambiguation prompts
const DISAMBIGUATION_DOC_LIMIT: usize = 8;

/// Fallback keywords searched individually
const FALLBACK_KEYWORDS: usize = 3;

/// Below this token overlap the enriched query is considered diverged
const DIVERGENCE_THRESHOLD: f64 = 0.5;

const RELATED_DOC_LIMIT: usize = 5;

/// History turns shown to answer composition
const ANSWER_HISTORY_TURNS: usize = 6;

/// Which branch produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    Greeting,
    MandatoryGate,
    ShortQueryGate,
    ProgressiveQuestion,
    Disambiguation,
    Answer,
}

impl PolicyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::MandatoryGate => "mandatory_gate",
            Self::ShortQueryGate => "short_query_gate",
            Self::ProgressiveQuestion => "progressive_question",
            Self::Disambiguation => "disambiguation",
            Self::Answer => "answer",
        }
    }
}

impl std::fmt::Display for PolicyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one turn
#[derive(Debug, Clone, Serialize)]
pub struct PolicyResponse {
    pub text: String,
    pub sources: Vec<Source>,
    pub needs_clarification: bool,
    pub state: PolicyState,
    /// Verdict of the final retrieval, when one ran
    pub verdict: Option<Verdict>,
}

impl PolicyResponse {
    fn question(text: String, state: PolicyState, verdict: Option<Verdict>) -> Self {
        Self {
            text,
            sources: Vec::new(),
            needs_clarification: true,
            state,
            verdict,
        }
    }
}

/// Ranked chunks with the verdict computed for them
#[derive(Debug, Clone)]
struct Retrieval {
    query: String,
    chunks: Vec<CandidateChunk>,
    verdict: Verdict,
}

impl Retrieval {
    /// Confident beats not confident, then higher top score wins
    fn improves_on(&self, other: &Retrieval) -> bool {
        match (self.verdict.confident, other.verdict.confident) {
            (true, false) => true,
            (false, true) => false,
            _ => self.verdict.top_score > other.verdict.top_score,
        }
    }
}

pub struct DialoguePolicy {
    llm: Arc<dyn LLMClient>,
    search: HybridSearch,
    reranker: Option<Arc<dyn Reranker>>,
    dialogue: DialogueConfig,
    confidence: ConfidenceConfig,
}

impl DialoguePolicy {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        search: HybridSearch,
        dialogue: DialogueConfig,
        confidence: ConfidenceConfig,
    ) -> Self {
        Self {
            llm,
            search,
            reranker: None,
            dialogue,
            confidence,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Respond to `message` given the prior turns of its conversation.
    ///
    /// `brand` is the collection slug, `brand_name` its display name.
    pub async fn respond(
        &self,
        brand: &str,
        brand_name: &str,
        message: &str,
        history: &[Turn],
    ) -> PolicyResponse {
        let message = message.trim();

        if is_greeting(message) {
            tracing::info!("Policy: greeting");
            return PolicyResponse {
                text: prompts::greeting(brand_name),
                sources: Vec::new(),
                needs_clarification: false,
                state: PolicyState::Greeting,
                verdict: None,
            };
        }

        let max_rounds = self.dialogue.max_rounds;
        let rounds = count_clarification_rounds(history, max_rounds);
        let budget_left = rounds < max_rounds;

        if rounds == 0 && requires_identification(message, history) {
            tracing::info!("Policy: mandatory identification gate");
            return PolicyResponse::question(
                prompts::default_clarification(brand_name),
                PolicyState::MandatoryGate,
                None,
            );
        }

        if budget_left && !last_assistant_asked(history) && is_short_or_generic(message) {
            tracing::info!("Policy: short query gate");
            let text = self
                .generate_question(
                    prompts::short_query(brand_name, message),
                    prompts::default_clarification(brand_name),
                )
                .await;
            return PolicyResponse::question(text, PolicyState::ShortQueryGate, None);
        }

        let known = extract_known_context(message, history);
        let profile = DomainProfile::for_brand(brand);
        let retrieval = self
            .retrieve(brand, brand_name, message, history, &known, profile)
            .await;
        let verdict = &retrieval.verdict;

        if budget_left {
            if !verdict.confident {
                if known.model.is_none() && verdict.unique_docs.len() >= 2 {
                    return self
                        .disambiguate_or_clarify(brand_name, message, profile, &retrieval)
                        .await;
                }
                return self
                    .progressive_question(brand_name, message, &known, rounds, &retrieval)
                    .await;
            }

            if self.is_near_tie(verdict) {
                if let Some(response) = self
                    .disambiguate(brand_name, message, profile, &retrieval)
                    .await
                {
                    tracing::info!("Policy: near-tie disambiguation");
                    return response;
                }
            }
        } else if !verdict.confident {
            tracing::info!(
                "Policy: round budget exhausted ({}/{}), answering anyway",
                rounds,
                max_rounds
            );
        }

        self.answer(brand_name, message, history, &known, profile, retrieval)
            .await
    }

    /// Enrich, expand, search and fall back until confident or out of options
    async fn retrieve(
        &self,
        brand: &str,
        brand_name: &str,
        message: &str,
        history: &[Turn],
        known: &KnownContext,
        profile: &DomainProfile,
    ) -> Retrieval {
        let enriched = enrich_query(self.llm.as_ref(), message, brand_name, history).await;
        let expanded = expand_query(profile, &enriched.text);
        tracing::info!(
            "Search query ({:?}): '{}' (expanded with {:?}, patched {:?})",
            enriched.source,
            expanded.text,
            expanded.added,
            enriched.patched
        );

        let limit = self.search.config().limit;
        let mut retrieval = self.search_and_analyze(brand, &expanded.text, limit).await;
        if retrieval.verdict.confident {
            return retrieval;
        }

        let keywords = fallback_keywords(message, known);
        if !keywords.is_empty() {
            let chunks = self
                .search
                .search_keywords(
                    brand,
                    &retrieval.query,
                    &keywords,
                    retrieval.chunks.clone(),
                    limit,
                )
                .await;
            let verdict = analyze(&chunks, &retrieval.query, &self.confidence);
            retrieval = Retrieval {
                query: retrieval.query,
                chunks,
                verdict,
            };
        }

        if !retrieval.verdict.confident
            && token_jaccard(&expanded.text, message) < DIVERGENCE_THRESHOLD
        {
            tracing::info!("Enriched query diverged, retrying with the original message");
            let original = self.search_and_analyze(brand, message, limit).await;
            if original.improves_on(&retrieval) {
                retrieval = original;
            }
        }

        retrieval
    }

    async fn search_and_analyze(&self, brand: &str, query: &str, limit: usize) -> Retrieval {
        let chunks = match self.search.search(brand, query, limit).await {
            Ok(outcome) => outcome.chunks,
            Err(e) => {
                tracing::warn!("Search failed for '{}': {}", query, e);
                Vec::new()
            }
        };
        let verdict = analyze(&chunks, query, &self.confidence);
        Retrieval {
            query: query.to_string(),
            chunks,
            verdict,
        }
    }

    fn is_near_tie(&self, verdict: &Verdict) -> bool {
        verdict.unique_docs.len() >= self.dialogue.near_tie_min_docs
            && verdict.score_spread < self.dialogue.near_tie_spread
    }

    async fn progressive_question(
        &self,
        brand_name: &str,
        message: &str,
        known: &KnownContext,
        rounds: usize,
        retrieval: &Retrieval,
    ) -> PolicyResponse {
        let verdict = retrieval.verdict.clone();
        let missing = known.missing_info();
        let found_docs = prompts::found_docs_list(&best_per_document(&retrieval.chunks, PROMPT_DOC_LIMIT));

        let text = match missing.first() {
            Some(first) => {
                tracing::info!(
                    "Policy: progressive question for {:?} (round {}/{})",
                    first,
                    rounds + 1,
                    self.dialogue.max_rounds
                );
                let prompt = prompts::progressive_question(
                    brand_name,
                    known,
                    &missing,
                    rounds + 1,
                    self.dialogue.max_rounds,
                    &found_docs,
                );
                self.generate_question(prompt, prompts::progressive_fallback(*first).to_string())
                    .await
            }
            None => {
                tracing::info!("Policy: clarification ({})", verdict.reason);
                let prompt =
                    prompts::smart_clarification(brand_name, message, verdict.reason, &found_docs);
                self.generate_question(prompt, prompts::reason_fallback(verdict.reason, brand_name))
                    .await
            }
        };

        PolicyResponse::question(text, PolicyState::ProgressiveQuestion, Some(verdict))
    }

    /// Disambiguate between equipment when possible, else ask a clarification
    async fn disambiguate_or_clarify(
        &self,
        brand_name: &str,
        message: &str,
        profile: &DomainProfile,
        retrieval: &Retrieval,
    ) -> PolicyResponse {
        if let Some(response) = self
            .disambiguate(brand_name, message, profile, retrieval)
            .await
        {
            tracing::info!("Policy: disambiguation ({})", retrieval.verdict.reason);
            return response;
        }

        let verdict = retrieval.verdict.clone();
        tracing::info!("Policy: clarification ({})", verdict.reason);
        let found_docs = prompts::found_docs_list(&best_per_document(&retrieval.chunks, PROMPT_DOC_LIMIT));
        let prompt = prompts::smart_clarification(brand_name, message, verdict.reason, &found_docs);
        let text = self
            .generate_question(prompt, prompts::reason_fallback(verdict.reason, brand_name))
            .await;
        PolicyResponse::question(text, PolicyState::Disambiguation, Some(verdict))
    }

    /// Ask which equipment or manual is meant; `None` with fewer than two documents.
    ///
    /// Equipment names from the brand vocabulary are listed when filenames
    /// name at least two, otherwise the document display names are.
    async fn disambiguate(
        &self,
        brand_name: &str,
        message: &str,
        profile: &DomainProfile,
        retrieval: &Retrieval,
    ) -> Option<PolicyResponse> {
        let docs = best_per_document(&retrieval.chunks, DISAMBIGUATION_DOC_LIMIT);
        if docs.len() < 2 {
            return None;
        }
        let names: Vec<&str> = docs.iter().map(|(name, _)| name.as_str()).collect();
        let equipment = profile.equipment_in(&names);

        let (options, fallback) = if equipment.len() >= 2 {
            let options = equipment.into_iter().collect::<Vec<_>>().join(", ");
            let fallback = prompts::disambiguation_fallback(&options);
            (options, fallback)
        } else {
            (names.join(", "), prompts::default_clarification(brand_name))
        };

        let prompt =
            prompts::disambiguation(brand_name, message, &prompts::found_docs_list(&docs), &options);
        let text = self.generate_question(prompt, fallback).await;
        Some(PolicyResponse::question(
            text,
            PolicyState::Disambiguation,
            Some(retrieval.verdict.clone()),
        ))
    }

    /// Generate a question, replacing failures and invalid text with `fallback`
    async fn generate_question(&self, prompt: String, fallback: String) -> String {
        let messages = vec![ChatMessage::user(prompt)];
        match self
            .llm
            .chat_completion(messages, CompletionOptions::CLARIFICATION)
            .await
        {
            Ok(raw) => {
                let text = normalize_assistant_text(&raw);
                match check_question(&text) {
                    Ok(()) => text,
                    Err(defect) => {
                        tracing::warn!("Generated question rejected ({:?}): {:?}", defect, text);
                        fallback
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Question generation failed, using fallback: {}", e);
                fallback
            }
        }
    }

    async fn answer(
        &self,
        brand_name: &str,
        message: &str,
        history: &[Turn],
        known: &KnownContext,
        profile: &DomainProfile,
        retrieval: Retrieval,
    ) -> PolicyResponse {
        let verdict = retrieval.verdict;
        tracing::info!("Policy: answer ({})", verdict.reason);

        if retrieval.chunks.is_empty() {
            return PolicyResponse {
                text: prompts::ANSWER_EMPTY.to_string(),
                sources: Vec::new(),
                needs_clarification: false,
                state: PolicyState::Answer,
                verdict: Some(verdict),
            };
        }

        let reranker = if self.dialogue.rerank {
            self.reranker.as_deref()
        } else {
            None
        };
        let chunks = apply_rerank(
            reranker,
            &retrieval.query,
            retrieval.chunks,
            self.dialogue.answer_context,
        )
        .await;

        let sources = cite_sources(&chunks);
        let cited: Vec<&str> = sources.iter().map(|s| s.filename.as_str()).collect();
        let related = profile.related_documents(known, &cited, RELATED_DOC_LIMIT);

        let mut system = prompts::answer_system(
            brand_name,
            &format_context(&chunks),
            &format_history(history, ANSWER_HISTORY_TURNS),
        );
        if !related.is_empty() {
            system.push_str(&prompts::related_documents_instruction(&related));
        }

        let messages = vec![ChatMessage::system(system), ChatMessage::user(message)];
        let (text, sources) = match self
            .llm
            .chat_completion(messages, CompletionOptions::ANSWER)
            .await
        {
            Ok(raw) if !raw.trim().is_empty() => (normalize_assistant_text(&raw), sources),
            Ok(_) => {
                tracing::warn!("Answer composition returned empty text");
                (prompts::ANSWER_EMPTY.to_string(), Vec::new())
            }
            Err(e) => {
                tracing::warn!("Answer composition failed: {}", e);
                (prompts::ANSWER_ERROR.to_string(), Vec::new())
            }
        };

        PolicyResponse {
            text,
            sources,
            needs_clarification: false,
            state: PolicyState::Answer,
            verdict: Some(verdict),
        }
    }
}

/// Message keywords, then known identifiers, at most [`FALLBACK_KEYWORDS`]
fn fallback_keywords(message: &str, known: &KnownContext) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let candidates = extract_search_keywords(message)
        .into_iter()
        .chain(known.values().into_iter().map(str::to_string));
    for candidate in candidates {
        if keywords.len() >= FALLBACK_KEYWORDS {
            break;
        }
        if !keywords.iter().any(|k| k.eq_ignore_ascii_case(&candidate)) {
            keywords.push(candidate);
        }
    }
    keywords
}

/// Best final score per document display name, in rank order
fn best_per_document(chunks: &[CandidateChunk], limit: usize) -> Vec<(String, f64)> {
    let mut docs: Vec<(String, f64)> = Vec::new();
    for chunk in chunks {
        let name = display_name(&chunk.filename).to_string();
        match docs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, score)) => *score = score.max(chunk.final_score()),
            None => docs.push((name, chunk.final_score())),
        }
    }
    docs.truncate(limit);
    docs
}

/// One source per (display name, page), first occurrence wins
fn cite_sources(chunks: &[CandidateChunk]) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    for chunk in chunks {
        let filename = display_name(&chunk.filename).to_string();
        if sources
            .iter()
            .any(|s| s.filename == filename && s.page == chunk.page)
        {
            continue;
        }
        let score = chunk.rerank_score.unwrap_or_else(|| chunk.final_score());
        sources.push(Source {
            filename,
            page: chunk.page,
            document_id: chunk.document_id,
            score: (score * 1000.0).round() / 1000.0,
        });
    }
    sources
}

fn format_context(chunks: &[CandidateChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[Trecho {}]\nArquivo: {}\nPágina: {}\nConteúdo:\n{}",
                i + 1,
                display_name(&c.filename),
                c.page,
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn format_history(history: &[Turn], turns: usize) -> String {
    if history.is_empty() {
        return "Nenhum".to_string();
    }
    let start = history.len().saturating_sub(turns);
    history[start..]
        .iter()
        .map(|t| {
            let speaker = match t.role {
                Role::User => "Técnico",
                Role::Assistant => "Assistente",
            };
            format!("{}: {}", speaker, t.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: i64, filename: &str, page: u32, score: f64) -> CandidateChunk {
        CandidateChunk {
            document_id: doc,
            filename: filename.to_string(),
            page,
            chunk_index: 0,
            text: "texto".to_string(),
            score,
            bonus: 0.0,
            rerank_score: None,
        }
    }

    #[test]
    fn test_cite_sources_dedupes_and_rounds() {
        let mut reranked = chunk(1, "Manual GEN2.pdf", 4, 0.71234);
        reranked.rerank_score = Some(8.0);
        let chunks = vec![
            chunk(1, "Manual GEN2.pdf", 3, 0.71234),
            chunk(1, "Manual GEN2.pdf", 3, 0.6),
            reranked,
        ];
        let sources = cite_sources(&chunks);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].filename, "Manual GEN2");
        assert_eq!(sources[0].score, 0.712);
        assert_eq!(sources[1].score, 8.0);
    }

    #[test]
    fn test_cited_sources_are_not_related() {
        let sources = cite_sources(&[chunk(7, "GECB+reference+2007.pdf", 12, 0.8)]);
        let cited: Vec<&str> = sources.iter().map(|s| s.filename.as_str()).collect();
        let known = KnownContext {
            board: Some("GECB".to_string()),
            ..Default::default()
        };
        let related = DomainProfile::for_brand("otis").related_documents(&known, &cited, RELATED_DOC_LIMIT);
        assert_eq!(related, vec!["Manual GECB gen2-1.pdf".to_string()]);
    }

    #[test]
    fn test_best_per_document_keeps_rank_order() {
        let chunks = vec![
            chunk(2, "b.pdf", 1, 0.8),
            chunk(1, "a.pdf", 1, 0.7),
            chunk(2, "b.pdf", 2, 0.75),
        ];
        let docs = best_per_document(&chunks, 10);
        assert_eq!(docs, vec![("b".to_string(), 0.8), ("a".to_string(), 0.7)]);
    }

    #[test]
    fn test_fallback_keywords_add_known_values() {
        let known = KnownContext {
            model: Some("GEN2".to_string()),
            board: Some("LCB2".to_string()),
            ..Default::default()
        };
        let keywords = fallback_keywords("porta não fecha", &known);
        assert_eq!(keywords, vec!["GEN2".to_string(), "LCB2".to_string()]);
    }

    #[test]
    fn test_format_history_keeps_last_turns() {
        let history = vec![
            Turn::user("um"),
            Turn::assistant("dois"),
            Turn::user("três"),
        ];
        assert_eq!(format_history(&history, 2), "Assistente: dois\nTécnico: três");
        assert_eq!(format_history(&[], 6), "Nenhum");
    }

    #[test]
    fn test_retrieval_preference() {
        let verdict = |confident, top| Verdict {
            confident,
            reason: crate::confidence::ConfidenceReason::Acceptable,
            unique_docs: Vec::new(),
            top_score: top,
            score_spread: 0.0,
            gap_to_second_doc: 0.0,
            terms_in_results: true,
        };
        let r = |confident, top| Retrieval {
            query: String::new(),
            chunks: Vec::new(),
            verdict: verdict(confident, top),
        };
        assert!(r(true, 0.5).improves_on(&r(false, 0.9)));
        assert!(!r(false, 0.9).improves_on(&r(true, 0.5)));
        assert!(r(false, 0.6).improves_on(&r(false, 0.5)));
    }
}
