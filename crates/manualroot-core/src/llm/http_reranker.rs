//! LLM-scored reranking of retrieved chunks

use super::{ChatMessage, CompletionOptions, LLMClient, RerankCandidate, RerankScore, Reranker};
use crate::error::{ManualRootError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Candidates sent per rerank call
pub const MAX_RERANK_CANDIDATES: usize = 10;

const PREVIEW_CHARS: usize = 300;

/// Reranker using external HTTP LLM service
pub struct HttpReranker {
    client: Arc<dyn LLMClient>,
}

impl HttpReranker {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
    ) -> Result<Vec<RerankScore>> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let candidates = &candidates[..candidates.len().min(MAX_RERANK_CANDIDATES)];
        let messages = vec![ChatMessage::user(build_reranking_prompt(query, candidates))];

        let response = self
            .client
            .chat_completion(messages, CompletionOptions::RERANK)
            .await?;

        parse_reranking_response(&response, candidates.len())
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

fn build_reranking_prompt(query: &str, candidates: &[RerankCandidate]) -> String {
    let mut prompt = String::from(
        "Avalie cada trecho de 0 a 10 quanto à relevância para a consulta técnica.\n\
         Se o trecho menciona o modelo/placa/código exato da consulta, score mínimo 6.\n\n",
    );
    prompt.push_str(&format!("Consulta: {}\n\nTrechos:\n", query));

    for c in candidates {
        let preview: String = c.text.chars().take(PREVIEW_CHARS).collect();
        prompt.push_str(&format!(
            "[{}] Fonte: {} | Página: {}\n{}\n\n",
            c.index, c.filename, c.page, preview
        ));
    }

    prompt.push_str(
        "Responda APENAS com JSON (sem explicação, sem markdown):\n\
         [{\"index\": 0, \"score\": 9}, {\"index\": 1, \"score\": 3}]\n",
    );
    prompt
}

/// Parse `[{"index": i, "score": s}, ...]`, tolerating code fences and
/// an array cut off mid-object.
pub(crate) fn parse_reranking_response(response: &str, count: usize) -> Result<Vec<RerankScore>> {
    let raw = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json = match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if end > start => raw[start..=end].to_string(),
        (Some(start), _) => {
            let last_complete = raw.rfind('}').filter(|&i| i > start).ok_or_else(|| {
                ManualRootError::Llm("Rerank response has no complete entry".to_string())
            })?;
            tracing::info!("Rerank: repaired truncated JSON ({} chars)", raw.len());
            format!("{}]", &raw[start..=last_complete])
        }
        _ => {
            return Err(ManualRootError::Llm(format!(
                "No JSON array in rerank response: {}",
                raw.chars().take(200).collect::<String>()
            )))
        }
    };

    let items: Vec<serde_json::Value> = serde_json::from_str(&json)?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let index = item.get("index")?.as_u64()? as usize;
            let score = item.get("score")?.as_f64()?;
            (index < count).then_some(RerankScore { index, score })
        })
        .collect())
}
