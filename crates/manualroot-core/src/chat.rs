//! Conversation orchestration
//!
//! Loads a conversation, runs the dialogue policy on the new message and
//! appends both turns.

use crate::config::Config;
use crate::db::{ConversationInfo, Database};
use crate::dialogue::{DialoguePolicy, PolicyState, Source, Turn};
use crate::error::{ManualRootError, Result};
use crate::llm::{HttpEmbedder, HttpReranker, LLMClient, VLLMClient};
use crate::search::{FilenameCache, HybridSearch, SearchBackend};
use serde::Serialize;
use std::sync::Arc;

/// Result of one chat turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub needs_clarification: bool,
    pub state: PolicyState,
}

pub struct ChatService {
    db: Arc<Database>,
    policy: DialoguePolicy,
}

impl ChatService {
    pub fn new(db: Arc<Database>, policy: DialoguePolicy) -> Self {
        Self { db, policy }
    }

    /// Wire the HTTP reasoning client, embedder and optional reranker from `config`
    pub fn from_config(db: Arc<Database>, filenames: Arc<FilenameCache>, config: &Config) -> Result<Self> {
        let llm: Arc<dyn LLMClient> = Arc::new(VLLMClient::new(config.llm_service.clone())?);
        let embedder = Arc::new(HttpEmbedder::new(
            Arc::clone(&llm),
            config.llm_service.embedding_model.clone(),
        ));
        let backend: Arc<dyn SearchBackend> = db.clone();
        let search = HybridSearch::new(backend, embedder, filenames, config.retrieval.clone());

        let mut policy = DialoguePolicy::new(
            Arc::clone(&llm),
            search,
            config.dialogue.clone(),
            config.confidence.clone(),
        );
        if config.dialogue.rerank {
            policy = policy.with_reranker(Arc::new(HttpReranker::new(llm)));
        }
        Ok(Self::new(db, policy))
    }

    /// Process one user message.
    ///
    /// Without `conversation_id` a new conversation is started for
    /// `participant`. The user turn and the response are appended in order.
    pub async fn handle_turn(
        &self,
        brand: &str,
        conversation_id: Option<&str>,
        participant: &str,
        message: &str,
    ) -> Result<ChatResponse> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ManualRootError::InvalidInput("message is empty".into()));
        }
        let brand_info = self.db.require_brand(brand)?;

        let conversation_id = match conversation_id {
            Some(id) => {
                let info = self
                    .db
                    .get_conversation(id)?
                    .ok_or_else(|| ManualRootError::ConversationNotFound(id.to_string()))?;
                if info.brand != brand_info.slug {
                    return Err(ManualRootError::InvalidInput(format!(
                        "conversation {} belongs to brand {}",
                        id, info.brand
                    )));
                }
                info.id
            }
            None => self.db.create_conversation(&brand_info.slug, participant)?,
        };

        let history = self.db.get_turns(&conversation_id)?;
        self.db
            .append_turn(&conversation_id, &Turn::user(message))?;

        let response = self
            .policy
            .respond(&brand_info.slug, &brand_info.name, message, &history)
            .await;
        tracing::info!(
            "Conversation {} turn {}: {}",
            conversation_id,
            history.len() / 2 + 1,
            response.state
        );

        let turn = Turn::assistant(response.text.clone()).with_sources(response.sources.clone());
        self.db.append_turn(&conversation_id, &turn)?;

        Ok(ChatResponse {
            conversation_id,
            answer: response.text,
            sources: response.sources,
            needs_clarification: response.needs_clarification,
            state: response.state,
        })
    }

    pub fn list_conversations(
        &self,
        brand: Option<&str>,
        participant: Option<&str>,
    ) -> Result<Vec<ConversationInfo>> {
        self.db.list_conversations(brand, participant)
    }

    /// Turns of a conversation, failing when it does not exist
    pub fn get_conversation(&self, id: &str) -> Result<(ConversationInfo, Vec<Turn>)> {
        let info = self
            .db
            .get_conversation(id)?
            .ok_or_else(|| ManualRootError::ConversationNotFound(id.to_string()))?;
        let turns = self.db.get_turns(id)?;
        Ok((info, turns))
    }

    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        self.db.delete_conversation(id)
    }
}
