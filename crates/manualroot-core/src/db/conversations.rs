//! Conversation persistence
//!
//! Conversations only grow by appending turns; stored turns are never edited.

use super::Database;
use crate::dialogue::{Role, Source, Turn};
use crate::error::{ManualRootError, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationInfo {
    pub id: String,
    pub brand: String,
    pub participant: String,
    pub created_at: String,
    pub last_active_at: String,
    pub turn_count: usize,
}

impl Database {
    pub fn create_conversation(&self, brand: &str, participant: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        self.conn()?.execute(
            "INSERT INTO conversations (id, brand, participant, created_at, last_active_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, brand, participant, now],
        )?;

        Ok(id)
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationInfo>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT c.id, c.brand, c.participant, c.created_at, c.last_active_at,
                        (SELECT COUNT(*) FROM turns t WHERE t.conversation_id = c.id)
                 FROM conversations c WHERE c.id = ?1",
                params![id],
                row_to_conversation,
            )
            .optional()?;
        Ok(result)
    }

    pub fn list_conversations(
        &self,
        brand: Option<&str>,
        participant: Option<&str>,
    ) -> Result<Vec<ConversationInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.brand, c.participant, c.created_at, c.last_active_at,
                    (SELECT COUNT(*) FROM turns t WHERE t.conversation_id = c.id)
             FROM conversations c
             WHERE (?1 IS NULL OR c.brand = ?1) AND (?2 IS NULL OR c.participant = ?2)
             ORDER BY c.last_active_at DESC",
        )?;
        let results = stmt
            .query_map(params![brand, participant], row_to_conversation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM turns WHERE conversation_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        tx.commit()?;
        if rows == 0 {
            return Err(ManualRootError::ConversationNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Append one turn and bump the conversation's activity time
    pub fn append_turn(&self, conversation_id: &str, turn: &Turn) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let sources = serde_json::to_string(&turn.sources)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE conversations SET last_active_at = ?2 WHERE id = ?1",
            params![conversation_id, now],
        )?;
        if rows == 0 {
            return Err(ManualRootError::ConversationNotFound(
                conversation_id.to_string(),
            ));
        }
        tx.execute(
            "INSERT INTO turns (conversation_id, role, content, sources, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![conversation_id, turn.role.as_str(), turn.content, sources, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All turns of a conversation in insertion order
    pub fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, sources FROM turns WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let results = stmt
            .query_map(params![conversation_id], |row| {
                let role: String = row.get(0)?;
                let sources_json: String = row.get(2)?;
                let sources = serde_json::from_str::<Vec<Source>>(&sources_json)
                    .unwrap_or_default();
                Ok(Turn {
                    role: if role == "assistant" {
                        Role::Assistant
                    } else {
                        Role::User
                    },
                    content: row.get(1)?,
                    sources,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationInfo> {
    Ok(ConversationInfo {
        id: row.get(0)?,
        brand: row.get(1)?,
        participant: row.get(2)?,
        created_at: row.get(3)?,
        last_active_at: row.get(4)?,
        turn_count: row.get::<_, i64>(5)? as usize,
    })
}
