//! Index statistics

use super::Database;
use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub brands: usize,
    pub documents: usize,
    pub documents_ready: usize,
    pub pages: usize,
    pub chunks: usize,
    pub conversations: usize,
    pub turns: usize,
}

impl Database {
    pub fn stats(&self) -> Result<IndexStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(IndexStats {
            brands: count("SELECT COUNT(*) FROM brands")?,
            documents: count("SELECT COUNT(*) FROM documents")?,
            documents_ready: count("SELECT COUNT(*) FROM documents WHERE status = 'ready'")?,
            pages: count("SELECT COUNT(*) FROM pages")?,
            chunks: count("SELECT COUNT(*) FROM chunks")?,
            conversations: count("SELECT COUNT(*) FROM conversations")?,
            turns: count("SELECT COUNT(*) FROM turns")?,
        })
    }
}
