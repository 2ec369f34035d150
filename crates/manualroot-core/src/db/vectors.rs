//! Chunk vector storage
//!
//! Stores embeddings as BLOBs and computes cosine similarity in Rust.

use super::documents::hash_text;
use super::Database;
use crate::error::Result;
use crate::search::{CandidateChunk, VectorFilter};
use chrono::Utc;
use rusqlite::params;

/// A chunk ready to be written to the vector index
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk_index: u32,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Database {
    /// Store page text and replace its chunks in one transaction.
    ///
    /// The page hash is only ever written together with the chunks built
    /// from that text, so an interrupted page is re-chunked on the next run.
    pub fn store_page(
        &self,
        document_id: i64,
        page: u32,
        text: &str,
        model: &str,
        chunks: &[ChunkRecord],
    ) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO pages (document_id, page_number, text, hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![document_id, page, text, hash_text(text), now],
        )?;
        tx.execute(
            "UPDATE documents SET total_pages = MAX(total_pages, ?2), updated_at = ?3 WHERE id = ?1",
            params![document_id, page, now],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1 AND page_number = ?2",
            params![document_id, page],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (document_id, page_number, chunk_index, text, embedding, model, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    document_id,
                    page,
                    chunk.chunk_index,
                    chunk.text,
                    embedding_to_bytes(&chunk.embedding),
                    model,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    /// Count chunks, optionally for one brand
    pub fn count_chunks(&self, brand: Option<&str>) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = match brand {
            Some(brand) => conn.query_row(
                "SELECT COUNT(*) FROM chunks c JOIN documents d ON d.id = c.document_id
                 WHERE d.brand = ?1",
                params![brand],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    /// Nearest chunks of a brand by cosine similarity
    pub fn nearest_chunks(
        &self,
        brand: &str,
        embedding: &[f32],
        limit: usize,
        min_score: f64,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<CandidateChunk>> {
        let document_id = filter.and_then(|f| f.document_id);
        let page = filter.and_then(|f| f.page);

        let rows: Vec<(CandidateChunk, Vec<u8>)> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT c.document_id, d.filename, c.page_number, c.chunk_index, c.text, c.embedding
                 FROM chunks c
                 JOIN documents d ON d.id = c.document_id
                 WHERE d.brand = ?1
                   AND (?2 IS NULL OR c.document_id = ?2)
                   AND (?3 IS NULL OR c.page_number = ?3)",
            )?;
            let rows = stmt
                .query_map(params![brand, document_id, page], |row| {
                    Ok((
                        CandidateChunk {
                            document_id: row.get(0)?,
                            filename: row.get(1)?,
                            page: row.get(2)?,
                            chunk_index: row.get(3)?,
                            text: row.get(4)?,
                            score: 0.0,
                            bonus: 0.0,
                            rerank_score: None,
                        },
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut scored: Vec<CandidateChunk> = rows
            .into_iter()
            .filter_map(|(mut chunk, bytes)| {
                let score = cosine_similarity(embedding, &bytes_to_embedding(&bytes)) as f64;
                if score >= min_score {
                    chunk.score = score;
                    Some(chunk)
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.add_brand("otis", "Otis").unwrap();
        let id = db.register_document("otis", "Manual CVF - OVF10.pdf").unwrap();
        (db, id)
    }

    fn record(index: u32, text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk_index: index,
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_nearest_chunks_orders_and_thresholds() {
        let (db, id) = setup();
        db.store_page(
            id,
            1,
            "texto",
            "test",
            &[
                record(0, "alinhado", vec![1.0, 0.0]),
                record(1, "diagonal", vec![1.0, 1.0]),
                record(2, "ortogonal", vec![0.0, 1.0]),
            ],
        )
        .unwrap();

        let hits = db.nearest_chunks("otis", &[1.0, 0.0], 10, 0.3, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "alinhado");
        assert_eq!(hits[0].filename, "Manual CVF - OVF10.pdf");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_nearest_chunks_filter_by_page() {
        let (db, id) = setup();
        db.store_page(id, 1, "p1", "test", &[record(0, "p1", vec![1.0, 0.0])])
            .unwrap();
        db.store_page(id, 2, "p2", "test", &[record(0, "p2", vec![0.0, 1.0])])
            .unwrap();

        let filter = VectorFilter {
            document_id: Some(id),
            page: Some(2),
        };
        let hits = db
            .nearest_chunks("otis", &[1.0, 0.0], 10, 0.0, Some(&filter))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "p2");
    }

    #[test]
    fn test_store_page_overwrites_chunks() {
        let (db, id) = setup();
        db.store_page(
            id,
            1,
            "a b",
            "test",
            &[record(0, "a", vec![1.0]), record(1, "b", vec![1.0])],
        )
        .unwrap();
        db.store_page(id, 1, "c", "test", &[record(0, "c", vec![1.0])])
            .unwrap();
        assert_eq!(db.count_chunks(Some("otis")).unwrap(), 1);
        assert_eq!(db.get_page_text(id, 1).unwrap().as_deref(), Some("c"));
        assert!(db.page_unchanged(id, 1, "c").unwrap());
    }
}
