//! Brand, document and page text storage

use super::Database;
use crate::error::{ManualRootError, Result};
use crate::search::{DocumentEntry, PageRef};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Brand information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandInfo {
    pub slug: String,
    pub name: String,
    pub created_at: String,
    pub document_count: usize,
}

/// Ingestion state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Indexing => "indexing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "indexing" => Self::Indexing,
            "ready" => Self::Ready,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Document metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: i64,
    pub brand: String,
    pub filename: String,
    pub total_pages: u32,
    pub status: DocumentStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// SHA-256 of page text, hex encoded
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Database {
    /// Add a brand or rename an existing one
    pub fn add_brand(&self, slug: &str, name: &str) -> Result<()> {
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() {
            return Err(ManualRootError::InvalidInput("brand slug is empty".into()));
        }
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO brands (slug, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(slug) DO UPDATE SET name = excluded.name",
            params![slug, name, now],
        )?;
        Ok(())
    }

    /// Get brand by slug
    pub fn get_brand(&self, slug: &str) -> Result<Option<BrandInfo>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT b.slug, b.name, b.created_at,
                        (SELECT COUNT(*) FROM documents d WHERE d.brand = b.slug)
                 FROM brands b WHERE b.slug = ?1",
                params![slug],
                |row| {
                    Ok(BrandInfo {
                        slug: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                        document_count: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Get brand or fail with `BrandNotFound`
    pub fn require_brand(&self, slug: &str) -> Result<BrandInfo> {
        self.get_brand(slug)?
            .ok_or_else(|| ManualRootError::BrandNotFound(slug.to_string()))
    }

    /// List all brands
    pub fn list_brands(&self) -> Result<Vec<BrandInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT b.slug, b.name, b.created_at,
                    (SELECT COUNT(*) FROM documents d WHERE d.brand = b.slug)
             FROM brands b ORDER BY b.slug",
        )?;
        let results = stmt
            .query_map([], |row| {
                Ok(BrandInfo {
                    slug: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    document_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Register a document under a brand, returning its id.
    /// Re-registering the same filename returns the existing id.
    pub fn register_document(&self, brand: &str, filename: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (brand, filename, status, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, ?3)
             ON CONFLICT(brand, filename) DO UPDATE SET updated_at = excluded.updated_at",
            params![brand, filename, now],
        )?;
        let id = conn.query_row(
            "SELECT id FROM documents WHERE brand = ?1 AND filename = ?2",
            params![brand, filename],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Get document by id
    pub fn get_document(&self, id: i64) -> Result<Option<DocumentInfo>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT id, brand, filename, total_pages, status, created_at, updated_at
                 FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()?;
        Ok(result)
    }

    /// List documents of a brand
    pub fn list_brand_documents(&self, brand: &str) -> Result<Vec<DocumentInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, brand, filename, total_pages, status, created_at, updated_at
             FROM documents WHERE brand = ?1 ORDER BY id",
        )?;
        let results = stmt
            .query_map(params![brand], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    pub fn set_document_status(&self, id: i64, status: DocumentStatus) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn()?.execute(
            "UPDATE documents SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now],
        )?;
        if rows == 0 {
            return Err(ManualRootError::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete a document with its pages and chunks, returning its brand
    pub fn delete_document(&self, id: i64) -> Result<String> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let brand: String = tx
            .query_row(
                "SELECT brand FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ManualRootError::DocumentNotFound(id.to_string()))?;
        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![id])?;
        tx.execute("DELETE FROM pages WHERE document_id = ?1", params![id])?;
        tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(brand)
    }

    /// Whether the stored text of a page is identical to `text`
    pub fn page_unchanged(&self, document_id: i64, page: u32, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT hash FROM pages WHERE document_id = ?1 AND page_number = ?2",
                params![document_id, page],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.as_deref() == Some(hash_text(text).as_str()))
    }

    /// Get raw text of one page
    pub fn get_page_text(&self, document_id: i64, page: u32) -> Result<Option<String>> {
        let conn = self.conn()?;
        let text = conn
            .query_row(
                "SELECT text FROM pages WHERE document_id = ?1 AND page_number = ?2",
                params![document_id, page],
                |row| row.get(0),
            )
            .optional()?;
        Ok(text)
    }

    /// Pages of a brand whose raw text contains `keyword`, case-insensitively.
    ///
    /// Case is folded in Rust since SQLite's `lower()` only folds ASCII.
    pub fn find_pages_containing(
        &self,
        brand: &str,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<PageRef>> {
        let needle = keyword.to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.document_id, p.page_number, p.text
             FROM pages p
             JOIN documents d ON d.id = p.document_id
             WHERE d.brand = ?1
             ORDER BY p.document_id, p.page_number",
        )?;
        let mut rows = stmt.query(params![brand])?;

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(2)?;
            if !text.to_lowercase().contains(&needle) {
                continue;
            }
            results.push(PageRef {
                document_id: row.get(0)?,
                page: row.get(1)?,
            });
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    /// One page of the document id -> filename registry
    pub fn document_registry_page(
        &self,
        brand: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DocumentEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, filename FROM documents WHERE brand = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?;
        let results = stmt
            .query_map(params![brand, limit as i64, offset as i64], |row| {
                Ok(DocumentEntry {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentInfo> {
    let status: String = row.get(4)?;
    Ok(DocumentInfo {
        id: row.get(0)?,
        brand: row.get(1)?,
        filename: row.get(2)?,
        total_pages: row.get(3)?,
        status: DocumentStatus::parse(&status),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.add_brand("otis", "Otis").unwrap();
        db
    }

    #[test]
    fn test_register_document_is_idempotent() {
        let db = setup();
        let a = db.register_document("otis", "Manual GEN2.pdf").unwrap();
        let b = db.register_document("otis", "Manual GEN2.pdf").unwrap();
        assert_eq!(a, b);
        assert_eq!(db.require_brand("otis").unwrap().document_count, 1);
    }

    #[test]
    fn test_missing_brand() {
        let db = setup();
        assert!(matches!(
            db.require_brand("schindler"),
            Err(ManualRootError::BrandNotFound(_))
        ));
    }

    #[test]
    fn test_page_unchanged_compares_stored_hash() {
        let db = setup();
        let id = db.register_document("otis", "LCB2 Resumo.pdf").unwrap();
        assert!(!db.page_unchanged(id, 1, "texto da pagina").unwrap());
        db.store_page(id, 1, "texto da pagina", "test", &[]).unwrap();
        assert!(db.page_unchanged(id, 1, "texto da pagina").unwrap());
        assert!(!db.page_unchanged(id, 1, "texto revisado").unwrap());
        assert_eq!(db.get_document(id).unwrap().unwrap().total_pages, 1);
    }

    #[test]
    fn test_find_pages_case_insensitive_and_brand_scoped() {
        let db = setup();
        db.add_brand("atlas", "Atlas").unwrap();
        let otis = db.register_document("otis", "Diagrama.pdf").unwrap();
        let atlas = db.register_document("atlas", "Outro.pdf").unwrap();
        db.store_page(otis, 3, "Entrada DFC no conector P4", "test", &[]).unwrap();
        db.store_page(atlas, 1, "entrada dfc", "test", &[]).unwrap();

        let hits = db.find_pages_containing("otis", "dfc", 10).unwrap();
        assert_eq!(
            hits,
            vec![PageRef {
                document_id: otis,
                page: 3
            }]
        );
    }

    #[test]
    fn test_find_pages_folds_non_ascii_case() {
        let db = setup();
        let id = db.register_document("otis", "Plano.pdf").unwrap();
        db.store_page(id, 1, "PLANO DE MANUTENÇÃO PREVENTIVA", "test", &[]).unwrap();
        db.store_page(id, 2, "Lubrificação das guias", "test", &[]).unwrap();

        let hits = db.find_pages_containing("otis", "manutenção", 10).unwrap();
        assert_eq!(hits, vec![PageRef { document_id: id, page: 1 }]);
        let hits = db.find_pages_containing("otis", "LUBRIFICAÇÃO", 10).unwrap();
        assert_eq!(hits, vec![PageRef { document_id: id, page: 2 }]);
    }

    #[test]
    fn test_registry_paging() {
        let db = setup();
        for i in 0..5 {
            db.register_document("otis", &format!("doc{}.pdf", i)).unwrap();
        }
        let first = db.document_registry_page("otis", 0, 3).unwrap();
        let second = db.document_registry_page("otis", 3, 3).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].filename, "doc4.pdf");
    }

    #[test]
    fn test_delete_document() {
        let db = setup();
        let id = db.register_document("otis", "mrl.pdf").unwrap();
        db.store_page(id, 1, "texto", "test", &[]).unwrap();
        assert_eq!(db.delete_document(id).unwrap(), "otis");
        assert!(db.get_document(id).unwrap().is_none());
        assert!(matches!(
            db.delete_document(id),
            Err(ManualRootError::DocumentNotFound(_))
        ));
    }
}
