//! Database schema and initialization

use crate::error::{ManualRootError, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Main database handle
///
/// The connection sits behind a mutex so one handle can serve concurrent
/// turns. Guards are short-lived and never held across an `.await`.
pub struct Database {
    conn: Mutex<Connection>,
}

const SCHEMA_VERSION: i32 = 2;

const CREATE_TABLES: &str = r#"
-- Brands scope every collection
CREATE TABLE IF NOT EXISTS brands (
    slug TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Document registry (document id -> filename within a brand)
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    brand TEXT NOT NULL REFERENCES brands(slug) ON DELETE CASCADE,
    filename TEXT NOT NULL,
    total_pages INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(brand, filename)
);

-- Raw extracted page text
CREATE TABLE IF NOT EXISTS pages (
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    page_number INTEGER NOT NULL,
    text TEXT NOT NULL,
    hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (document_id, page_number)
);

-- Embedded chunks (vector index)
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    page_number INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(document_id, page_number, chunk_index)
);

-- Conversations and their turns
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    brand TEXT NOT NULL,
    participant TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_active_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK(role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    sources TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_documents_brand ON documents(brand);
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, page_number);
CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id);
CREATE INDEX IF NOT EXISTS idx_conversations_brand ON conversations(brand, participant);
"#;

impl Database {
    /// Open database at path, creating if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ManualRootError::Other(anyhow::anyhow!("database lock poisoned")))
    }

    /// Initialize database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        conn.execute_batch(CREATE_TABLES)?;

        // Migrations run before the version row is written
        migrate(&conn)?;

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let conn = self.conn()?;
        Ok(current_version(&conn))
    }
}

fn current_version(conn: &Connection) -> Option<i32> {
    conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .ok()
}

fn migrate(conn: &Connection) -> Result<()> {
    let current = current_version(conn).unwrap_or(0);

    if current < 2 {
        migrate_to_v2(conn)?;
    }

    Ok(())
}

/// v1 databases tracked neither document status nor page counts
fn migrate_to_v2(conn: &Connection) -> Result<()> {
    for (column, ddl) in [
        (
            "status",
            "ALTER TABLE documents ADD COLUMN status TEXT NOT NULL DEFAULT 'ready'",
        ),
        (
            "total_pages",
            "ALTER TABLE documents ADD COLUMN total_pages INTEGER NOT NULL DEFAULT 0",
        ),
    ] {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('documents') WHERE name = ?1",
                params![column],
                |row| row.get(0),
            )
            .unwrap_or(false);
        if !exists {
            conn.execute(ddl, [])?;
        }
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
        params![2],
    )?;

    Ok(())
}
