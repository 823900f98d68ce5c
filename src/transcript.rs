// ABOUTME: Append-only SQLite transcript of (sender, message, reply) triples.
// ABOUTME: Fire-and-forget from the pipeline; a failed write never retracts a sent reply.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transcripts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT NOT NULL,
    message TEXT NOT NULL,
    reply TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRow {
    pub sender: String,
    pub message: String,
    pub reply: String,
}

/// Write-once transcript sink. No update or delete operations exist.
#[derive(Clone)]
pub struct TranscriptStore {
    conn: Arc<Mutex<Connection>>,
}

impl TranscriptStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).with_context(|| {
            format!("Failed to open transcript database {}", path.as_ref().display())
        })?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("Failed to open in-memory database")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create transcripts table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append one row. Runs on the blocking pool since rusqlite is
    /// synchronous; the pipeline treats failures as log-and-continue.
    pub async fn append(&self, sender: &str, message: &str, reply: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let (sender, message, reply) =
            (sender.to_string(), message.to_string(), reply.to_string());
        let created_at = chrono::Utc::now().to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO transcripts (sender, message, reply, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![sender, message, reply, created_at],
            )
            .context("Failed to insert transcript row")?;
            Ok(())
        })
        .await
        .context("Transcript writer task panicked")?
    }

    /// Most recent rows, newest first. Used by tests and operator tooling.
    pub fn recent(&self, limit: usize) -> Result<Vec<TranscriptRow>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT sender, message, reply FROM transcripts ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TranscriptRow {
                    sender: row.get(0)?,
                    message: row.get(1)?,
                    reply: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
