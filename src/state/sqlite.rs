use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use super::backend::StateBackend;
use super::migration;
use super::models::State;
use super::statefile;

/// SQLite-backed state store for local development and single-user workflows.
///
/// Stores complete state file snapshots per workspace; the snapshot with the
/// highest serial is the current state.
pub struct SqliteBackend {
    /// `None` when opened read-only on a database that does not exist yet.
    conn: Option<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open or create the SQLite state database, migrating it to the current
    /// schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open state database at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        migration::check_and_migrate(&conn)?;
        Ok(Self::with_conn(conn))
    }

    /// Open an existing database without writing to it.
    ///
    /// A missing file, or one that never had the snapshot tables created,
    /// reads as a database without state.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            debug!("No state database at {}", db_path.display());
            return Ok(Self { conn: None });
        }
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open state database at {}", db_path.display()))?;
        if !migration::is_current(&conn)? {
            debug!("State database at {} has no snapshot tables", db_path.display());
            return Ok(Self { conn: None });
        }
        Ok(Self::with_conn(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migration::check_and_migrate(&conn)?;
        Ok(Self::with_conn(conn))
    }

    fn with_conn(conn: Connection) -> Self {
        Self {
            conn: Some(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<Option<MutexGuard<'_, Connection>>> {
        self.conn
            .as_ref()
            .map(|conn| {
                conn.lock()
                    .map_err(|_| anyhow!("State database connection lock poisoned"))
            })
            .transpose()
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    /// Store a state file as the newest snapshot of a workspace, creating
    /// the workspace on first use.
    pub fn persist_state(&self, workspace: &str, file: &statefile::File) -> Result<()> {
        let mut buf = Vec::new();
        statefile::write(file, &mut buf)?;
        let state_json = String::from_utf8(buf).context("State file is not valid UTF-8")?;

        let now = Self::now();
        let conn = self
            .conn()?
            .ok_or_else(|| anyhow!("State database does not exist"))?;
        conn.execute(
            "INSERT INTO workspaces (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(name) DO UPDATE SET updated_at = excluded.updated_at",
            params![uuid::Uuid::new_v4().to_string(), workspace, now],
        )?;
        let workspace_id: String = conn.query_row(
            "SELECT id FROM workspaces WHERE name = ?1",
            params![workspace],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO state_snapshots (workspace_id, serial, lineage, state_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![workspace_id, file.serial as i64, file.lineage, state_json, now],
        )
        .with_context(|| {
            format!(
                "Failed to store state serial {} for workspace '{}'",
                file.serial, workspace
            )
        })?;
        Ok(())
    }
}

#[async_trait]
impl StateBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn refresh_state(&self, workspace: &str) -> Result<Option<State>> {
        let row: Option<(i64, String)> = {
            let Some(conn) = self.conn()? else {
                return Ok(None);
            };
            conn.query_row(
                "SELECT s.serial, s.state_json FROM state_snapshots s
                 JOIN workspaces w ON w.id = s.workspace_id
                 WHERE w.name = ?1
                 ORDER BY s.serial DESC, s.id DESC
                 LIMIT 1",
                params![workspace],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let Some((serial, state_json)) = row else {
            debug!(workspace, "No state snapshots stored");
            return Ok(None);
        };

        let file = statefile::read(state_json.as_bytes()).with_context(|| {
            format!(
                "Failed to decode state snapshot serial {} for workspace '{}'",
                serial, workspace
            )
        })?;
        debug!(workspace, serial, "Read state snapshot");
        Ok(Some(file.state))
    }
}
