use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use tracing::info;

use super::schema;

/// Ordered schema steps. Each entry brings the database to `version`.
const MIGRATIONS: &[(i32, &str, &[&str])] = &[(
    1,
    "Workspace state snapshots",
    &[schema::CREATE_TABLES_SQL, schema::CREATE_INDEXES_SQL],
)];

/// Bring a snapshot database up to [`schema::SCHEMA_VERSION`].
///
/// Databases written by a newer release are refused rather than read with
/// a partial understanding of their layout.
pub fn check_and_migrate(conn: &Connection) -> Result<()> {
    let current = current_version(conn)?;
    if current > schema::SCHEMA_VERSION {
        bail!(
            "State database schema version {} is newer than supported version {}",
            current,
            schema::SCHEMA_VERSION
        );
    }

    for (version, description, statements) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        for sql in *statements {
            conn.execute_batch(sql)
                .with_context(|| format!("Failed to apply schema version {}", version))?;
        }
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![version, chrono::Utc::now().to_rfc3339(), description],
        )?;
        info!(version, "Applied state database migration");
    }

    Ok(())
}

/// Check a database without changing it. `Ok(false)` means the snapshot
/// tables were never created; any other version mismatch is an error.
pub fn is_current(conn: &Connection) -> Result<bool> {
    match current_version(conn)? {
        0 => Ok(false),
        v if v == schema::SCHEMA_VERSION => Ok(true),
        v if v > schema::SCHEMA_VERSION => bail!(
            "State database schema version {} is newer than supported version {}",
            v,
            schema::SCHEMA_VERSION
        ),
        v => bail!(
            "State database schema version {} needs migrating to version {}",
            v,
            schema::SCHEMA_VERSION
        ),
    }
}

/// Highest applied schema version, 0 for a fresh database.
fn current_version(conn: &Connection) -> Result<i32> {
    let has_table: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;
    if has_table == 0 {
        return Ok(0);
    }
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}
