use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use super::local::LocalBackend;
use super::models::State;
use super::sqlite::SqliteBackend;
use crate::config::types::StateBackendConfig;

/// Pluggable state backend trait.
/// Implemented by the local state file backend and by SQLite.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Short backend name for logs and messages.
    fn name(&self) -> &'static str;

    /// Read the latest state snapshot for a workspace.
    ///
    /// Returns `Ok(None)` when the workspace has never had any state.
    async fn refresh_state(&self, workspace: &str) -> Result<Option<State>>;
}

/// Construct the backend selected by configuration for reading. Relative
/// paths are resolved against `base_dir`. Nothing is created on disk.
pub fn open_backend(config: &StateBackendConfig, base_dir: &Path) -> Result<Box<dyn StateBackend>> {
    match config {
        StateBackendConfig::Local { path } => {
            let path = base_dir.join(path);
            tracing::info!(path = %path.display(), "Using local state backend");
            Ok(Box::new(LocalBackend::new(path)))
        }
        StateBackendConfig::Sqlite { path } => {
            let path = base_dir.join(path);
            tracing::info!(path = %path.display(), "Using SQLite state backend");
            Ok(Box::new(SqliteBackend::open_read_only(&path)?))
        }
    }
}
