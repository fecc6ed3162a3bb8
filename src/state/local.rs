use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::backend::StateBackend;
use super::models::State;
use super::statefile;

pub const DEFAULT_STATE_FILENAME: &str = "terraform.tfstate";
const WORKSPACE_DIR: &str = "terraform.tfstate.d";
const DEFAULT_WORKSPACE: &str = "default";

/// State backend reading plain state files from the local filesystem.
///
/// Layout:
///   terraform.tfstate                          (default workspace)
///   terraform.tfstate.d/<workspace>/terraform.tfstate
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    /// `path` is the state file of the default workspace.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The state file path for a workspace.
    pub fn state_path(&self, workspace: &str) -> PathBuf {
        if workspace == DEFAULT_WORKSPACE {
            return self.path.clone();
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_STATE_FILENAME.into());
        self.base_dir()
            .join(WORKSPACE_DIR)
            .join(workspace)
            .join(file_name)
    }

    fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn refresh_state(&self, workspace: &str) -> Result<Option<State>> {
        let path = self.state_path(workspace);
        if !path.exists() {
            debug!("No state file at {}", path.display());
            return Ok(None);
        }

        match statefile::read_path(&path) {
            Ok(file) => {
                debug!(serial = file.serial, lineage = %file.lineage, "Read local state");
                Ok(Some(file.state))
            }
            Err(statefile::StateFileError::Empty) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read state file {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrs::{AbsResource, ModuleInstance, Resource};
    use crate::provider::ProviderConfigRef;
    use crate::state::models::{self, ResourceInstance, ResourceInstanceObject};

    fn one_resource_state() -> State {
        State {
            resources: vec![models::Resource {
                addr: AbsResource {
                    module: ModuleInstance::root(),
                    resource: Resource::managed("null_resource", "a"),
                },
                each: Default::default(),
                provider: ProviderConfigRef::local("null", None),
                instances: vec![ResourceInstance {
                    key: None,
                    current: Some(ResourceInstanceObject::new(0, serde_json::json!({"id": "1"}))),
                    deposed: Default::default(),
                }],
            }],
            outputs: Default::default(),
        }
    }

    #[test]
    fn missing_file_is_no_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path().join(DEFAULT_STATE_FILENAME));
        let state = tokio_test::block_on(backend.refresh_state("default")).unwrap();
        assert!(state.is_none());
    }

    #[test]
    fn reads_named_workspace() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path().join(DEFAULT_STATE_FILENAME));
        let file = statefile::File::new(one_resource_state());
        statefile::write_path(&file, &backend.state_path("staging")).unwrap();

        let state = tokio_test::block_on(backend.refresh_state("staging"))
            .unwrap()
            .unwrap();
        assert_eq!(state, file.state);
        assert!(tokio_test::block_on(backend.refresh_state("default"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_STATE_FILENAME);
        std::fs::write(&path, "{").unwrap();
        let backend = LocalBackend::new(path);
        let err = tokio_test::block_on(backend.refresh_state("default")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read state file"));
    }
}
