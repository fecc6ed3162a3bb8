pub mod loader;
pub mod types;

use std::path::PathBuf;

pub use loader::load_config;
pub use types::{Config, ModuleConfig, Settings, StateBackendConfig};

/// Errors from loading the configuration tree.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration directory {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("module \"{call}\" source {} does not exist", dir.display())]
    ModuleNotFound { call: String, dir: PathBuf },

    #[error("module nesting exceeds {0} levels; check for a module that calls itself")]
    TooDeep(usize),

    #[error(transparent)]
    Backend(#[from] types::BackendConfigError),
}
