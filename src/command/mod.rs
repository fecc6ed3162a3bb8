pub mod show;

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::{self, Config, ConfigError, Settings};
use crate::error::ShowError;
use crate::provider::schemas::Schemas;
use crate::state::backend::StateBackend;

/// Everything a show invocation needs, built once up front. Nothing inside
/// the library reads the working directory or environment on its own.
///
/// The state backend is only opened when the current state is shown; until
/// then `settings.state_backend` just records the selection.
pub struct ShowContext {
    pub settings: Settings,
    pub config: Config,
    pub schemas: Schemas,
    /// Backend to use instead of the one selected in `settings`.
    pub backend: Option<Box<dyn StateBackend>>,
}

impl ShowContext {
    pub fn new(settings: Settings, config: Config, schemas: Schemas) -> Self {
        Self {
            settings,
            config,
            schemas,
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn StateBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Load the configuration and the provider schema cache, and record the
    /// state backend selected by the root module.
    ///
    /// A missing configuration directory is treated as an empty configuration
    /// so saved plan and state files can be shown from anywhere.
    pub fn open(
        config_dir: PathBuf,
        working_dir: PathBuf,
        workspace: &str,
    ) -> Result<Self, ShowError> {
        let config = match config::load_config(&config_dir) {
            Ok(config) => config,
            Err(ConfigError::NotFound(dir)) => {
                warn!(
                    "Configuration directory {} not found; using empty configuration",
                    dir.display()
                );
                Config::default()
            }
            Err(e) => return Err(ShowError::ConfigLoad(e)),
        };

        let settings = Settings::new(config_dir, working_dir, workspace)
            .with_root_module(&config.module)
            .map_err(ConfigError::from)?;

        let schemas = Schemas::load(&settings.schema_cache())
            .map_err(|e| ShowError::Context(e.to_string()))?;
        if schemas.is_empty() {
            debug!("Provider schema cache is empty");
        }

        Ok(Self::new(settings, config, schemas))
    }
}
