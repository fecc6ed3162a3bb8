use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::addrs::ModuleInstance;
use crate::provider::{ProviderAddr, ProviderAddrError, ProviderConfigRef};
use crate::state::local::DEFAULT_STATE_FILENAME;

// ─── Command Settings ───────────────────────────────────────────────────────

/// Settings for one show invocation, assembled from CLI flags and the root
/// module's `terraform {}` block.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding the root module's `.tf` files.
    pub config_dir: PathBuf,
    /// oxid working directory (provider cache, SQLite database).
    pub working_dir: PathBuf,
    pub workspace: String,
    pub state_backend: StateBackendConfig,
}

impl Settings {
    pub fn new(config_dir: PathBuf, working_dir: PathBuf, workspace: &str) -> Self {
        Self {
            config_dir,
            working_dir,
            workspace: workspace.to_string(),
            state_backend: StateBackendConfig::default(),
        }
    }

    /// Apply the backend selected in the root module, if any.
    pub fn with_root_module(mut self, root: &ModuleConfig) -> Result<Self, BackendConfigError> {
        let backend = root
            .terraform_settings
            .as_ref()
            .and_then(|tf| tf.backend.as_ref());
        if let Some(backend) = backend {
            self.state_backend = StateBackendConfig::from_block(backend)?;
        }
        Ok(self)
    }

    /// Path of the provider schema cache.
    pub fn schema_cache(&self) -> PathBuf {
        crate::provider::schemas::Schemas::cache_path(&self.working_dir)
    }
}

/// State backend selection. Paths are relative to the config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBackendConfig {
    Local { path: PathBuf },
    Sqlite { path: PathBuf },
}

impl Default for StateBackendConfig {
    fn default() -> Self {
        StateBackendConfig::Local {
            path: PathBuf::from(DEFAULT_STATE_FILENAME),
        }
    }
}

impl StateBackendConfig {
    fn from_block(block: &BackendBlock) -> Result<Self, BackendConfigError> {
        let path = block.attributes.get("path").map(PathBuf::from);
        match block.kind.as_str() {
            "local" => Ok(StateBackendConfig::Local {
                path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILENAME)),
            }),
            "sqlite" => Ok(StateBackendConfig::Sqlite {
                path: path.unwrap_or_else(|| PathBuf::from(".oxid/oxid.db")),
            }),
            other => Err(BackendConfigError::Unsupported(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendConfigError {
    #[error("unsupported state backend \"{0}\"; supported backends are \"local\" and \"sqlite\"")]
    Unsupported(String),
}

// ─── Configuration Tree ─────────────────────────────────────────────────────

/// A loaded configuration tree: the root module and the child modules it
/// calls, keyed by call name.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Static module path (call names from the root).
    pub path: Vec<String>,
    pub source_dir: PathBuf,
    pub module: ModuleConfig,
    pub children: BTreeMap<String, Config>,
}

impl Config {
    /// Find the configuration of a descendant module by static path.
    pub fn descendant(&self, path: &[String]) -> Option<&Config> {
        let mut current = self;
        for name in path {
            current = current.children.get(name)?;
        }
        Some(current)
    }

    /// Resolve a provider configuration reference made from `module` to the
    /// fully-qualified provider address.
    ///
    /// A local name is looked up in the module's own `required_providers`.
    /// Failing that, a `providers = { ... }` entry on the call that created
    /// the module hands the name over to the parent's namespace. Anything
    /// left is the implied `hashicorp/<local name>`.
    pub fn resolve_provider(
        &self,
        module: &ModuleInstance,
        reference: &ProviderConfigRef,
    ) -> Result<ProviderAddr, ProviderAddrError> {
        if let Some(ref source) = reference.source {
            return Ok(source.clone());
        }
        self.resolve_local_name(&module.module_path(), &reference.local_name)
    }

    fn resolve_local_name(
        &self,
        path: &[String],
        local_name: &str,
    ) -> Result<ProviderAddr, ProviderAddrError> {
        let Some(config) = self.descendant(path) else {
            return Ok(ProviderAddr::implied(local_name));
        };
        if let Some(req) = config.module.required_provider(local_name) {
            return ProviderAddr::parse_source(&req.source);
        }

        if let Some((call_name, parent_path)) = path.split_last() {
            let passed = self
                .descendant(parent_path)
                .and_then(|parent| parent.module.module_call(call_name))
                .and_then(|call| call.passed_provider(local_name));
            if let Some(parent_ref) = passed {
                let parent_ref = ProviderConfigRef::parse(parent_ref)?;
                return self.resolve_local_name(parent_path, &parent_ref.local_name);
            }
        }

        Ok(ProviderAddr::implied(local_name))
    }
}

/// The parts of one module directory needed to resolve providers and
/// locate child modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    pub module_calls: Vec<ModuleCall>,
    pub terraform_settings: Option<TerraformSettings>,
}

impl ModuleConfig {
    pub fn required_provider(&self, local_name: &str) -> Option<&RequiredProvider> {
        self.terraform_settings
            .as_ref()
            .and_then(|tf| tf.required_providers.get(local_name))
            .filter(|req| !req.source.is_empty())
    }

    pub fn module_call(&self, name: &str) -> Option<&ModuleCall> {
        self.module_calls.iter().find(|call| call.name == name)
    }
}

/// terraform {} block settings (required_providers, backend)
#[derive(Debug, Clone, Default)]
pub struct TerraformSettings {
    pub required_providers: BTreeMap<String, RequiredProvider>,
    pub backend: Option<BackendBlock>,
}

#[derive(Debug, Clone)]
pub struct RequiredProvider {
    /// Empty for the legacy `name = "<version>"` form.
    pub source: String,
}

/// A `backend "<kind>" { ... }` block. Only literal attributes are kept.
#[derive(Debug, Clone, Default)]
pub struct BackendBlock {
    pub kind: String,
    pub attributes: BTreeMap<String, String>,
}

// ─── Module Call ────────────────────────────────────────────────────────────

/// A module block.
#[derive(Debug, Clone)]
pub struct ModuleCall {
    pub name: String,
    pub source: String,
    /// Provider configurations passed to the child: child key (`aws` or
    /// `aws.west`) → parent reference.
    pub providers: BTreeMap<String, String>,
}

impl ModuleCall {
    /// Local sources are relative filesystem paths.
    pub fn is_local(&self) -> bool {
        self.source.starts_with("./") || self.source.starts_with("../")
    }

    /// The parent reference passed for a child local name, aliased or not.
    pub fn passed_provider(&self, local_name: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|(key, _)| key.split('.').next() == Some(local_name))
            .map(|(_, parent)| parent.as_str())
    }
}
