use std::collections::BTreeMap;
use std::path::Path;

use super::types::Config;
use super::ConfigError;

/// Module calls nested deeper than this are treated as a cycle.
const MAX_MODULE_DEPTH: usize = 32;

/// Load the configuration tree rooted at `dir`.
///
/// Child modules with local sources (`./`, `../`) are loaded recursively.
/// Registry and remote sources are not fetched; their calls are kept in the
/// parent module but have no child config.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::NotFound(dir.to_path_buf()));
    }
    tracing::info!("Loading configuration from {}", dir.display());
    load_module(dir, Vec::new())
}

fn load_module(dir: &Path, path: Vec<String>) -> Result<Config, ConfigError> {
    if path.len() > MAX_MODULE_DEPTH {
        return Err(ConfigError::TooDeep(MAX_MODULE_DEPTH));
    }

    let module = crate::hcl::parse_directory(dir)?;
    let mut children = BTreeMap::new();

    for call in &module.module_calls {
        if !call.is_local() {
            tracing::debug!(
                "Module \"{}\" has non-local source {}; not loading",
                call.name,
                call.source
            );
            continue;
        }

        let child_dir = dir.join(&call.source);
        if !child_dir.is_dir() {
            return Err(ConfigError::ModuleNotFound {
                call: call.name.clone(),
                dir: child_dir,
            });
        }

        let mut child_path = path.clone();
        child_path.push(call.name.clone());
        let child = load_module(&child_dir, child_path)?;
        children.insert(call.name.clone(), child);
    }

    Ok(Config {
        path,
        source_dir: dir.to_path_buf(),
        module,
        children,
    })
}
