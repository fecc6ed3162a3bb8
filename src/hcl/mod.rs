pub mod parser;

use std::path::{Path, PathBuf};

use crate::config::types::ModuleConfig;
use crate::config::ConfigError;

/// Parse all .tf files in a directory into a unified ModuleConfig.
///
/// A directory without any .tf files yields an empty module.
pub fn parse_directory(dir: &Path) -> Result<ModuleConfig, ConfigError> {
    let mut module = ModuleConfig::default();

    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut tf_files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "tf").unwrap_or(false))
        .collect();
    tf_files.sort();

    if tf_files.is_empty() {
        tracing::debug!("No .tf files in {}", dir.display());
    }

    for file in &tf_files {
        tracing::debug!("Parsing HCL file: {}", file.display());
        let content = std::fs::read_to_string(file).map_err(|source| ConfigError::Io {
            path: file.clone(),
            source,
        })?;
        let partial = parser::parse_hcl(&content, file)?;
        merge_module(&mut module, partial);
    }

    Ok(module)
}

/// Merge a partial module config into the main one.
fn merge_module(main: &mut ModuleConfig, partial: ModuleConfig) {
    main.module_calls.extend(partial.module_calls);

    match (&mut main.terraform_settings, partial.terraform_settings) {
        (None, partial_tf) => main.terraform_settings = partial_tf,
        (Some(main_tf), Some(partial_tf)) => {
            main_tf
                .required_providers
                .extend(partial_tf.required_providers);
            if main_tf.backend.is_none() {
                main_tf.backend = partial_tf.backend;
            }
        }
        (Some(_), None) => {}
    }
}
