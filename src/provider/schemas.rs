use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::ProviderAddr;
use crate::addrs::ResourceMode;

/// The schema facts the show command needs about one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTypeSchema {
    /// Current version of the type's attribute schema.
    pub version: u64,
    /// Top-level attributes the provider marks as sensitive.
    pub sensitive_attributes: BTreeSet<String>,
}

impl ResourceTypeSchema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            sensitive_attributes: BTreeSet::new(),
        }
    }

    pub fn with_sensitive(mut self, attr: &str) -> Self {
        self.sensitive_attributes.insert(attr.to_string());
        self
    }

    pub fn is_sensitive(&self, attr: &str) -> bool {
        self.sensitive_attributes.contains(attr)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderSchema {
    pub resource_types: BTreeMap<String, ResourceTypeSchema>,
    pub data_sources: BTreeMap<String, ResourceTypeSchema>,
}

/// Registry of provider schemas, keyed by fully-qualified provider address.
///
/// Populated from the provider schema cache that `oxid init` writes under
/// the working directory:
///
///   .oxid/providers/schemas.json
///
/// The file uses the same layout as `providers schema -json`.
#[derive(Debug, Clone, Default)]
pub struct Schemas {
    providers: BTreeMap<ProviderAddr, ProviderSchema>,
}

impl Schemas {
    /// Default location of the schema cache inside a working directory.
    pub fn cache_path(working_dir: &Path) -> PathBuf {
        working_dir.join("providers").join("schemas.json")
    }

    /// Load the schema cache. A missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        if !path.exists() {
            debug!("No provider schema cache at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            SchemaError::Parse { message, .. } => SchemaError::Parse {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })
    }

    /// Parse a schema document in the `providers schema -json` layout.
    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        let doc: SchemasDocument = serde_json::from_str(content).map_err(|e| SchemaError::Parse {
            path: None,
            message: e.to_string(),
        })?;

        let mut schemas = Self::default();
        for (source, provider) in doc.provider_schemas {
            let addr = ProviderAddr::parse_source(&source).map_err(|e| SchemaError::Parse {
                path: None,
                message: e.to_string(),
            })?;
            let entry = schemas.providers.entry(addr).or_default();
            entry.resource_types.extend(
                provider
                    .resource_schemas
                    .into_iter()
                    .map(|(name, s)| (name, s.into_schema())),
            );
            entry.data_sources.extend(
                provider
                    .data_source_schemas
                    .into_iter()
                    .map(|(name, s)| (name, s.into_schema())),
            );
        }

        debug!("Loaded schemas for {} provider(s)", schemas.providers.len());
        Ok(schemas)
    }

    /// Register a resource type schema.
    pub fn insert(
        &mut self,
        provider: ProviderAddr,
        mode: ResourceMode,
        type_name: &str,
        schema: ResourceTypeSchema,
    ) {
        let entry = self.providers.entry(provider).or_default();
        match mode {
            ResourceMode::Managed => entry.resource_types.insert(type_name.to_string(), schema),
            ResourceMode::Data => entry.data_sources.insert(type_name.to_string(), schema),
        };
    }

    /// Builder form of [`Schemas::insert`].
    pub fn with(
        mut self,
        provider: ProviderAddr,
        mode: ResourceMode,
        type_name: &str,
        schema: ResourceTypeSchema,
    ) -> Self {
        self.insert(provider, mode, type_name, schema);
        self
    }

    /// Look up the schema for a resource type offered by a provider.
    pub fn resource_type(
        &self,
        provider: &ProviderAddr,
        mode: ResourceMode,
        type_name: &str,
    ) -> Option<&ResourceTypeSchema> {
        let provider = self.providers.get(provider)?;
        match mode {
            ResourceMode::Managed => provider.resource_types.get(type_name),
            ResourceMode::Data => provider.data_sources.get(type_name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ─── Cache file layout ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SchemasDocument {
    #[serde(default)]
    provider_schemas: BTreeMap<String, ProviderSchemaDoc>,
}

#[derive(Debug, Deserialize)]
struct ProviderSchemaDoc {
    #[serde(default)]
    resource_schemas: BTreeMap<String, SchemaDoc>,
    #[serde(default)]
    data_source_schemas: BTreeMap<String, SchemaDoc>,
}

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    block: Option<BlockDoc>,
}

#[derive(Debug, Deserialize)]
struct BlockDoc {
    #[serde(default)]
    attributes: BTreeMap<String, AttributeDoc>,
}

#[derive(Debug, Deserialize)]
struct AttributeDoc {
    #[serde(default)]
    sensitive: bool,
}

impl SchemaDoc {
    fn into_schema(self) -> ResourceTypeSchema {
        let sensitive_attributes = self
            .block
            .map(|b| {
                b.attributes
                    .into_iter()
                    .filter(|(_, a)| a.sensitive)
                    .map(|(name, _)| name)
                    .collect()
            })
            .unwrap_or_default();
        ResourceTypeSchema {
            version: self.version,
            sensitive_attributes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read provider schema cache {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse provider schemas{}: {message}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE: &str = r#"{
        "format_version": "1.0",
        "provider_schemas": {
            "registry.terraform.io/hashicorp/aws": {
                "provider": {"version": 0, "block": {}},
                "resource_schemas": {
                    "aws_db_instance": {
                        "version": 2,
                        "block": {
                            "attributes": {
                                "password": {"type": "string", "optional": true, "sensitive": true},
                                "engine": {"type": "string", "required": true}
                            }
                        }
                    }
                },
                "data_source_schemas": {
                    "aws_ami": {"version": 0, "block": {"attributes": {}}}
                }
            }
        }
    }"#;

    #[test]
    fn parses_cache_layout() {
        let schemas = Schemas::from_json(CACHE).unwrap();
        let aws = ProviderAddr::implied("aws");

        let db = schemas
            .resource_type(&aws, ResourceMode::Managed, "aws_db_instance")
            .unwrap();
        assert_eq!(db.version, 2);
        assert!(db.is_sensitive("password"));
        assert!(!db.is_sensitive("engine"));

        assert!(schemas
            .resource_type(&aws, ResourceMode::Data, "aws_ami")
            .is_some());
        assert!(schemas
            .resource_type(&aws, ResourceMode::Managed, "aws_ami")
            .is_none());
    }

    #[test]
    fn missing_cache_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let schemas = Schemas::load(&dir.path().join("nope.json")).unwrap();
        assert!(schemas.is_empty());
    }

    #[test]
    fn malformed_cache_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schemas.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Schemas::load(&path).unwrap_err();
        assert!(err.to_string().contains("schemas.json"));
    }
}
