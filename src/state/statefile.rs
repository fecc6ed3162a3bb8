//! Reading and writing the JSON state file format (version 4).
//!
//! ```json
//! {
//!   "version": 4,
//!   "terraform_version": "0.1.3",
//!   "serial": 7,
//!   "lineage": "6f1c…",
//!   "outputs": { "vpc_id": { "value": "vpc-123", "type": "string" } },
//!   "resources": [
//!     {
//!       "module": "module.net",
//!       "mode": "managed",
//!       "type": "aws_subnet",
//!       "name": "private",
//!       "each": "list",
//!       "provider": "provider.aws",
//!       "instances": [
//!         { "index_key": 0, "schema_version": 1, "attributes": { … } }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::models::{
    DeposedKey, EachMode, ObjectStatus, OutputValue, Resource, ResourceInstance,
    ResourceInstanceObject, State,
};
use crate::addrs::{AbsResource, InstanceKey, ModuleInstance, ResourceMode};
use crate::provider::ProviderConfigRef;

/// The only state file format version this crate reads and writes.
pub const STATE_VERSION: u64 = 4;

/// A state snapshot together with its file-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub tool_version: String,
    pub serial: u64,
    pub lineage: String,
    pub state: State,
}

impl File {
    /// Wrap a state in a new lineage at serial 1.
    pub fn new(state: State) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            serial: 1,
            lineage: uuid::Uuid::new_v4().to_string(),
            state,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateFileError {
    #[error("failed to read state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is empty")]
    Empty,

    #[error("state file is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("unsupported state file format version {0}; only version {STATE_VERSION} is supported")]
    UnsupportedVersion(u64),

    #[error("invalid state file: {0}")]
    Invalid(String),
}

/// Open and read a state file from disk. The file is closed before return.
pub fn read_path(path: &Path) -> Result<File, StateFileError> {
    let f = std::fs::File::open(path)?;
    read(f)
}

/// Read a state file from any reader.
pub fn read<R: Read>(mut reader: R) -> Result<File, StateFileError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(StateFileError::Empty);
    }

    let sniff: VersionSniff = serde_json::from_slice(&buf).map_err(StateFileError::Syntax)?;
    if sniff.version != STATE_VERSION {
        return Err(StateFileError::UnsupportedVersion(sniff.version));
    }

    let raw: StateV4 = serde_json::from_slice(&buf).map_err(StateFileError::Syntax)?;
    raw.into_file()
}

/// Serialise a state file. Output is deterministic for equal inputs.
pub fn write<W: Write>(file: &File, mut writer: W) -> Result<(), StateFileError> {
    let raw = StateV4::from_file(file);
    let bytes = serde_json::to_vec_pretty(&raw).map_err(StateFileError::Syntax)?;
    writer.write_all(&bytes)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write a state file to disk, creating parent directories.
pub fn write_path(file: &File, path: &Path) -> Result<(), StateFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let f = std::fs::File::create(path)?;
    write(file, f)
}

// ─── Wire Format ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VersionSniff {
    version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateV4 {
    version: u64,
    #[serde(default)]
    terraform_version: String,
    #[serde(default)]
    serial: u64,
    #[serde(default)]
    lineage: String,
    #[serde(default)]
    outputs: BTreeMap<String, OutputV4>,
    #[serde(default)]
    resources: Vec<ResourceV4>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OutputV4 {
    value: serde_json::Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    value_type: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    sensitive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceV4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module: Option<String>,
    mode: ResourceMode,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    each: Option<EachMode>,
    provider: String,
    #[serde(default)]
    instances: Vec<InstanceV4>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstanceV4 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index_key: Option<InstanceKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<ObjectStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deposed: Option<DeposedKey>,
    #[serde(default)]
    schema_version: u64,
    #[serde(default)]
    attributes: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
}

impl StateV4 {
    fn into_file(self) -> Result<File, StateFileError> {
        let mut resources = Vec::with_capacity(self.resources.len());

        for raw in self.resources {
            let module = match raw.module.as_deref() {
                Some(m) => ModuleInstance::parse(m)
                    .map_err(|e| StateFileError::Invalid(e.to_string()))?,
                None => ModuleInstance::root(),
            };
            let addr = AbsResource {
                module,
                resource: crate::addrs::Resource {
                    mode: raw.mode,
                    type_name: raw.resource_type,
                    name: raw.name,
                },
            };
            let provider = ProviderConfigRef::parse(&raw.provider).map_err(|e| {
                StateFileError::Invalid(format!("resource {}: {}", addr, e))
            })?;

            let mut instances: Vec<ResourceInstance> = Vec::new();
            for inst in raw.instances {
                let pos = match instances.iter().position(|i| i.key == inst.index_key) {
                    Some(pos) => pos,
                    None => {
                        instances.push(ResourceInstance {
                            key: inst.index_key.clone(),
                            ..Default::default()
                        });
                        instances.len() - 1
                    }
                };
                let object = ResourceInstanceObject {
                    schema_version: inst.schema_version,
                    attributes: inst.attributes,
                    status: inst.status.unwrap_or_default(),
                    dependencies: inst.dependencies,
                };
                let target = &mut instances[pos];
                match inst.deposed {
                    Some(key) => {
                        if target.deposed.insert(key.clone(), object).is_some() {
                            return Err(StateFileError::Invalid(format!(
                                "{} has duplicate deposed object {}",
                                addr.instance(inst.index_key),
                                key
                            )));
                        }
                    }
                    None => {
                        if target.current.replace(object).is_some() {
                            return Err(StateFileError::Invalid(format!(
                                "{} has more than one current object",
                                addr.instance(inst.index_key)
                            )));
                        }
                    }
                }
            }

            resources.push(Resource {
                addr,
                each: raw.each.unwrap_or_default(),
                provider,
                instances,
            });
        }

        let outputs = self
            .outputs
            .into_iter()
            .map(|(name, o)| {
                (
                    name,
                    OutputValue {
                        value: o.value,
                        sensitive: o.sensitive,
                    },
                )
            })
            .collect();

        Ok(File {
            tool_version: self.terraform_version,
            serial: self.serial,
            lineage: self.lineage,
            state: State { resources, outputs },
        })
    }

    fn from_file(file: &File) -> Self {
        let resources = file
            .state
            .resources
            .iter()
            .map(|r| {
                let mut instances = Vec::new();
                for inst in &r.instances {
                    let objects = inst
                        .current
                        .iter()
                        .map(|o| (None, o))
                        .chain(inst.deposed.iter().map(|(k, o)| (Some(k.clone()), o)));
                    for (deposed, obj) in objects {
                        instances.push(InstanceV4 {
                            index_key: inst.key.clone(),
                            status: match obj.status {
                                ObjectStatus::Ready => None,
                                ObjectStatus::Tainted => Some(ObjectStatus::Tainted),
                            },
                            deposed,
                            schema_version: obj.schema_version,
                            attributes: obj.attributes.clone(),
                            dependencies: obj.dependencies.clone(),
                        });
                    }
                }
                ResourceV4 {
                    module: (!r.addr.module.is_root()).then(|| r.addr.module.to_string()),
                    mode: r.addr.resource.mode,
                    resource_type: r.addr.resource.type_name.clone(),
                    name: r.addr.resource.name.clone(),
                    each: match r.each {
                        EachMode::NoEach => None,
                        other => Some(other),
                    },
                    provider: r.provider.to_string(),
                    instances,
                }
            })
            .collect();

        let outputs = file
            .state
            .outputs
            .iter()
            .map(|(name, o)| {
                (
                    name.clone(),
                    OutputV4 {
                        value: o.value.clone(),
                        value_type: None,
                        sensitive: o.sensitive,
                    },
                )
            })
            .collect();

        StateV4 {
            version: STATE_VERSION,
            terraform_version: file.tool_version.clone(),
            serial: file.serial,
            lineage: file.lineage.clone(),
            outputs,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 4,
        "terraform_version": "0.1.3",
        "serial": 3,
        "lineage": "abc",
        "outputs": {"ip": {"value": "10.0.0.1", "type": "string"}},
        "resources": [
            {
                "module": "module.web[0]",
                "mode": "managed",
                "type": "aws_instance",
                "name": "app",
                "each": "list",
                "provider": "provider.aws",
                "instances": [
                    {"index_key": 0, "schema_version": 1, "attributes": {"id": "i-1"}},
                    {"index_key": 0, "deposed": "00000001", "schema_version": 1, "attributes": {"id": "i-0"}},
                    {"index_key": 1, "status": "tainted", "schema_version": 1, "attributes": {"id": "i-2"}}
                ]
            }
        ]
    }"#;

    #[test]
    fn reads_instances_and_deposed_objects() {
        let file = read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(file.serial, 3);
        let r = &file.state.resources[0];
        assert_eq!(r.addr.to_string(), "module.web[0].aws_instance.app");
        assert_eq!(r.each, EachMode::List);
        assert_eq!(r.instances.len(), 2);

        let first = &r.instances[0];
        assert_eq!(first.key, Some(InstanceKey::Int(0)));
        assert_eq!(first.current.as_ref().unwrap().attributes["id"], "i-1");
        assert_eq!(first.deposed[&DeposedKey::new("00000001")].attributes["id"], "i-0");

        let second = &r.instances[1];
        assert_eq!(second.current.as_ref().unwrap().status, ObjectStatus::Tainted);
        assert_eq!(file.state.outputs["ip"].value, "10.0.0.1");
    }

    #[test]
    fn rejects_other_versions() {
        let err = read(r#"{"version": 3, "modules": []}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, StateFileError::UnsupportedVersion(3)));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(read("  \n".as_bytes()), Err(StateFileError::Empty)));
        assert!(matches!(read("PK\x03\x04".as_bytes()), Err(StateFileError::Syntax(_))));
    }

    #[test]
    fn rejects_two_current_objects() {
        let doc = r#"{"version": 4, "resources": [{
            "mode": "managed", "type": "null_resource", "name": "a", "provider": "provider.null",
            "instances": [{"attributes": {}}, {"attributes": {}}]
        }]}"#;
        assert!(matches!(read(doc.as_bytes()), Err(StateFileError::Invalid(_))));
    }

    #[test]
    fn write_then_read_preserves_state() {
        let file = read(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write(&file, &mut buf).unwrap();
        let again = read(buf.as_slice()).unwrap();
        assert_eq!(again, file);
    }
}
