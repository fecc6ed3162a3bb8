//! Saved plan files.
//!
//! A plan file is a zip archive with two entries:
//!
//!   tfplan   - the plan body, msgpack with named fields
//!   tfstate  - the prior state snapshot the plan was computed against
//!
//! Attribute values inside `tfplan` are themselves msgpack-encoded dynamic
//! values (see [`Value::decode_msgpack`]), so unknowns survive the round trip.

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::values::ValueError;
use super::{Action, Change, Changes, OutputChange, Plan, ResourceInstanceChange, Value};
use crate::addrs::{AbsResourceInstance, InstanceKey, ModuleInstance, Resource, ResourceMode};
use crate::provider::ProviderConfigRef;
use crate::state::models::DeposedKey;
use crate::state::statefile::{self, StateFileError};

/// Format version of the `tfplan` entry.
pub const PLAN_VERSION: u64 = 1;

const PLAN_ENTRY: &str = "tfplan";
const STATE_ENTRY: &str = "tfstate";

#[derive(Debug, thiserror::Error)]
pub enum PlanFileError {
    #[error("failed to read plan file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a plan file: {message}", path.display())]
    NotAPlan { path: PathBuf, message: String },

    #[error("plan file has no {0} entry")]
    MissingEntry(&'static str),

    #[error("plan file format version {0} is not supported; only version {PLAN_VERSION} can be read")]
    UnsupportedVersion(u64),

    #[error("failed to decode plan: {0}")]
    Decode(String),

    #[error("failed to encode plan: {0}")]
    Encode(String),

    #[error("invalid value in plan: {0}")]
    Value(#[from] ValueError),

    #[error("failed to read prior state from plan: {0}")]
    State(#[from] StateFileError),
}

/// An open plan file.
pub struct Reader {
    path: PathBuf,
    archive: zip::ZipArchive<std::fs::File>,
}

impl Reader {
    /// Open a plan file. Fails with [`PlanFileError::NotAPlan`] when the file
    /// exists but is not a plan archive.
    pub fn open(path: &Path) -> Result<Self, PlanFileError> {
        let file = std::fs::File::open(path).map_err(|source| PlanFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = zip::ZipArchive::new(file).map_err(|e| PlanFileError::NotAPlan {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let reader = Self {
            path: path.to_path_buf(),
            archive,
        };
        if reader.archive.index_for_name(PLAN_ENTRY).is_none() {
            return Err(PlanFileError::NotAPlan {
                path: path.to_path_buf(),
                message: format!("archive has no {} entry", PLAN_ENTRY),
            });
        }
        Ok(reader)
    }

    /// Decode the plan body.
    pub fn read_plan(&mut self) -> Result<Plan, PlanFileError> {
        let bytes = self.read_entry(PLAN_ENTRY)?;

        let sniff: VersionSniff =
            rmp_serde::from_slice(&bytes).map_err(|e| PlanFileError::Decode(e.to_string()))?;
        if sniff.version != PLAN_VERSION {
            return Err(PlanFileError::UnsupportedVersion(sniff.version));
        }

        let raw: PlanV1 =
            rmp_serde::from_slice(&bytes).map_err(|e| PlanFileError::Decode(e.to_string()))?;
        let plan = raw.into_plan()?;
        debug!(
            resources = plan.changes.resources.len(),
            outputs = plan.changes.outputs.len(),
            "Read plan from {}",
            self.path.display()
        );
        Ok(plan)
    }

    /// Decode the prior state snapshot embedded in the plan.
    pub fn read_prior_state(&mut self) -> Result<statefile::File, PlanFileError> {
        let bytes = self.read_entry(STATE_ENTRY)?;
        Ok(statefile::read(&bytes[..])?)
    }

    fn read_entry(&mut self, name: &'static str) -> Result<Vec<u8>, PlanFileError> {
        let mut entry = self.archive.by_name(name).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => PlanFileError::MissingEntry(name),
            other => PlanFileError::NotAPlan {
                path: self.path.clone(),
                message: other.to_string(),
            },
        })?;
        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .map_err(|source| PlanFileError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(buf)
    }
}

/// Write a plan file containing `plan` and the `prior_state` it was computed
/// against.
pub fn create(path: &Path, plan: &Plan, prior_state: &statefile::File) -> Result<(), PlanFileError> {
    let io_err = |source| PlanFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let file = std::fs::File::create(path).map_err(io_err)?;
    write(file, plan, prior_state)
}

/// Write a plan archive to any seekable writer.
pub fn write<W: Write + Seek>(
    writer: W,
    plan: &Plan,
    prior_state: &statefile::File,
) -> Result<(), PlanFileError> {
    let body = rmp_serde::to_vec_named(&PlanV1::from_plan(plan)?)
        .map_err(|e| PlanFileError::Encode(e.to_string()))?;
    let mut state = Vec::new();
    statefile::write(prior_state, &mut state)?;

    let zip_err = |e: zip::result::ZipError| PlanFileError::Encode(e.to_string());
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut zip = zip::ZipWriter::new(writer);
    zip.start_file(PLAN_ENTRY, options).map_err(zip_err)?;
    zip.write_all(&body)
        .map_err(|e| PlanFileError::Encode(e.to_string()))?;
    zip.start_file(STATE_ENTRY, options).map_err(zip_err)?;
    zip.write_all(&state)
        .map_err(|e| PlanFileError::Encode(e.to_string()))?;
    zip.finish().map_err(zip_err)?;
    Ok(())
}

// ─── Wire Format ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VersionSniff {
    version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanV1 {
    version: u64,
    tool_version: String,
    #[serde(default)]
    variables: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    resource_changes: Vec<ResourceChangeV1>,
    #[serde(default)]
    output_changes: Vec<OutputChangeV1>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceChangeV1 {
    /// Module instance path; empty for the root module.
    #[serde(default)]
    module: String,
    mode: ResourceMode,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    index_key: Option<InstanceKey>,
    #[serde(default)]
    deposed: Option<DeposedKey>,
    provider: String,
    action: Action,
    #[serde(default)]
    before: Option<Vec<u8>>,
    #[serde(default)]
    after: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OutputChangeV1 {
    name: String,
    #[serde(default)]
    sensitive: bool,
    action: Action,
    #[serde(default)]
    before: Option<Vec<u8>>,
    #[serde(default)]
    after: Option<Vec<u8>>,
}

fn decode_opt(bytes: Option<Vec<u8>>) -> Result<Option<Value>, ValueError> {
    bytes.map(|b| Value::decode_msgpack(&b)).transpose()
}

fn encode_opt(value: &Option<Value>) -> Result<Option<Vec<u8>>, ValueError> {
    value.as_ref().map(Value::encode_msgpack).transpose()
}

impl PlanV1 {
    fn into_plan(self) -> Result<Plan, PlanFileError> {
        let variables = self
            .variables
            .into_iter()
            .map(|(name, bytes)| Ok((name, Value::decode_msgpack(&bytes)?)))
            .collect::<Result<BTreeMap<_, _>, ValueError>>()?;

        let mut resources = Vec::with_capacity(self.resource_changes.len());
        for rc in self.resource_changes {
            let module = if rc.module.is_empty() {
                ModuleInstance::root()
            } else {
                ModuleInstance::parse(&rc.module)
                    .map_err(|e| PlanFileError::Decode(e.to_string()))?
            };
            let resource = Resource {
                mode: rc.mode,
                type_name: rc.resource_type,
                name: rc.name,
            };
            let addr = AbsResourceInstance::new(module, resource, rc.index_key);
            let provider = ProviderConfigRef::parse(&rc.provider)
                .map_err(|e| PlanFileError::Decode(format!("{}: {}", addr, e)))?;
            resources.push(ResourceInstanceChange {
                addr,
                deposed_key: rc.deposed,
                provider,
                change: Change::new(rc.action, decode_opt(rc.before)?, decode_opt(rc.after)?),
            });
        }

        let outputs = self
            .output_changes
            .into_iter()
            .map(|oc| {
                Ok(OutputChange {
                    name: oc.name,
                    sensitive: oc.sensitive,
                    change: Change::new(oc.action, decode_opt(oc.before)?, decode_opt(oc.after)?),
                })
            })
            .collect::<Result<Vec<_>, ValueError>>()?;

        Ok(Plan {
            tool_version: self.tool_version,
            variables,
            changes: Changes { resources, outputs },
        })
    }

    fn from_plan(plan: &Plan) -> Result<Self, ValueError> {
        let variables = plan
            .variables
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.encode_msgpack()?)))
            .collect::<Result<BTreeMap<_, _>, ValueError>>()?;

        let resource_changes = plan
            .changes
            .resources
            .iter()
            .map(|rc| {
                Ok(ResourceChangeV1 {
                    module: if rc.addr.module.is_root() {
                        String::new()
                    } else {
                        rc.addr.module.to_string()
                    },
                    mode: rc.addr.resource.mode,
                    resource_type: rc.addr.resource.type_name.clone(),
                    name: rc.addr.resource.name.clone(),
                    index_key: rc.addr.key.clone(),
                    deposed: rc.deposed_key.clone(),
                    provider: rc.provider.to_string(),
                    action: rc.change.action,
                    before: encode_opt(&rc.change.before)?,
                    after: encode_opt(&rc.change.after)?,
                })
            })
            .collect::<Result<Vec<_>, ValueError>>()?;

        let output_changes = plan
            .changes
            .outputs
            .iter()
            .map(|oc| {
                Ok(OutputChangeV1 {
                    name: oc.name.clone(),
                    sensitive: oc.sensitive,
                    action: oc.change.action,
                    before: encode_opt(&oc.change.before)?,
                    after: encode_opt(&oc.change.after)?,
                })
            })
            .collect::<Result<Vec<_>, ValueError>>()?;

        Ok(Self {
            version: PLAN_VERSION,
            tool_version: plan.tool_version.clone(),
            variables,
            resource_changes,
            output_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::State;

    fn sample_plan() -> Plan {
        let mut after = BTreeMap::new();
        after.insert("ami".to_string(), Value::String("ami-1".to_string()));
        after.insert("id".to_string(), Value::Unknown);

        Plan {
            tool_version: "0.1.3".to_string(),
            variables: BTreeMap::from([("region".to_string(), Value::String("eu-west-1".into()))]),
            changes: Changes {
                resources: vec![ResourceInstanceChange {
                    addr: AbsResourceInstance::new(
                        ModuleInstance::root().child("web", None),
                        Resource::managed("aws_instance", "this"),
                        Some(InstanceKey::Int(1)),
                    ),
                    deposed_key: Some(DeposedKey::new("00000001")),
                    provider: ProviderConfigRef::local("aws", Some("west")),
                    change: Change::new(Action::Create, None, Some(Value::Map(after))),
                }],
                outputs: vec![OutputChange {
                    name: "ip".to_string(),
                    sensitive: true,
                    change: Change::new(Action::Create, None, Some(Value::Unknown)),
                }],
            },
        }
    }

    #[test]
    fn plan_file_preserves_unknowns_and_addresses() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.tfplan");
        let prior = statefile::File::new(State::default());
        create(&path, &sample_plan(), &prior).unwrap();

        let mut reader = Reader::open(&path).unwrap();
        let plan = reader.read_plan().unwrap();
        let rc = &plan.changes.resources[0];
        assert_eq!(rc.addr.to_string(), "module.web.aws_instance.this[1]");
        assert_eq!(rc.deposed_key, Some(DeposedKey::new("00000001")));
        assert_eq!(rc.provider.alias.as_deref(), Some("west"));
        let after = rc.change.after.as_ref().unwrap();
        assert_eq!(after.as_map().and_then(|m| m.get("id")), Some(&Value::Unknown));
        assert!(plan.changes.outputs[0].sensitive);
        assert_eq!(plan.variables["region"], Value::String("eu-west-1".into()));

        let state = reader.read_prior_state().unwrap();
        assert_eq!(state.lineage, prior.lineage);
    }

    #[test]
    fn quoted_module_keys_survive_the_plan_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("keys.tfplan");
        let mut plan = sample_plan();
        let module = ModuleInstance::root().child("web", Some(InstanceKey::Str("a\"]b".to_string())));
        plan.changes.resources[0].addr.module = module.clone();
        create(&path, &plan, &statefile::File::new(State::default())).unwrap();

        let read = Reader::open(&path).unwrap().read_plan().unwrap();
        assert_eq!(read.changes.resources[0].addr.module, module);
    }

    #[test]
    fn json_file_is_not_a_plan() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("terraform.tfstate");
        std::fs::write(&path, r#"{"version": 4}"#).unwrap();
        assert!(matches!(
            Reader::open(&path),
            Err(PlanFileError::NotAPlan { .. })
        ));
    }

    #[test]
    fn rejects_future_plan_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("future.tfplan");
        let mut raw = PlanV1::from_plan(&Plan::default()).unwrap();
        raw.version = 2;

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(PLAN_ENTRY, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&rmp_serde::to_vec_named(&raw).unwrap()).unwrap();
        zip.finish().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        assert!(matches!(
            reader.read_plan(),
            Err(PlanFileError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            reader.read_prior_state(),
            Err(PlanFileError::MissingEntry("tfstate"))
        ));
    }
}
