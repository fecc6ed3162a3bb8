use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::addrs::{AbsResource, AbsResourceInstance, InstanceKey};
use crate::provider::ProviderConfigRef;

// ─── Top-Level State ────────────────────────────────────────────────────────

/// The last-known inventory of resources and root output values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub resources: Vec<Resource>,
    pub outputs: BTreeMap<String, OutputValue>,
}

impl State {
    /// True when the state holds no resource objects and no outputs.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
            && self
                .resources
                .iter()
                .all(|r| r.instances.iter().all(ResourceInstance::has_no_objects))
    }

    /// Iterate over every instance with its absolute address.
    pub fn instances(&self) -> impl Iterator<Item = (AbsResourceInstance, &Resource, &ResourceInstance)> {
        self.resources.iter().flat_map(|r| {
            r.instances
                .iter()
                .map(move |i| (r.addr.instance(i.key.clone()), r, i))
        })
    }
}

// ─── Resources ──────────────────────────────────────────────────────────────

/// How a resource is repeated, as recorded in state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EachMode {
    #[default]
    NoEach,
    List,
    Map,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub addr: AbsResource,
    pub each: EachMode,
    pub provider: ProviderConfigRef,
    pub instances: Vec<ResourceInstance>,
}

/// One instance of a resource: at most one current object plus any number
/// of deposed objects left over from create-before-destroy replacements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceInstance {
    pub key: Option<InstanceKey>,
    pub current: Option<ResourceInstanceObject>,
    pub deposed: BTreeMap<DeposedKey, ResourceInstanceObject>,
}

impl ResourceInstance {
    pub fn has_no_objects(&self) -> bool {
        self.current.is_none() && self.deposed.is_empty()
    }
}

/// Object status values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStatus {
    #[default]
    Ready,
    Tainted,
}

/// The stored attribute values of one remote object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstanceObject {
    /// Schema version the attributes were written with.
    pub schema_version: u64,
    pub attributes: serde_json::Value,
    pub status: ObjectStatus,
    pub dependencies: Vec<String>,
}

impl ResourceInstanceObject {
    pub fn new(schema_version: u64, attributes: serde_json::Value) -> Self {
        Self {
            schema_version,
            attributes,
            status: ObjectStatus::Ready,
            dependencies: vec![],
        }
    }
}

/// Identifies a deposed object within its resource instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeposedKey(pub String);

impl DeposedKey {
    pub fn new(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for DeposedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Outputs ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OutputValue {
    pub value: serde_json::Value,
    pub sensitive: bool,
}
