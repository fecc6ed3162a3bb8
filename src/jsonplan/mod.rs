//! Machine-readable plan document.
//!
//! The document is a stable, versioned projection of a plan and the prior
//! state it was computed against. Bumping [`FORMAT_VERSION`] is required for
//! any incompatible change, including how unknown values are represented.

pub mod resource;
pub mod values;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::addrs::{AbsResourceInstance, ModuleInstance};
use crate::config::Config;
use crate::plans::{Action, Plan};
use crate::provider::schemas::{ResourceTypeSchema, Schemas};
use crate::provider::{ProviderAddrError, ProviderConfigRef};
use crate::state::models::State;

pub use resource::{Change, Resource, ResourceChange};
pub use values::{Module, Output, StateValues};

/// Version of the plan document format.
pub const FORMAT_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub format_version: u64,
    #[serde(default)]
    pub tool_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default)]
    pub planned_values: StateValues,
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_changes: BTreeMap<String, Change>,
    #[serde(default)]
    pub prior_state: StateValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no schema for {address} from provider {provider}; the provider schema cache may be out of date")]
    UnresolvableProvider { address: String, provider: String },

    #[error("invalid provider for {address}: {source}")]
    InvalidProvider {
        address: String,
        #[source]
        source: ProviderAddrError,
    },

    #[error("plan contains more than one change for {0}")]
    DuplicateAddress(String),

    #[error("failed to serialise plan document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("plan document is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("unsupported plan document format_version {0}; expected {FORMAT_VERSION}")]
    UnsupportedFormatVersion(String),
}

/// Build the plan document.
///
/// Actions and values are taken from the plan as-is. Every resource must
/// resolve to a provider with a known schema for its type; the first one that
/// does not aborts the whole encode.
pub fn marshal(
    config: &Config,
    plan: &Plan,
    prior_state: &State,
    schemas: &Schemas,
) -> Result<PlanDocument, EncodeError> {
    let resolver = Resolver { config, schemas };

    let resource_changes = marshal_resource_changes(&resolver, plan)?;
    let planned_values = marshal_planned_values(&resolver, plan)?;
    let prior_state = marshal_prior_state(&resolver, prior_state)?;

    let variables = plan
        .variables
        .iter()
        .map(|(name, value)| {
            (
                name.clone(),
                Variable {
                    value: value.to_json(),
                },
            )
        })
        .collect();

    let output_changes = plan
        .changes
        .outputs
        .iter()
        .map(|oc| (oc.name.clone(), Change::from_plan(&oc.change)))
        .collect();

    debug!(
        changes = resource_changes.len(),
        "Encoded plan document"
    );

    Ok(PlanDocument {
        format_version: FORMAT_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        variables,
        planned_values,
        resource_changes,
        output_changes,
        prior_state,
    })
}

/// [`marshal`] and serialise to compact JSON. Equal inputs give identical
/// bytes.
pub fn marshal_to_vec(
    config: &Config,
    plan: &Plan,
    prior_state: &State,
    schemas: &Schemas,
) -> Result<Vec<u8>, EncodeError> {
    let doc = marshal(config, plan, prior_state, schemas)?;
    Ok(serde_json::to_vec(&doc)?)
}

/// Parse a plan document, rejecting any format version other than
/// [`FORMAT_VERSION`].
pub fn parse_document(bytes: &[u8]) -> Result<PlanDocument, DocumentError> {
    #[derive(Deserialize)]
    struct Sniff {
        #[serde(default)]
        format_version: serde_json::Value,
    }

    let sniff: Sniff = serde_json::from_slice(bytes)?;
    if sniff.format_version.as_u64() != Some(FORMAT_VERSION) {
        return Err(DocumentError::UnsupportedFormatVersion(
            sniff.format_version.to_string(),
        ));
    }
    Ok(serde_json::from_slice(bytes)?)
}

// ─── Provider resolution ────────────────────────────────────────────────────

struct Resolver<'a> {
    config: &'a Config,
    schemas: &'a Schemas,
}

impl Resolver<'_> {
    /// Resolve the provider FQN and resource type schema for an object.
    fn resolve(
        &self,
        addr: &AbsResourceInstance,
        provider: &ProviderConfigRef,
    ) -> Result<(String, &ResourceTypeSchema), EncodeError> {
        let fqn = self
            .config
            .resolve_provider(&addr.module, provider)
            .map_err(|source| EncodeError::InvalidProvider {
                address: addr.to_string(),
                source,
            })?;
        let schema = self
            .schemas
            .resource_type(&fqn, addr.resource.mode, &addr.resource.type_name)
            .ok_or_else(|| EncodeError::UnresolvableProvider {
                address: addr.to_string(),
                provider: fqn.to_string(),
            })?;
        Ok((fqn.to_string(), schema))
    }
}

fn marshal_resource_changes(
    resolver: &Resolver<'_>,
    plan: &Plan,
) -> Result<Vec<ResourceChange>, EncodeError> {
    let mut seen = BTreeSet::new();
    let mut changes = Vec::with_capacity(plan.changes.resources.len());

    for rc in &plan.changes.resources {
        let address = rc.addr.to_string();
        if !seen.insert((address.clone(), rc.deposed_key.clone())) {
            let what = match rc.deposed_key {
                Some(ref key) => format!("{} deposed object {}", address, key),
                None => address,
            };
            return Err(EncodeError::DuplicateAddress(what));
        }

        let (provider_name, _) = resolver.resolve(&rc.addr, &rc.provider)?;
        let change =
            ResourceChange::new(&rc.addr, rc.deposed_key.is_some(), provider_name, &rc.change);
        changes.push((rc.deposed_key.clone(), change));
    }

    // Current object first, then deposed objects by key.
    changes.sort_by(|(ka, a), (kb, b)| (&a.address, ka).cmp(&(&b.address, kb)));
    Ok(changes.into_iter().map(|(_, c)| c).collect())
}

/// Resources as they will be after apply: every current-object change that
/// leaves an object behind.
fn marshal_planned_values(resolver: &Resolver<'_>, plan: &Plan) -> Result<StateValues, EncodeError> {
    let mut resources = Vec::new();
    for rc in &plan.changes.resources {
        if rc.deposed_key.is_some() || rc.change.action == Action::Delete {
            continue;
        }
        let Some(ref after) = rc.change.after else {
            continue;
        };
        let (provider_name, schema) = resolver.resolve(&rc.addr, &rc.provider)?;
        resources.push((
            rc.addr.module.clone(),
            Resource::new(&rc.addr, provider_name, schema.version, after.to_json()),
        ));
    }

    let outputs = plan
        .changes
        .outputs
        .iter()
        .filter(|oc| oc.change.action != Action::Delete)
        .map(|oc| {
            (
                oc.name.clone(),
                Output {
                    sensitive: oc.sensitive,
                    value: oc
                        .change
                        .after
                        .as_ref()
                        .map(|v| v.to_json())
                        .unwrap_or(serde_json::Value::Null),
                },
            )
        })
        .collect();

    Ok(StateValues {
        outputs,
        root_module: values::build_module_tree(resources),
    })
}

/// Snapshot every object in the prior state. Schema versions are the ones
/// recorded on the stored objects.
fn marshal_prior_state(resolver: &Resolver<'_>, state: &State) -> Result<StateValues, EncodeError> {
    let mut resources: Vec<(ModuleInstance, Resource)> = Vec::new();

    for (addr, resource, instance) in state.instances() {
        if instance.has_no_objects() {
            continue;
        }
        let (provider_name, _) = resolver.resolve(&addr, &resource.provider)?;

        if let Some(ref current) = instance.current {
            resources.push((
                addr.module.clone(),
                Resource::new(
                    &addr,
                    provider_name.clone(),
                    current.schema_version,
                    current.attributes.clone(),
                ),
            ));
        }
        for (key, object) in &instance.deposed {
            let mut snapshot = Resource::new(
                &addr,
                provider_name.clone(),
                object.schema_version,
                object.attributes.clone(),
            );
            snapshot.deposed_key = Some(key.to_string());
            resources.push((addr.module.clone(), snapshot));
        }
    }

    let outputs = state
        .outputs
        .iter()
        .map(|(name, o)| {
            (
                name.clone(),
                Output {
                    sensitive: o.sensitive,
                    value: o.value.clone(),
                },
            )
        })
        .collect();

    Ok(StateValues {
        outputs,
        root_module: values::build_module_tree(resources),
    })
}
