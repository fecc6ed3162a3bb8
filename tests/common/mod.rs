#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use oxid_show::addrs::{AbsResource, AbsResourceInstance, InstanceKey, ModuleInstance, Resource};
use oxid_show::plans::{planfile, Action, Change, Changes, OutputChange, Plan, ResourceInstanceChange, Value};
use oxid_show::provider::schemas::Schemas;
use oxid_show::provider::ProviderConfigRef;
use oxid_show::state::models::{
    self, DeposedKey, EachMode, OutputValue, ResourceInstance, ResourceInstanceObject, State,
};
use oxid_show::state::statefile;
use serde_json::json;

/// Root module requiring the null provider and a custom provider used by the
/// `net` child module.
pub const MAIN_TF: &str = r#"
terraform {
  required_providers {
    null = {
      source = "hashicorp/null"
    }
  }
}

resource "null_resource" "single" {}

resource "null_resource" "counted" {
  count = 2
}

module "net" {
  source = "./modules/net"
}
"#;

pub const NET_TF: &str = r#"
terraform {
  required_providers {
    cloud = {
      source = "example.com/acme/cloud"
    }
  }
}

resource "cloud_subnet" "a" {
  for_each = toset(["x"])
}
"#;

/// Provider schema cache covering every resource type in the fixtures.
pub const SCHEMAS_JSON: &str = r#"{
  "format_version": "1.0",
  "provider_schemas": {
    "registry.terraform.io/hashicorp/null": {
      "resource_schemas": {
        "null_resource": {
          "version": 0,
          "block": {
            "attributes": {
              "id": {"type": "string", "computed": true},
              "triggers": {"type": ["map", "string"], "optional": true}
            }
          }
        }
      }
    },
    "example.com/acme/cloud": {
      "resource_schemas": {
        "cloud_subnet": {
          "version": 3,
          "block": {
            "attributes": {
              "cidr": {"type": "string", "required": true},
              "secret": {"type": "string", "optional": true, "sensitive": true}
            }
          }
        }
      }
    }
  }
}"#;

/// Lay out a configuration directory and a working directory with a schema
/// cache. Returns (config_dir, working_dir).
pub fn write_workspace(root: &Path) -> (PathBuf, PathBuf) {
    let config_dir = root.join("infra");
    let net_dir = config_dir.join("modules").join("net");
    std::fs::create_dir_all(&net_dir).unwrap();
    std::fs::write(config_dir.join("main.tf"), MAIN_TF).unwrap();
    std::fs::write(net_dir.join("main.tf"), NET_TF).unwrap();

    let working_dir = root.join(".oxid");
    let cache = Schemas::cache_path(&working_dir);
    std::fs::create_dir_all(cache.parent().unwrap()).unwrap();
    std::fs::write(&cache, SCHEMAS_JSON).unwrap();

    (config_dir, working_dir)
}

pub fn fixture_schemas() -> Schemas {
    Schemas::from_json(SCHEMAS_JSON).unwrap()
}

pub fn net_module() -> ModuleInstance {
    ModuleInstance::root().child("net", None)
}

fn obj(pairs: &[(&str, Value)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

pub fn change(
    module: ModuleInstance,
    resource: Resource,
    key: Option<InstanceKey>,
    provider: &str,
    action: Action,
    before: Option<Value>,
    after: Option<Value>,
) -> ResourceInstanceChange {
    ResourceInstanceChange {
        addr: AbsResourceInstance::new(module, resource, key),
        deposed_key: None,
        provider: ProviderConfigRef::local(provider, None),
        change: Change::new(action, before, after),
    }
}

/// A plan touching every interesting shape: a singleton create with an
/// unknown attribute, a counted update, a deposed delete and a for_each
/// resource in a child module.
pub fn sample_plan() -> Plan {
    let mut deposed = change(
        ModuleInstance::root(),
        Resource::managed("null_resource", "counted"),
        Some(InstanceKey::Int(0)),
        "null",
        Action::Delete,
        Some(obj(&[("id", s("old-0"))])),
        None,
    );
    deposed.deposed_key = Some(DeposedKey::new("00000001"));

    Plan {
        tool_version: "0.1.3".to_string(),
        variables: BTreeMap::from([("env".to_string(), s("dev"))]),
        changes: Changes {
            resources: vec![
                change(
                    net_module(),
                    Resource::managed("cloud_subnet", "a"),
                    Some(InstanceKey::Str("x".to_string())),
                    "cloud",
                    Action::Create,
                    None,
                    Some(obj(&[("cidr", s("10.0.1.0/24")), ("secret", s("hunter2"))])),
                ),
                change(
                    ModuleInstance::root(),
                    Resource::managed("null_resource", "single"),
                    None,
                    "null",
                    Action::Create,
                    None,
                    Some(obj(&[("id", Value::Unknown), ("triggers", Value::Null)])),
                ),
                deposed,
                change(
                    ModuleInstance::root(),
                    Resource::managed("null_resource", "counted"),
                    Some(InstanceKey::Int(0)),
                    "null",
                    Action::Update,
                    Some(obj(&[("id", s("c-0")), ("triggers", obj(&[("v", s("1"))]))])),
                    Some(obj(&[("id", s("c-0")), ("triggers", obj(&[("v", s("2"))]))])),
                ),
            ],
            outputs: vec![OutputChange {
                name: "single_id".to_string(),
                sensitive: false,
                change: Change::new(Action::Create, None, Some(Value::Unknown)),
            }],
        },
    }
}

/// The state `sample_plan` was computed against.
pub fn sample_prior_state() -> State {
    let mut deposed = BTreeMap::new();
    deposed.insert(
        DeposedKey::new("00000001"),
        ResourceInstanceObject::new(0, json!({"id": "old-0"})),
    );

    State {
        resources: vec![models::Resource {
            addr: AbsResource {
                module: ModuleInstance::root(),
                resource: Resource::managed("null_resource", "counted"),
            },
            each: EachMode::List,
            provider: ProviderConfigRef::parse(r#"provider["registry.terraform.io/hashicorp/null"]"#)
                .unwrap(),
            instances: vec![ResourceInstance {
                key: Some(InstanceKey::Int(0)),
                current: Some(ResourceInstanceObject::new(
                    0,
                    json!({"id": "c-0", "triggers": {"v": "1"}}),
                )),
                deposed,
            }],
        }],
        outputs: BTreeMap::from([(
            "counted_id".to_string(),
            OutputValue {
                value: json!("c-0"),
                sensitive: false,
            },
        )]),
    }
}

pub fn write_plan(dir: &Path, plan: &Plan, prior: &State) -> PathBuf {
    let path = dir.join("saved.tfplan");
    planfile::create(&path, plan, &statefile::File::new(prior.clone())).unwrap();
    path
}

pub fn write_state(dir: &Path, state: &State) -> PathBuf {
    let path = dir.join("terraform.tfstate");
    statefile::write_path(&statefile::File::new(state.clone()), &path).unwrap();
    path
}
