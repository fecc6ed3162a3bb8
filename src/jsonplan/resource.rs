use serde::{Deserialize, Serialize};

use crate::addrs::{AbsResourceInstance, InstanceKey, ResourceMode};
use crate::plans::Change as PlanChange;

/// One resource instance object as it exists in the prior state or will exist
/// after apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Absolute instance address, including module path and instance key.
    pub address: String,
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    /// Instance key; absent for resources without `count` or `for_each`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<InstanceKey>,
    /// Fully-qualified provider address.
    pub provider_name: String,
    pub schema_version: u64,
    /// Attribute values. Unknown values are `null`.
    #[serde(default)]
    pub values: serde_json::Value,
    /// Set only for deposed objects in the prior state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposed_key: Option<String>,
}

impl Resource {
    pub fn new(
        addr: &AbsResourceInstance,
        provider_name: String,
        schema_version: u64,
        values: serde_json::Value,
    ) -> Self {
        Self {
            address: addr.to_string(),
            mode: addr.resource.mode,
            type_name: addr.resource.type_name.clone(),
            name: addr.resource.name.clone(),
            index: addr.key.clone(),
            provider_name,
            schema_version,
            values,
            deposed_key: None,
        }
    }
}

/// A planned change to one resource instance object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    /// Module instance address; absent for the root module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_address: Option<String>,
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<InstanceKey>,
    /// `true` when the change targets a deposed object rather than the
    /// current one. Never serialised as `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposed: Option<bool>,
    pub provider_name: String,
    pub change: Change,
}

impl ResourceChange {
    pub fn new(
        addr: &AbsResourceInstance,
        deposed: bool,
        provider_name: String,
        change: &PlanChange,
    ) -> Self {
        Self {
            address: addr.to_string(),
            module_address: (!addr.module.is_root()).then(|| addr.module.to_string()),
            mode: addr.resource.mode,
            type_name: addr.resource.type_name.clone(),
            name: addr.resource.name.clone(),
            index: addr.key.clone(),
            deposed: deposed.then_some(true),
            provider_name,
            change: Change::from_plan(change),
        }
    }

    pub fn is_deposed(&self) -> bool {
        self.deposed.unwrap_or(false)
    }
}

/// Before/after pair of a change. Absent sides are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub actions: Vec<String>,
    #[serde(default)]
    pub before: serde_json::Value,
    #[serde(default)]
    pub after: serde_json::Value,
}

impl Change {
    pub fn from_plan(change: &PlanChange) -> Self {
        let project = |v: &Option<crate::plans::Value>| {
            v.as_ref()
                .map(|v| v.to_json())
                .unwrap_or(serde_json::Value::Null)
        };
        Self {
            actions: change
                .action
                .json_actions()
                .iter()
                .map(|a| a.to_string())
                .collect(),
            before: project(&change.before),
            after: project(&change.after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrs::{ModuleInstance, Resource as ResourceAddr};
    use crate::plans::{Action, Value};
    use serde_json::json;

    fn addr(key: Option<InstanceKey>) -> AbsResourceInstance {
        AbsResourceInstance::new(
            ModuleInstance::root().child("net", Some(InstanceKey::Int(0))),
            ResourceAddr::managed("aws_subnet", "a"),
            key,
        )
    }

    #[test]
    fn optional_fields_are_omitted() {
        let change = PlanChange::new(Action::Create, None, Some(Value::Null));
        let rc = ResourceChange::new(&addr(None), false, "p".to_string(), &change);
        let json = serde_json::to_value(&rc).unwrap();
        assert!(json.get("index").is_none());
        assert!(json.get("deposed").is_none());
        assert_eq!(json["module_address"], "module.net[0]");
        assert_eq!(json["address"], "module.net[0].aws_subnet.a");
        assert_eq!(json["change"]["before"], serde_json::Value::Null);
    }

    #[test]
    fn zero_index_is_present() {
        let change = PlanChange::new(Action::Delete, Some(Value::Null), None);
        let rc = ResourceChange::new(&addr(Some(InstanceKey::Int(0))), true, "p".to_string(), &change);
        let json = serde_json::to_value(&rc).unwrap();
        assert_eq!(json["index"], json!(0));
        assert_eq!(json["deposed"], json!(true));
        assert_eq!(json["change"]["actions"], json!(["delete"]));
    }

    #[test]
    fn string_index_and_snapshot_fields() {
        let snapshot = Resource::new(
            &addr(Some(InstanceKey::Str("x".to_string()))),
            "registry.terraform.io/hashicorp/aws".to_string(),
            2,
            json!({"cidr": "10.0.0.0/24"}),
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["index"], json!("x"));
        assert_eq!(json["address"], r#"module.net[0].aws_subnet.a["x"]"#);
        assert_eq!(json["type"], "aws_subnet");
        assert_eq!(json["mode"], "managed");
        assert!(json.get("deposed_key").is_none());
    }
}
