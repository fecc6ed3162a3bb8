use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resource::Resource;
use crate::addrs::ModuleInstance;

/// Resources and root outputs at one point in time: either the prior state or
/// the planned values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateValues {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
    #[serde(default)]
    pub root_module: Module,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub sensitive: bool,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// One module instance in the tree. The root module has no address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub child_modules: Vec<Module>,
}

/// Arrange flat resource snapshots into the module tree.
///
/// Intermediate modules without resources of their own still appear so the
/// tree stays connected. Resources and children are sorted by address.
pub fn build_module_tree(resources: Vec<(ModuleInstance, Resource)>) -> Module {
    let mut by_module: BTreeMap<ModuleInstance, Vec<Resource>> = BTreeMap::new();
    by_module.entry(ModuleInstance::root()).or_default();

    for (module, resource) in resources {
        let mut ancestor = module.parent();
        while let Some(m) = ancestor {
            ancestor = m.parent();
            by_module.entry(m).or_default();
        }
        by_module.entry(module).or_default().push(resource);
    }

    build_module(&ModuleInstance::root(), &mut by_module)
}

fn build_module(
    module: &ModuleInstance,
    by_module: &mut BTreeMap<ModuleInstance, Vec<Resource>>,
) -> Module {
    let mut resources = by_module.remove(module).unwrap_or_default();
    resources.sort_by(|a, b| {
        (a.address.as_str(), a.deposed_key.as_deref())
            .cmp(&(b.address.as_str(), b.deposed_key.as_deref()))
    });

    let children: Vec<ModuleInstance> = by_module
        .keys()
        .filter(|m| m.parent().as_ref() == Some(module))
        .cloned()
        .collect();
    let mut child_modules: Vec<Module> = children
        .iter()
        .map(|child| build_module(child, by_module))
        .collect();
    child_modules.sort_by(|a, b| a.address.cmp(&b.address));

    Module {
        address: (!module.is_root()).then(|| module.to_string()),
        resources,
        child_modules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrs::{AbsResourceInstance, InstanceKey, Resource as ResourceAddr};

    fn snapshot(module: &ModuleInstance, name: &str) -> (ModuleInstance, Resource) {
        let addr = AbsResourceInstance::new(
            module.clone(),
            ResourceAddr::managed("null_resource", name),
            None,
        );
        (
            module.clone(),
            Resource::new(&addr, "p".to_string(), 0, serde_json::json!({})),
        )
    }

    #[test]
    fn nests_modules_and_fills_gaps() {
        let root = ModuleInstance::root();
        let deep = root
            .child("a", None)
            .child("b", Some(InstanceKey::Str("k".to_string())));
        let tree = build_module_tree(vec![
            snapshot(&deep, "x"),
            snapshot(&root, "z"),
            snapshot(&root, "y"),
        ]);

        assert!(tree.address.is_none());
        let names: Vec<&str> = tree.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["y", "z"]);

        assert_eq!(tree.child_modules.len(), 1);
        let a = &tree.child_modules[0];
        assert_eq!(a.address.as_deref(), Some("module.a"));
        assert!(a.resources.is_empty());
        assert_eq!(
            a.child_modules[0].address.as_deref(),
            Some(r#"module.a.module.b["k"]"#)
        );
    }

    #[test]
    fn empty_tree_is_bare_root() {
        let tree = build_module_tree(vec![]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, serde_json::json!({"resources": [], "child_modules": []}));
    }
}
