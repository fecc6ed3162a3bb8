pub mod action;
pub mod planfile;
pub mod values;

use std::collections::BTreeMap;

use crate::addrs::AbsResourceInstance;
use crate::provider::ProviderConfigRef;
use crate::state::models::DeposedKey;

pub use action::Action;
pub use values::Value;

/// A computed, not-yet-applied set of proposed changes.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Version of the tool that created the plan.
    pub tool_version: String,
    /// Root module input variable values the plan was computed with.
    pub variables: BTreeMap<String, Value>,
    pub changes: Changes,
}

#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub resources: Vec<ResourceInstanceChange>,
    pub outputs: Vec<OutputChange>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.resources.iter().all(|c| c.change.action == Action::NoOp)
            && self.outputs.iter().all(|c| c.change.action == Action::NoOp)
    }
}

/// A proposed change to one object of a resource instance: its current
/// object, or one deposed object when `deposed_key` is set.
#[derive(Debug, Clone)]
pub struct ResourceInstanceChange {
    pub addr: AbsResourceInstance,
    pub deposed_key: Option<DeposedKey>,
    /// The provider configuration as referenced by the resource's module.
    pub provider: ProviderConfigRef,
    pub change: Change,
}

/// Before/after values with the action computed upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub action: Action,
    /// Absent for create and read.
    pub before: Option<Value>,
    /// Absent for delete.
    pub after: Option<Value>,
}

impl Change {
    pub fn new(action: Action, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            action,
            before,
            after,
        }
    }
}

/// A proposed change to a root module output value.
#[derive(Debug, Clone)]
pub struct OutputChange {
    pub name: String,
    pub sensitive: bool,
    pub change: Change,
}
