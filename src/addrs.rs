use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ─── Resource Mode ──────────────────────────────────────────────────────────

/// Whether a resource is managed (created/updated/destroyed) or a read-only
/// data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    Managed,
    Data,
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceMode::Managed => write!(f, "managed"),
            ResourceMode::Data => write!(f, "data"),
        }
    }
}

// ─── Instance Keys ──────────────────────────────────────────────────────────

/// The key of one instance of a repeated resource or module: an integer for
/// `count`, a string for `for_each`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceKey {
    Int(i64),
    Str(String),
}

impl InstanceKey {
    /// Parse the text between the brackets of an address step,
    /// e.g. `0` or `"blue"`. String keys use JSON string escapes.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with('"') {
            return serde_json::from_str::<String>(raw).ok().map(InstanceKey::Str);
        }
        raw.parse::<i64>().ok().map(InstanceKey::Int)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Int(i) => write!(f, "[{}]", i),
            InstanceKey::Str(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                write!(f, "[{}]", quoted)
            }
        }
    }
}

// ─── Module Paths ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleStep {
    pub name: String,
    pub key: Option<InstanceKey>,
}

/// An absolute module instance path. The empty path is the root module.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleInstance(pub Vec<ModuleStep>);

fn module_step_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^module\.([A-Za-z_][A-Za-z0-9_-]*)(?:\[(-?\d+|"(?:[^"\\]|\\.)*")\])?"#)
            .expect("static regex is valid")
    })
}

impl ModuleInstance {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a child module instance path.
    pub fn child(&self, name: &str, key: Option<InstanceKey>) -> Self {
        let mut steps = self.0.clone();
        steps.push(ModuleStep {
            name: name.to_string(),
            key,
        });
        Self(steps)
    }

    /// The parent module instance, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The static module path (call names only, instance keys dropped), used
    /// to find the module's configuration.
    pub fn module_path(&self) -> Vec<String> {
        self.0.iter().map(|s| s.name.clone()).collect()
    }

    /// Parse `module.a[0].module.b` style paths. The empty string is root.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let mut steps = Vec::new();
        let mut rest = raw.trim();

        while !rest.is_empty() {
            let caps = module_step_regex()
                .captures(rest)
                .ok_or_else(|| AddressError::InvalidModule(raw.to_string()))?;
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let name = caps[1].to_string();
            let key = match caps.get(2) {
                Some(k) => Some(
                    InstanceKey::parse(k.as_str())
                        .ok_or_else(|| AddressError::InvalidModule(raw.to_string()))?,
                ),
                None => None,
            };
            steps.push(ModuleStep { name, key });

            rest = &rest[whole.len()..];
            if let Some(next) = rest.strip_prefix('.') {
                rest = next;
            } else if !rest.is_empty() {
                return Err(AddressError::InvalidModule(raw.to_string()));
            }
        }

        Ok(Self(steps))
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "module.{}", step.name)?;
            if let Some(ref key) = step.key {
                write!(f, "{}", key)?;
            }
        }
        Ok(())
    }
}

// ─── Resources ──────────────────────────────────────────────────────────────

/// A resource within a single module, without instance key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resource {
    pub mode: ResourceMode,
    pub type_name: String,
    pub name: String,
}

impl Resource {
    pub fn managed(type_name: &str, name: &str) -> Self {
        Self {
            mode: ResourceMode::Managed,
            type_name: type_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn data(type_name: &str, name: &str) -> Self {
        Self {
            mode: ResourceMode::Data,
            type_name: type_name.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ResourceMode::Managed => write!(f, "{}.{}", self.type_name, self.name),
            ResourceMode::Data => write!(f, "data.{}.{}", self.type_name, self.name),
        }
    }
}

/// A resource in a specific module instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsResource {
    pub module: ModuleInstance,
    pub resource: Resource,
}

impl AbsResource {
    pub fn instance(&self, key: Option<InstanceKey>) -> AbsResourceInstance {
        AbsResourceInstance {
            module: self.module.clone(),
            resource: self.resource.clone(),
            key,
        }
    }
}

impl fmt::Display for AbsResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.module, self.resource)
        }
    }
}

/// The absolute address of one resource instance, e.g.
/// `module.net[0].aws_subnet.private["a"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsResourceInstance {
    pub module: ModuleInstance,
    pub resource: Resource,
    pub key: Option<InstanceKey>,
}

impl AbsResourceInstance {
    pub fn new(module: ModuleInstance, resource: Resource, key: Option<InstanceKey>) -> Self {
        Self {
            module,
            resource,
            key,
        }
    }

    pub fn containing_resource(&self) -> AbsResource {
        AbsResource {
            module: self.module.clone(),
            resource: self.resource.clone(),
        }
    }
}

impl fmt::Display for AbsResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.containing_resource())?;
        if let Some(ref key) = self.key {
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid module address: {0:?}")]
    InvalidModule(String),
}
