pub mod schemas;

use std::fmt;
use std::str::FromStr;

/// Registry host assumed for provider sources that omit one.
pub const DEFAULT_REGISTRY_HOST: &str = "registry.terraform.io";

/// Namespace assumed for providers referenced only by local name.
pub const DEFAULT_NAMESPACE: &str = "hashicorp";

/// A fully-qualified provider address, e.g. `registry.terraform.io/hashicorp/aws`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderAddr {
    pub hostname: String,
    pub namespace: String,
    pub provider_type: String,
}

impl ProviderAddr {
    /// Parse a provider source string like "aws", "hashicorp/aws" or
    /// "registry.terraform.io/hashicorp/aws".
    pub fn parse_source(source: &str) -> Result<Self, ProviderAddrError> {
        let parts: Vec<&str> = source.trim().split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ProviderAddrError::InvalidSource(source.to_string()));
        }
        match parts.len() {
            1 => Ok(Self::implied(parts[0])),
            2 => Ok(Self {
                hostname: DEFAULT_REGISTRY_HOST.to_string(),
                namespace: parts[0].to_string(),
                provider_type: parts[1].to_string(),
            }),
            3 => Ok(Self {
                hostname: parts[0].to_string(),
                namespace: parts[1].to_string(),
                provider_type: parts[2].to_string(),
            }),
            _ => Err(ProviderAddrError::InvalidSource(source.to_string())),
        }
    }

    /// The provider implied by a bare local name (`aws` → `hashicorp/aws`).
    pub fn implied(local_name: &str) -> Self {
        Self {
            hostname: DEFAULT_REGISTRY_HOST.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            provider_type: local_name.to_string(),
        }
    }
}

impl fmt::Display for ProviderAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.hostname, self.namespace, self.provider_type
        )
    }
}

impl FromStr for ProviderAddr {
    type Err = ProviderAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_source(s)
    }
}

/// A reference to a provider configuration as recorded in plans and state
/// files. Older artifacts only carry the module-local name (`provider.aws.west`);
/// newer ones embed the fully-qualified source (`provider["registry.terraform.io/hashicorp/aws"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderConfigRef {
    pub local_name: String,
    pub alias: Option<String>,
    pub source: Option<ProviderAddr>,
}

impl ProviderConfigRef {
    pub fn local(local_name: &str, alias: Option<&str>) -> Self {
        Self {
            local_name: local_name.to_string(),
            alias: alias.map(str::to_string),
            source: None,
        }
    }

    /// Parse any of `aws`, `aws.west`, `provider.aws`, `provider.aws.west`,
    /// `provider["host/ns/type"]` and `provider["host/ns/type"].west`.
    pub fn parse(raw: &str) -> Result<Self, ProviderAddrError> {
        let raw = raw.trim();
        let invalid = || ProviderAddrError::InvalidConfigRef(raw.to_string());

        if let Some(rest) = raw.strip_prefix("provider[\"") {
            let (source, tail) = rest.split_once("\"]").ok_or_else(invalid)?;
            let source = ProviderAddr::parse_source(source)?;
            let alias = match tail {
                "" => None,
                t => Some(t.strip_prefix('.').ok_or_else(invalid)?.to_string()),
            };
            return Ok(Self {
                local_name: source.provider_type.clone(),
                alias,
                source: Some(source),
            });
        }

        let short = raw.strip_prefix("provider.").unwrap_or(raw);
        let mut parts = short.splitn(2, '.');
        let local_name = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let alias = parts.next();
        if alias.map(|a| a.is_empty() || a.contains('.')).unwrap_or(false) {
            return Err(invalid());
        }
        Ok(Self::local(local_name, alias))
    }
}

impl fmt::Display for ProviderConfigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(ref source) => write!(f, "provider[\"{}\"]", source)?,
            None => write!(f, "provider.{}", self.local_name)?,
        }
        if let Some(ref alias) = self.alias {
            write!(f, ".{}", alias)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderAddrError {
    #[error("invalid provider source {0:?}; expected type, namespace/type or hostname/namespace/type")]
    InvalidSource(String),
    #[error("invalid provider configuration reference {0:?}")]
    InvalidConfigRef(String),
}
