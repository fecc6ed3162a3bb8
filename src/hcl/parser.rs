use std::collections::BTreeMap;
use std::path::Path;

use crate::config::types::*;
use crate::config::ConfigError;

/// Parse a single HCL file into a partial ModuleConfig.
///
/// Only the parts of the configuration needed to display plans and state are
/// kept: provider requirements, the backend selection and module calls.
/// Everything else is skipped.
pub fn parse_hcl(content: &str, file_path: &Path) -> Result<ModuleConfig, ConfigError> {
    let body: hcl::Body = hcl::from_str(content).map_err(|e| ConfigError::Parse {
        path: file_path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut module = ModuleConfig::default();

    for structure in body.into_inner() {
        match structure {
            hcl::Structure::Block(block) => {
                let ident = block.identifier().to_string();
                match ident.as_str() {
                    "terraform" => {
                        module.terraform_settings = Some(parse_terraform_block(&block));
                    }
                    "module" => {
                        if let Some(call) = parse_module_block(&block) {
                            module.module_calls.push(call);
                        }
                    }
                    _ => {
                        tracing::trace!("Skipping block type: {}", ident);
                    }
                }
            }
            hcl::Structure::Attribute(attr) => {
                tracing::debug!("Ignoring top-level attribute: {}", attr.key);
            }
        }
    }

    Ok(module)
}

// ─── Block Parsers ───────────────────────────────────────────────────────────

fn parse_terraform_block(block: &hcl::Block) -> TerraformSettings {
    let mut settings = TerraformSettings::default();

    for inner_block in block.body().blocks() {
        match inner_block.identifier() {
            "required_providers" => {
                for attr in inner_block.body().attributes() {
                    let name = attr.key().to_string();
                    let req = parse_required_provider(&name, attr.expr());
                    settings.required_providers.insert(name, req);
                }
            }
            "backend" => {
                settings.backend = Some(parse_backend_block(inner_block));
            }
            _ => {}
        }
    }

    settings
}

/// `name = { source = "...", version = "..." }` or the legacy `name = "1.0"`,
/// which carries no source.
fn parse_required_provider(name: &str, expr: &hcl::Expression) -> RequiredProvider {
    let mut source = String::new();

    if let hcl::Expression::Object(obj) = expr {
        for (key_expr, value_expr) in obj {
            if object_key_to_string(key_expr) == "source" {
                source = expr_to_string(value_expr);
            }
        }
    }

    if source.is_empty() {
        tracing::debug!("required_providers entry '{}' has no source", name);
    }

    RequiredProvider { source }
}

fn parse_backend_block(block: &hcl::Block) -> BackendBlock {
    let kind = block
        .labels()
        .first()
        .map(|l| l.as_str().to_string())
        .unwrap_or_default();

    let attributes = block
        .body()
        .attributes()
        .filter_map(|attr| literal_string(attr.expr()).map(|v| (attr.key().to_string(), v)))
        .collect();

    BackendBlock { kind, attributes }
}

fn parse_module_block(block: &hcl::Block) -> Option<ModuleCall> {
    let name = block.labels().first()?.as_str().to_string();
    let mut source = String::new();
    let mut providers = BTreeMap::new();

    for attr in block.body().attributes() {
        match attr.key() {
            "source" => source = expr_to_string(attr.expr()),
            "providers" => {
                if let hcl::Expression::Object(obj) = attr.expr() {
                    for (k, v) in obj {
                        providers.insert(object_key_to_string(k), expr_to_string(v));
                    }
                }
            }
            _ => {}
        }
    }

    Some(ModuleCall {
        name,
        source,
        providers,
    })
}

// ─── Helper Functions ────────────────────────────────────────────────────────

/// Render an expression as the string a user would write for a literal or a
/// plain reference (`aws.west`).
fn expr_to_string(expr: &hcl::Expression) -> String {
    match expr {
        hcl::Expression::String(s) => s.clone(),
        hcl::Expression::Variable(v) => v.to_string(),
        hcl::Expression::Number(n) => n.to_string(),
        hcl::Expression::Bool(b) => b.to_string(),
        hcl::Expression::Null => "null".to_string(),
        hcl::Expression::Traversal(t) => {
            let mut parts = Vec::new();
            if let hcl::Expression::Variable(var) = &t.expr {
                parts.push(var.to_string());
            }
            for op in &t.operators {
                match op {
                    hcl::expr::TraversalOperator::GetAttr(ident) => {
                        parts.push(ident.to_string());
                    }
                    hcl::expr::TraversalOperator::Index(idx) => {
                        parts.push(format!("[{}]", expr_to_string(idx)));
                    }
                    _ => {}
                }
            }
            parts.join(".")
        }
        _ => format!("{:?}", expr),
    }
}

fn literal_string(expr: &hcl::Expression) -> Option<String> {
    match expr {
        hcl::Expression::String(s) => Some(s.clone()),
        hcl::Expression::Number(n) => Some(n.to_string()),
        hcl::Expression::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn object_key_to_string(key: &hcl::expr::ObjectKey) -> String {
    match key {
        hcl::expr::ObjectKey::Identifier(id) => id.to_string(),
        hcl::expr::ObjectKey::Expression(expr) => expr_to_string(expr),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ModuleConfig {
        parse_hcl(src, Path::new("main.tf")).unwrap()
    }

    #[test]
    fn parses_required_providers_and_backend() {
        let module = parse(
            r#"
terraform {
  required_version = ">= 1.5"
  required_providers {
    aws = {
      source  = "hashicorp/aws"
      version = "~> 5.0"
    }
    legacy = "1.0"
  }
  backend "sqlite" {
    path = "state/oxid.db"
  }
}
"#,
        );

        let tf = module.terraform_settings.clone().unwrap();
        assert_eq!(tf.required_providers["aws"].source, "hashicorp/aws");
        assert_eq!(tf.required_providers["legacy"].source, "");
        assert!(module.required_provider("legacy").is_none());
        let backend = tf.backend.unwrap();
        assert_eq!(backend.kind, "sqlite");
        assert_eq!(backend.attributes["path"], "state/oxid.db");
    }

    #[test]
    fn parses_module_calls_and_skips_other_blocks() {
        let module = parse(
            r#"
provider "aws" {
  alias  = "west"
  region = "us-west-2"
}

resource "aws_instance" "web" {
  count    = 2
  provider = aws.west
}

module "network" {
  source = "./modules/network"
  providers = {
    aws = aws.west
  }
}

module "registry" {
  source  = "terraform-aws-modules/vpc/aws"
  version = "5.0.0"
}
"#,
        );

        assert_eq!(module.module_calls.len(), 2);
        let call = module.module_call("network").unwrap();
        assert!(call.is_local());
        assert_eq!(call.passed_provider("aws"), Some("aws.west"));
        assert_eq!(call.passed_provider("google"), None);
        assert!(!module.module_call("registry").unwrap().is_local());
    }

    #[test]
    fn syntax_error_names_the_file() {
        let err = parse_hcl("resource \"a\" {", Path::new("broken.tf")).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, Path::new("broken.tf")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
