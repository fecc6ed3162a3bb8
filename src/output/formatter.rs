use std::collections::BTreeMap;

use colored::{ColoredString, Colorize};

use crate::addrs::{AbsResourceInstance, ResourceMode};
use crate::config::Config;
use crate::plans::{Action, Change, OutputChange, Plan, ResourceInstanceChange, Value};
use crate::provider::schemas::{ResourceTypeSchema, Schemas};
use crate::provider::ProviderConfigRef;
use crate::state::models::{ObjectStatus, ResourceInstanceObject, State};

const UNKNOWN: &str = "(known after apply)";
const SENSITIVE: &str = "(sensitive value)";

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

fn push(out: &mut String, line: impl AsRef<str>) {
    out.push_str(line.as_ref());
    out.push('\n');
}

/// Sensitive-attribute lookup. Objects whose provider or type has no known
/// schema are shown unmasked.
struct Masking<'a> {
    config: &'a Config,
    schemas: &'a Schemas,
}

impl<'a> Masking<'a> {
    fn schema(
        &self,
        addr: &AbsResourceInstance,
        provider: &ProviderConfigRef,
    ) -> Option<&'a ResourceTypeSchema> {
        let fqn = self.config.resolve_provider(&addr.module, provider).ok()?;
        self.schemas
            .resource_type(&fqn, addr.resource.mode, &addr.resource.type_name)
    }
}

// ─── Plans ──────────────────────────────────────────────────────────────────

/// Render a plan as a Terraform-like diff.
pub fn format_plan(plan: &Plan, config: &Config, schemas: &Schemas) -> String {
    let mut out = String::new();
    let masking = Masking { config, schemas };

    let mut actionable: Vec<&ResourceInstanceChange> = plan
        .changes
        .resources
        .iter()
        .filter(|c| c.change.action != Action::NoOp)
        .collect();
    actionable.sort_by(|a, b| {
        (a.addr.to_string(), &a.deposed_key).cmp(&(b.addr.to_string(), &b.deposed_key))
    });

    let outputs: Vec<&OutputChange> = plan
        .changes
        .outputs
        .iter()
        .filter(|o| o.change.action != Action::NoOp)
        .collect();

    push(&mut out, "");
    if actionable.is_empty() && outputs.is_empty() {
        push(
            &mut out,
            "No changes. Infrastructure is up-to-date.".green().to_string(),
        );
        return out;
    }

    if !actionable.is_empty() {
        push(
            &mut out,
            "Oxid used the selected providers to generate the following execution plan.",
        );
        push(
            &mut out,
            "Resource actions are indicated with the following symbols:",
        );
        let legend = [
            (Action::Create, "create"),
            (Action::Update, "update in-place"),
            (Action::Delete, "destroy"),
            (Action::DeleteThenCreate, "destroy and then create replacement"),
            (Action::CreateThenDelete, "create replacement and then destroy"),
            (Action::Read, "read (data resources)"),
        ];
        for (action, desc) in legend {
            if actionable.iter().any(|c| c.change.action == action) {
                push(
                    &mut out,
                    format!("  {} {}", paint(action, action.symbol()).bold(), desc),
                );
            }
        }

        push(&mut out, "");
        push(&mut out, "Oxid will perform the following actions:");
        push(&mut out, "");

        for change in &actionable {
            let schema = masking.schema(&change.addr, &change.provider);
            format_resource_change(&mut out, change, schema);
        }

        push(&mut out, summary_line(&actionable).bold().to_string());
        push(&mut out, "");
    }

    if !outputs.is_empty() {
        push(&mut out, "Changes to Outputs:");
        for output in outputs {
            format_output_change(&mut out, output);
        }
        push(&mut out, "");
    }

    out
}

/// "Plan: N to add, N to change, N to destroy." A replacement counts as one
/// add and one destroy.
pub fn summary_line(changes: &[&ResourceInstanceChange]) -> String {
    let (mut add, mut change, mut destroy) = (0, 0, 0);
    for c in changes {
        match c.change.action {
            Action::Create => add += 1,
            Action::Update => change += 1,
            Action::Delete => destroy += 1,
            Action::DeleteThenCreate | Action::CreateThenDelete => {
                add += 1;
                destroy += 1;
            }
            Action::Read | Action::NoOp => {}
        }
    }
    format!(
        "Plan: {} to add, {} to change, {} to destroy.",
        add, change, destroy
    )
}

fn paint(action: Action, s: &str) -> ColoredString {
    match action {
        Action::Create => s.green(),
        Action::Update => s.yellow(),
        Action::Delete => s.red(),
        Action::DeleteThenCreate | Action::CreateThenDelete => s.magenta(),
        Action::Read => s.cyan(),
        Action::NoOp => s.normal(),
    }
}

fn action_description(change: &ResourceInstanceChange) -> &'static str {
    match (change.change.action, change.deposed_key.is_some()) {
        (Action::Delete, true) => "will be destroyed",
        (Action::Create, _) => "will be created",
        (Action::Update, _) => "will be updated in-place",
        (Action::Delete, false) => "will be destroyed",
        (Action::DeleteThenCreate, _) | (Action::CreateThenDelete, _) => "must be replaced",
        (Action::Read, _) => "will be read during apply",
        (Action::NoOp, _) => "has no changes",
    }
}

/// One resource block of the diff.
fn format_resource_change(
    out: &mut String,
    change: &ResourceInstanceChange,
    schema: Option<&ResourceTypeSchema>,
) {
    let action = change.change.action;
    let icon = action.symbol();

    // Header: # aws_vpc.main will be created
    let mut header = change.addr.to_string();
    if let Some(ref key) = change.deposed_key {
        header.push_str(&format!(" (deposed object {})", key));
    }
    push(
        out,
        format!(
            "  {} {} {}",
            "#".dimmed(),
            header.bold(),
            action_description(change).dimmed()
        ),
    );

    // Block: + resource "aws_vpc" "main" {
    let block_type = match change.addr.resource.mode {
        ResourceMode::Managed => "resource",
        ResourceMode::Data => "data",
    };
    push(
        out,
        paint(
            action,
            &format!(
                "  {} {} \"{}\" \"{}\" {{",
                icon, block_type, change.addr.resource.type_name, change.addr.resource.name
            ),
        )
        .to_string(),
    );

    for line in attribute_lines(&change.change, schema) {
        push(out, format!("      {}", line));
    }

    push(out, "    }");
    push(out, "");
}

/// Attribute lines of a resource block, in key order. Updates and
/// replacements show only changed attributes plus a hidden-count note.
fn attribute_lines(change: &Change, schema: Option<&ResourceTypeSchema>) -> Vec<String> {
    let empty = BTreeMap::new();
    let before = change
        .before
        .as_ref()
        .and_then(Value::as_map)
        .unwrap_or(&empty);
    let after = change
        .after
        .as_ref()
        .and_then(Value::as_map)
        .unwrap_or(&empty);
    let sensitive = |key: &str| schema.map(|s| s.is_sensitive(key)).unwrap_or(false);

    let mut keys: Vec<&String> = before.keys().chain(after.keys()).collect();
    keys.sort();
    keys.dedup();
    let width = keys.iter().map(|k| k.len()).max().unwrap_or(0).min(35);

    let mut lines = Vec::new();
    let mut unchanged = 0;

    for key in keys {
        let masked = sensitive(key);
        let old = before.get(key).filter(|v| **v != Value::Null);
        let new = after.get(key).filter(|v| **v != Value::Null);
        let show = |v: &Value| {
            if masked {
                SENSITIVE.to_string()
            } else {
                format_value(v)
            }
        };

        let line = match change.action {
            Action::Create | Action::Read => match new {
                Some(v) => {
                    let marker = if change.action == Action::Read { " " } else { "+" };
                    format!("{} {:<width$} = {}", marker, key, show(v), width = width)
                }
                None => continue,
            },
            Action::Delete => match old {
                Some(v) => format!("- {:<width$} = {} -> null", key, show(v), width = width),
                None => continue,
            },
            Action::Update
            | Action::DeleteThenCreate
            | Action::CreateThenDelete
            | Action::NoOp => match (old, new) {
                (Some(o), Some(n)) if o == n => {
                    unchanged += 1;
                    continue;
                }
                (Some(o), Some(n)) => format!(
                    "~ {:<width$} = {} -> {}",
                    key,
                    show(o),
                    show(n),
                    width = width
                ),
                (None, Some(n)) => format!("+ {:<width$} = {}", key, show(n), width = width),
                (Some(o), None) => {
                    format!("- {:<width$} = {} -> null", key, show(o), width = width)
                }
                (None, None) => continue,
            },
        };
        lines.push(paint(change.action, &line).to_string());
    }

    if unchanged > 0 {
        lines.push(
            format!("# ({} unchanged attributes hidden)", unchanged)
                .dimmed()
                .to_string(),
        );
    }
    lines
}

fn format_output_change(out: &mut String, output: &OutputChange) {
    let show = |v: &Option<Value>| match v {
        _ if output.sensitive => SENSITIVE.to_string(),
        Some(v) => format_value(v),
        None => "null".to_string(),
    };
    let action = output.change.action;
    let line = match action {
        Action::Delete => format!(
            "  - {} = {} -> null",
            output.name,
            show(&output.change.before)
        ),
        Action::Create => format!("  + {} = {}", output.name, show(&output.change.after)),
        _ => format!(
            "  ~ {} = {} -> {}",
            output.name,
            show(&output.change.before),
            show(&output.change.after)
        ),
    };
    push(out, paint(action, &line).to_string());
}

// ─── State ──────────────────────────────────────────────────────────────────

/// Render a state as one `resource` block per object followed by the root
/// outputs.
pub fn format_state(state: &State, config: &Config, schemas: &Schemas) -> String {
    let mut out = String::new();

    if state.is_empty() {
        push(
            &mut out,
            "The state file is empty. No resources are represented.",
        );
        return out;
    }

    let masking = Masking { config, schemas };
    let mut instances: Vec<_> = state.instances().collect();
    instances.sort_by_key(|(addr, _, _)| addr.to_string());

    for (addr, resource, instance) in instances {
        let schema = masking.schema(&addr, &resource.provider);
        if let Some(ref current) = instance.current {
            format_state_object(&mut out, &addr, None, current, schema);
        }
        for (key, object) in &instance.deposed {
            format_state_object(&mut out, &addr, Some(&key.to_string()), object, schema);
        }
    }

    if !state.outputs.is_empty() {
        push(&mut out, "");
        push(&mut out, "Outputs:".bold().to_string());
        push(&mut out, "");
        for (name, output) in &state.outputs {
            let value = if output.sensitive {
                SENSITIVE.to_string()
            } else {
                format_value(&Value::from_json(&output.value))
            };
            push(&mut out, format!("{} = {}", name, value));
        }
    }

    out
}

fn format_state_object(
    out: &mut String,
    addr: &AbsResourceInstance,
    deposed: Option<&str>,
    object: &ResourceInstanceObject,
    schema: Option<&ResourceTypeSchema>,
) {
    let mut header = format!("# {}:", addr);
    if let Some(key) = deposed {
        header.push_str(&format!(" (deposed object {})", key));
    }
    if object.status == ObjectStatus::Tainted {
        header.push_str(" (tainted)");
    }
    push(out, header.bold().to_string());

    let block_type = match addr.resource.mode {
        ResourceMode::Managed => "resource",
        ResourceMode::Data => "data",
    };
    push(
        out,
        format!(
            "{} \"{}\" \"{}\" {{",
            block_type, addr.resource.type_name, addr.resource.name
        ),
    );

    if let serde_json::Value::Object(attrs) = &object.attributes {
        let width = attrs.keys().map(|k| k.len()).max().unwrap_or(0).min(35);
        let mut keys: Vec<&String> = attrs.keys().collect();
        keys.sort();
        for key in keys {
            let value = &attrs[key.as_str()];
            if value.is_null() {
                continue;
            }
            let display = if schema.map(|s| s.is_sensitive(key)).unwrap_or(false) {
                SENSITIVE.to_string()
            } else {
                format_value(&Value::from_json(value))
            };
            push(
                out,
                format!("    {:<width$} = {}", key, display, width = width),
            );
        }
    }

    push(out, "}");
    push(out, "");
}

// ─── Values ─────────────────────────────────────────────────────────────────

/// Format a value for inline display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Unknown => UNKNOWN.dimmed().to_string(),
        Value::Null => "null".to_string(),
        Value::String(s) => format!("{:?}", s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::List(items) => {
            if items.is_empty() {
                "[]".to_string()
            } else {
                let items: Vec<String> = items.iter().map(format_value).collect();
                format!("[{}]", items.join(", "))
            }
        }
        Value::Map(entries) => {
            if entries.is_empty() {
                "{}".to_string()
            } else {
                let items: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, format_value(v)))
                    .collect();
                format!("{{ {} }}", items.join(", "))
            }
        }
    }
}
