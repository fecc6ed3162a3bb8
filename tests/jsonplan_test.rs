mod common;

use oxid_show::addrs::{InstanceKey, ModuleInstance, Resource};
use oxid_show::config::{load_config, Config};
use oxid_show::jsonplan::{self, EncodeError, PlanDocument, FORMAT_VERSION};
use oxid_show::plans::{Action, Plan, Value};
use oxid_show::state::models::State;
use serde_json::json;
use tempfile::TempDir;

fn load_fixture_config() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let (config_dir, _) = common::write_workspace(dir.path());
    let config = load_config(&config_dir).unwrap();
    (dir, config)
}

fn encode_sample() -> PlanDocument {
    let (_dir, config) = load_fixture_config();
    jsonplan::marshal(
        &config,
        &common::sample_plan(),
        &common::sample_prior_state(),
        &common::fixture_schemas(),
    )
    .unwrap()
}

fn change_json<'a>(doc: &'a serde_json::Value, address: &str, deposed: bool) -> &'a serde_json::Value {
    doc["resource_changes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["address"] == address && c.get("deposed").is_some() == deposed)
        .unwrap_or_else(|| panic!("no change for {}", address))
}

#[test]
fn test_encoding_is_byte_identical() {
    let (_dir, config) = load_fixture_config();
    let plan = common::sample_plan();
    let prior = common::sample_prior_state();
    let schemas = common::fixture_schemas();

    let first = jsonplan::marshal_to_vec(&config, &plan, &prior, &schemas).unwrap();
    let second = jsonplan::marshal_to_vec(&config, &plan, &prior, &schemas).unwrap();
    assert_eq!(first, second);

    let doc = jsonplan::parse_document(&first).unwrap();
    assert_eq!(doc.format_version, FORMAT_VERSION);
    assert_eq!(doc.tool_version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_changes_sorted_by_address_then_deposed() {
    let doc = encode_sample();
    let order: Vec<(String, bool)> = doc
        .resource_changes
        .iter()
        .map(|c| (c.address.clone(), c.is_deposed()))
        .collect();
    assert_eq!(
        order,
        vec![
            (r#"module.net.cloud_subnet.a["x"]"#.to_string(), false),
            ("null_resource.counted[0]".to_string(), false),
            ("null_resource.counted[0]".to_string(), true),
            ("null_resource.single".to_string(), false),
        ]
    );
}

#[test]
fn test_index_absent_for_singletons_present_for_repetition() {
    let doc = serde_json::to_value(encode_sample()).unwrap();

    let single = change_json(&doc, "null_resource.single", false);
    assert!(single.get("index").is_none());
    assert!(single.get("module_address").is_none());

    let counted = change_json(&doc, "null_resource.counted[0]", false);
    assert_eq!(counted["index"], json!(0));

    let subnet = change_json(&doc, r#"module.net.cloud_subnet.a["x"]"#, false);
    assert_eq!(subnet["index"], json!("x"));
    assert_eq!(subnet["module_address"], json!("module.net"));
}

#[test]
fn test_deposed_change_describes_one_object() {
    let doc = serde_json::to_value(encode_sample()).unwrap();
    let deposed = change_json(&doc, "null_resource.counted[0]", true);
    assert_eq!(deposed["deposed"], json!(true));
    assert_eq!(deposed["change"]["actions"], json!(["delete"]));
    assert_eq!(deposed["change"]["before"], json!({"id": "old-0"}));
    assert_eq!(deposed["change"]["after"], serde_json::Value::Null);

    let current = change_json(&doc, "null_resource.counted[0]", false);
    assert_eq!(current["change"]["actions"], json!(["update"]));
    assert_eq!(current["change"]["before"]["triggers"], json!({"v": "1"}));
    assert_eq!(current["change"]["after"]["triggers"], json!({"v": "2"}));
}

#[test]
fn test_unknown_values_encode_as_null() {
    let doc = serde_json::to_value(encode_sample()).unwrap();
    let single = change_json(&doc, "null_resource.single", false);
    assert_eq!(single["change"]["after"], json!({"id": null, "triggers": null}));
    assert!(single["change"].get("after_unknown").is_none());
    assert_eq!(doc["output_changes"]["single_id"]["after"], serde_json::Value::Null);
}

#[test]
fn test_provider_names_resolved_through_module_requirements() {
    let doc = encode_sample();
    let by_addr = |addr: &str| {
        doc.resource_changes
            .iter()
            .find(|c| c.address == addr)
            .unwrap()
            .provider_name
            .clone()
    };
    assert_eq!(
        by_addr(r#"module.net.cloud_subnet.a["x"]"#),
        "example.com/acme/cloud"
    );
    assert_eq!(
        by_addr("null_resource.single"),
        "registry.terraform.io/hashicorp/null"
    );
}

#[test]
fn test_planned_values_and_prior_state_trees() {
    let doc = encode_sample();

    let planned = &doc.planned_values.root_module;
    let names: Vec<&str> = planned.resources.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(names, vec!["null_resource.counted[0]", "null_resource.single"]);
    assert_eq!(planned.child_modules.len(), 1);
    let subnet = &planned.child_modules[0].resources[0];
    // Planned values carry the registry's current schema version.
    assert_eq!(subnet.schema_version, 3);
    assert_eq!(subnet.values["cidr"], json!("10.0.1.0/24"));
    assert!(doc.planned_values.outputs.contains_key("single_id"));

    let prior = &doc.prior_state.root_module;
    assert_eq!(prior.resources.len(), 2);
    assert!(prior.resources[0].deposed_key.is_none());
    assert_eq!(prior.resources[1].deposed_key.as_deref(), Some("00000001"));
    assert_eq!(doc.prior_state.outputs["counted_id"].value, json!("c-0"));
    assert_eq!(doc.variables["env"].value, json!("dev"));
}

#[test]
fn test_prior_state_keeps_recorded_schema_version() {
    let (_dir, config) = load_fixture_config();
    let mut prior = common::sample_prior_state();
    if let Some(ref mut current) = prior.resources[0].instances[0].current {
        current.schema_version = 7;
    }
    let doc = jsonplan::marshal(&config, &Plan::default(), &prior, &common::fixture_schemas()).unwrap();
    let snapshot = &doc.prior_state.root_module.resources[0];
    assert_eq!(snapshot.schema_version, 7);
}

#[test]
fn test_unresolvable_provider_aborts_encode() {
    let (_dir, config) = load_fixture_config();
    let mut plan = common::sample_plan();
    plan.changes.resources.push(common::change(
        ModuleInstance::root(),
        Resource::managed("mystery_thing", "x"),
        Some(InstanceKey::Int(0)),
        "mystery",
        Action::Create,
        None,
        Some(Value::Null),
    ));

    let err = jsonplan::marshal_to_vec(&config, &plan, &State::default(), &common::fixture_schemas())
        .unwrap_err();
    match err {
        EncodeError::UnresolvableProvider { address, provider } => {
            assert_eq!(address, "mystery_thing.x[0]");
            assert_eq!(provider, "registry.terraform.io/hashicorp/mystery");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_prior_state_with_unknown_provider_is_fatal() {
    let mut prior = common::sample_prior_state();
    prior.resources[0].provider = oxid_show::provider::ProviderConfigRef::local("gone", None);
    let err = jsonplan::marshal(
        &Config::default(),
        &Plan::default(),
        &prior,
        &common::fixture_schemas(),
    )
    .unwrap_err();
    assert!(matches!(err, EncodeError::UnresolvableProvider { .. }));
}

#[test]
fn test_parse_document_rejects_other_versions() {
    let doc = encode_sample();
    let mut raw = serde_json::to_value(&doc).unwrap();
    raw["format_version"] = json!(2);
    let bytes = serde_json::to_vec(&raw).unwrap();
    let err = jsonplan::parse_document(&bytes).unwrap_err();
    assert!(err.to_string().contains("format_version 2"));
}
