//! Relational Schema Tests
//!
//! End-to-end coverage of the relational schema layer:
//! - Parse, regenerate and re-parse is a fixed point
//! - Composite primary keys keep their declared order and force 2.1
//! - Table comparison verdicts and the version-gated 2.1 rules
//! - Mutation operations keep the canonical string current

use serde_json::json;
use syncschema::{RelationalSchemaObject, StorageType, TableInfo, TableMode, TableVerdict};

// =============================================================================
// Helper Functions
// =============================================================================

fn student_table() -> serde_json::Value {
    json!({
        "NAME": "student",
        "DEFINE": {
            "id": {"COLUMN_ID": 1, "TYPE": "INTEGER", "NOT_NULL": true},
            "name": {"COLUMN_ID": 2, "TYPE": "TEXT", "NOT_NULL": true, "DEFAULT": "unknown"},
            "score": {"COLUMN_ID": 3, "TYPE": "DOUBLE", "NOT_NULL": false}
        },
        "AUTOINCREMENT": true,
        "PRIMARY_KEY": "id",
        "INDEX": {"idx_name": ["name"], "idx_score": ["score", "name"]}
    })
}

fn parse_v2(tables: Vec<serde_json::Value>) -> RelationalSchemaObject {
    let raw = json!({
        "SCHEMA_VERSION": "2.0",
        "SCHEMA_TYPE": "RELATIVE",
        "TABLES": tables
    })
    .to_string();
    let mut schema = RelationalSchemaObject::new();
    schema.parse_from_schema_string(&raw).unwrap();
    schema
}

// =============================================================================
// Parse and Regeneration Tests
// =============================================================================

/// Regeneration reaches a fixed point after one round.
#[test]
fn test_regenerated_string_is_fixed_point() {
    let schema = parse_v2(vec![student_table()]);
    let first = schema.to_schema_string().to_string();

    let mut again = RelationalSchemaObject::new();
    again.parse_from_schema_string(&first).unwrap();
    assert_eq!(again.to_schema_string(), first);
}

/// Tables without a primary key (keyed by rowid) regenerate a canonical
/// string that re-parses to an equal table, with and without indexes.
#[test]
fn test_round_trip_without_primary_key() {
    let mut log_table = json!({
        "NAME": "log_entry",
        "DEFINE": {
            "ts": {"COLUMN_ID": 1, "TYPE": "INTEGER", "NOT_NULL": true},
            "msg": {"COLUMN_ID": 2, "TYPE": "TEXT", "NOT_NULL": false}
        }
    });
    for with_index in [false, true] {
        if with_index {
            log_table["INDEX"] = json!({"idx_ts": ["ts"]});
        }
        let schema = parse_v2(vec![log_table.clone()]);
        let canonical = schema.to_schema_string().to_string();

        let mut again = RelationalSchemaObject::new();
        again.parse_from_schema_string(&canonical).unwrap();
        assert_eq!(again.to_schema_string(), canonical);

        let before = schema.get_table("log_entry").unwrap();
        let after = again.get_table("log_entry").unwrap();
        assert_eq!(before.compare_with_table(after, "2.0"), TableVerdict::Equal);
        assert!(after.primary_key.is_empty());
        assert_eq!(after.index_defines.contains_key("idx_ts"), with_index);
    }
}

/// A table parsed with an empty DEFINE keeps it across regeneration.
#[test]
fn test_round_trip_with_empty_define() {
    let schema = parse_v2(vec![json!({"NAME": "placeholder", "DEFINE": {}})]);
    let canonical = schema.to_schema_string().to_string();

    let mut again = RelationalSchemaObject::new();
    again.parse_from_schema_string(&canonical).unwrap();
    assert_eq!(again.to_schema_string(), canonical);
    let before = schema.get_table("placeholder").unwrap();
    let after = again.get_table("placeholder").unwrap();
    assert!(after.fields.is_empty());
    assert_eq!(before.compare_with_table(after, "2.0"), TableVerdict::Equal);
}

/// Declared column types map onto SQLite affinities.
#[test]
fn test_column_affinities() {
    let schema = parse_v2(vec![student_table()]);
    let table = schema.get_table("student").unwrap();
    assert_eq!(table.fields["id"].storage_type, StorageType::Integer);
    assert_eq!(table.fields["name"].storage_type, StorageType::Text);
    assert_eq!(table.fields["score"].storage_type, StorageType::Real);
}

/// A composite primary key keeps declaration order across the round trip.
#[test]
fn test_composite_primary_key_order_round_trip() {
    let raw = json!({
        "SCHEMA_VERSION": "2.1",
        "SCHEMA_TYPE": "RELATIVE",
        "TABLE_MODE": "SPLIT_BY_DEVICE",
        "TABLES": [{
            "NAME": "grades",
            "DEFINE": {
                "a": {"COLUMN_ID": 1, "TYPE": "integer", "NOT_NULL": true},
                "b": {"COLUMN_ID": 2, "TYPE": "text", "NOT_NULL": true}
            },
            "PRIMARY_KEY": ["a", "b"]
        }]
    })
    .to_string();
    let mut schema = RelationalSchemaObject::new();
    schema.parse_from_schema_string(&raw).unwrap();

    let mut again = RelationalSchemaObject::new();
    again
        .parse_from_schema_string(&schema.to_schema_string().to_string())
        .unwrap();
    let table = again.get_table("grades").unwrap();
    assert_eq!(table.primary_key[&1], "a");
    assert_eq!(table.primary_key[&2], "b");
}

/// Version 2.0 cannot carry composite keys or a table mode.
#[test]
fn test_v20_feature_gates() {
    let mut composite = student_table();
    composite["PRIMARY_KEY"] = json!(["id", "name"]);
    let raw = json!({
        "SCHEMA_VERSION": "2.0",
        "SCHEMA_TYPE": "RELATIVE",
        "TABLES": [composite]
    })
    .to_string();
    let mut schema = RelationalSchemaObject::new();
    assert!(schema.parse_from_schema_string(&raw).is_err());

    let raw = json!({
        "SCHEMA_VERSION": "2.0",
        "SCHEMA_TYPE": "RELATIVE",
        "TABLE_MODE": "COLLABORATION",
        "TABLES": [student_table()]
    })
    .to_string();
    let mut schema = RelationalSchemaObject::new();
    assert!(schema.parse_from_schema_string(&raw).is_err());
}

// =============================================================================
// Mutation Tests
// =============================================================================

/// Adding and removing tables keeps the schema string current.
#[test]
fn test_add_remove_table_regenerates_string() {
    let mut schema = parse_v2(vec![student_table()]);
    let mut extra = TableInfo::new("extra");
    extra.primary_key.insert(1, "k".to_string());
    schema.add_table(extra);
    assert!(schema.to_schema_string().contains("\"NAME\": \"extra\""));

    schema.remove_table("extra");
    assert!(!schema.to_schema_string().contains("extra"));
    assert!(schema.get_table("extra").is_none());
}

/// Switching to collaboration mode upgrades the version and the string.
#[test]
fn test_collaboration_mode_upgrade() {
    let mut schema = parse_v2(vec![student_table()]);
    assert_eq!(schema.schema_version(), "2.0");
    schema.set_table_mode(TableMode::Collaboration);
    assert_eq!(schema.schema_version(), "2.1");
    assert!(schema.to_schema_string().contains("\"TABLE_MODE\":\"COLLABORATION\""));

    // The upgraded string is itself a valid 2.1 schema.
    let mut again = RelationalSchemaObject::new();
    again
        .parse_from_schema_string(&schema.to_schema_string().to_string())
        .unwrap();
    assert_eq!(again.table_mode(), TableMode::Collaboration);
}

// =============================================================================
// Table Comparison Tests
// =============================================================================

/// Parsed tables compare equal to themselves and tolerate fillable growth.
#[test]
fn test_parsed_table_comparison() {
    let local = parse_v2(vec![student_table()]);

    let mut grown = student_table();
    grown["DEFINE"]["remark"] =
        json!({"COLUMN_ID": 4, "TYPE": "TEXT", "NOT_NULL": false});
    let remote = parse_v2(vec![grown]);

    let local_table = local.get_table("student").unwrap();
    let remote_table = remote.get_table("student").unwrap();
    assert_eq!(
        local_table.compare_with_table(local_table, "2.0"),
        TableVerdict::Equal
    );
    assert_eq!(
        local_table.compare_with_table(remote_table, "2.0"),
        TableVerdict::CompatibleUpgrade
    );
    assert_eq!(
        remote_table.compare_with_table(local_table, "2.0"),
        TableVerdict::Incompatible
    );
}

/// Unique constraints only gate compatibility from version 2.1 on.
#[test]
fn test_unique_gate_is_version_dependent() {
    let local = parse_v2(vec![student_table()]);
    let mut with_unique = student_table();
    with_unique["UNIQUE"] = json!([["name"]]);
    let remote = parse_v2(vec![with_unique]);

    let local_table = local.get_table("student").unwrap();
    let remote_table = remote.get_table("student").unwrap();
    assert_eq!(
        local_table.compare_with_table(remote_table, "2.0"),
        TableVerdict::Equal
    );
    assert_eq!(
        local_table.compare_with_table(remote_table, "2.1"),
        TableVerdict::Incompatible
    );
}
