//! Tables declared in a config file drive request bodies

use std::path::Path;

use dyno_config::{ConfigError, DynoConfig};
use dyno_types::{AttributeValue, PutOptions, Query};
use insta::assert_snapshot;
use serde_json::json;

use crate::common::{SAMPLE_CONFIG, record, sample_config};

#[test]
fn config_declares_a_valid_table() {
    let config = sample_config();
    let table = config.table("sample").unwrap();
    table.validate().unwrap();
    assert!(!table.deletion_protection());
    assert_eq!(table.schemas().len(), 2);
    assert_eq!(
        table.schema("User").unwrap().auto_increment("next_order").map(|c| c.start()),
        Some(100)
    );
}

#[test]
fn create_table_body_matches_the_declaration() {
    let config = sample_config();
    let body = serde_json::to_value(config.table("sample").unwrap().create_table_request()).unwrap();

    assert_eq!(body["TableName"], "sample");
    assert_eq!(body["BillingMode"], "PAY_PER_REQUEST");
    assert_eq!(body["DeletionProtectionEnabled"], false);
    assert_eq!(
        body["KeySchema"],
        json!([
            {"AttributeName": "pk", "KeyType": "HASH"},
            {"AttributeName": "sk", "KeyType": "RANGE"}
        ])
    );
    assert_eq!(body["GlobalSecondaryIndexes"][0]["IndexName"], "gsi1");
    assert_eq!(body["GlobalSecondaryIndexes"][0]["Projection"], json!({"ProjectionType": "ALL"}));
    assert!(body.get("ProvisionedThroughput").is_none());
    assert_eq!(body["AttributeDefinitions"].as_array().map(Vec::len), Some(4));
}

#[test]
fn write_value_renders_keys_from_declared_templates() {
    let config = sample_config();
    let table = config.table("sample").unwrap();
    let stored = table
        .write_value(&record(json!({"user": "u1", "order": 7, "total": 9.5, "junk": 1})), "Order", None, true)
        .unwrap();

    assert_eq!(stored["pk"], json!("user#u1"));
    assert_eq!(stored["sk"], json!("order#7"));
    assert_eq!(stored["schema"], json!("Order"));
    assert_eq!(stored["total"], json!(9.5));
    assert!(!stored.contains_key("junk"));
    assert!(!stored.contains_key("gsi1_pk"));
}

#[test]
fn put_guards_the_unique_index() {
    let config = sample_config();
    let table = config.table("sample").unwrap();
    let request = table
        .put_request("User", &record(json!({"id": "u1", "email": "a@b.c"})), PutOptions::default())
        .unwrap();

    assert_eq!(request.item["gsi1_pk"], AttributeValue::S("email#a@b.c".into()));
    assert_snapshot!(request.condition_expression.unwrap(), @"( ( ( attribute_exists ( #n1 ) ) AND ( attribute_exists ( #n2 ) ) ) AND ( ( ( attribute_not_exists ( #n3 ) ) ) OR ( ( #n3 = :v1 ) ) ) ) AND ( ( ( attribute_not_exists ( #n4 ) ) ) OR ( ( #n4 = :v2 ) ) )");
}

#[test]
fn schema_partition_makes_a_query() {
    let config = sample_config();
    let table = config.table("sample").unwrap();

    let mut orders = Query::new(table, Some("Order"), None).unwrap();
    assert!(!orders.has_partition());
    orders.apply_key(&record(json!({"user": "u1"}))).unwrap();
    assert!(orders.has_partition());
    let body = serde_json::to_value(orders.build_query().unwrap()).unwrap();
    assert_eq!(body["ExpressionAttributeValues"][":v1"], json!({"S": "user#u1"}));

    let everything = Query::new(table, None, None).unwrap();
    assert!(everything.build_query().is_err());
    assert!(everything.build_scan().is_ok());
}

#[test]
fn invalid_declarations_name_the_file() {
    let broken = SAMPLE_CONFIG.replace("name = \"gsi1\"\npk = \"email#{email}\"", "name = \"gsi9\"\npk = \"email#{email}\"");
    let err = DynoConfig::parse(&broken, Path::new("broken.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), Path::new("broken.toml"));
    assert!(err.to_string().contains("gsi9"));
}
