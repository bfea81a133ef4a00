//! Client operations against a mocked DynamoDB endpoint

use std::sync::atomic::{AtomicU32, Ordering};

use dyno_client::{ConnectConfig, DynoClient, DynoError, ResponseData};
use dyno_types::{Query, Record};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, Request, ResponseTemplate};

use crate::common::{client_for, mount_operation, record, sample_config, service_error, start_dynamo_mock, target};

#[tokio::test]
async fn scan_pages_until_the_start_key_clears() {
    let server = start_dynamo_mock().await;
    let calls = AtomicU32::new(0);
    Mock::given(method("POST"))
        .and(header("x-amz-target", target("Scan").as_str()))
        .respond_with(move |req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                assert!(body.get("ExclusiveStartKey").is_none());
                ResponseTemplate::new(200).set_body_json(json!({
                    "Items": [
                        {"pk": {"S": "user#u1"}, "sk": {"S": "user"}, "schema": {"S": "User"}, "id": {"S": "u1"}},
                        {"pk": {"S": "user#u1"}, "sk": {"S": "order#1"}, "schema": {"S": "Order"},
                         "user": {"S": "u1"}, "order": {"N": "1"}, "total": {"N": "12.5"}}
                    ],
                    "Count": 2,
                    "ScannedCount": 2,
                    "LastEvaluatedKey": {"pk": {"S": "user#u1"}, "sk": {"S": "order#1"}}
                }))
            } else {
                assert_eq!(body["ExclusiveStartKey"]["sk"], json!({"S": "order#1"}));
                ResponseTemplate::new(200).set_body_json(json!({
                    "Items": [{"pk": {"S": "user#u2"}, "sk": {"S": "user"}, "schema": {"S": "User"}, "id": {"S": "u2"}}],
                    "Count": 1,
                    "ScannedCount": 1
                }))
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    let config = sample_config();
    let table = config.table("sample").unwrap();
    let client = client_for(&server);
    let mut query = Query::new(table, None, None).unwrap().with_limit(2);

    let mut records: Vec<Record> = Vec::new();
    loop {
        let page = client.scan(&mut query).await.unwrap();
        records.extend(page.into_records());
        if query.start_key().is_none() {
            break;
        }
    }

    assert_eq!(records.len(), 3);
    assert_eq!(records[1]["schema"], json!("Order"));
    assert_eq!(records[1]["order"], json!(1));
    assert_eq!(records[1]["total"], json!(12.5));
    assert_eq!(records[2]["id"], json!("u2"));
}

#[tokio::test]
async fn query_by_key_returns_a_single_record() {
    let server = start_dynamo_mock().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", target("Query").as_str()))
        .and(body_partial_json(json!({
            "TableName": "sample",
            "Limit": 1,
            "ExpressionAttributeValues": {":v1": {"S": "user#u1"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"pk": {"S": "user#u1"}, "sk": {"S": "order#3"}, "user": {"S": "u1"}, "order": {"N": "3"}}],
            "Count": 1,
            "ScannedCount": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = sample_config();
    let table = config.table("sample").unwrap();
    let found = client_for(&server)
        .fetch(table, "Order", None, &record(json!({"user": "u1"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["order"], json!(3));
    assert_eq!(found["schema"], json!("Order"));
}

#[tokio::test]
async fn next_counter_value_uses_the_declared_start() {
    let server = start_dynamo_mock().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", target("UpdateItem").as_str()))
        .and(body_partial_json(json!({
            "Key": {"pk": {"S": "user#u1"}, "sk": {"S": "user"}},
            "UpdateExpression": "SET #n1 = if_not_exists(#n1, :v1) + :v2",
            "ExpressionAttributeNames": {"#n1": "next_order"},
            "ExpressionAttributeValues": {":v1": {"N": "100"}, ":v2": {"N": "1"}},
            "ReturnValues": "UPDATED_NEW"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Attributes": {"next_order": {"N": "101"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = sample_config();
    let table = config.table("sample").unwrap();
    let next = client_for(&server)
        .auto_increment(table, "User", "next_order", &record(json!({"id": "u1"})), false)
        .await
        .unwrap();
    assert_eq!(next, Some(101));
}

#[tokio::test]
async fn configured_retry_policy_bounds_throttling() {
    let server = start_dynamo_mock().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(service_error(
            "ProvisionedThroughputExceededException",
            "The level of configured provisioned throughput for the table was exceeded.",
        )))
        .expect(3)
        .mount(&server)
        .await;

    let config = sample_config();
    let client = DynoClient::new(ConnectConfig::local(Some(&server.uri())).unwrap()).with_retry(config.retry_config());
    let err = client
        .get_item(config.table("sample").unwrap(), "User", &record(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DynoError::Throttled { .. }), "got {err:?}");
    assert_eq!(err.status_code(), 429);
}

#[tokio::test]
async fn missing_table_is_not_found() {
    let server = start_dynamo_mock().await;
    mount_operation(
        &server,
        "GetItem",
        400,
        service_error("ResourceNotFoundException", "Requested resource not found"),
    )
    .await;

    let config = sample_config();
    let err = client_for(&server)
        .get_item(config.table("sample").unwrap(), "User", &record(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "not found: Requested resource not found");
}

#[tokio::test]
async fn get_of_an_absent_item_has_no_data() {
    let server = start_dynamo_mock().await;
    mount_operation(&server, "GetItem", 200, json!({})).await;

    let config = sample_config();
    let response = client_for(&server)
        .get_item(config.table("sample").unwrap(), "User", &record(json!({"id": "nobody"})))
        .await
        .unwrap();
    assert_eq!(response.data, ResponseData::None);
    assert_eq!(response.to_string(), "DR ok");
}

#[tokio::test]
async fn describe_table_returns_the_description() {
    let server = start_dynamo_mock().await;
    mount_operation(
        &server,
        "DescribeTable",
        200,
        json!({"Table": {"TableName": "sample", "TableStatus": "ACTIVE"}}),
    )
    .await;

    let description = client_for(&server).describe_table("sample").await.unwrap();
    assert_eq!(description["TableStatus"], "ACTIVE");
}
