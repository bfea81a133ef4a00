//! Operations over declared tables.

use chrono::Utc;
use dyno_types::{
    AttributeValue, DescribeTableRequest, DynamoRequest, Item, ListTablesRequest, OperationOutput,
    PutOptions, Query, Record, Table, Transaction, Update, read_item,
};
use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::credentials::ConnectConfig;
use crate::error::DynoError;
use crate::http_client;
use crate::response::DynoResponse;
use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::sigv4::{self, Signature};

/// Prefix of the `X-Amz-Target` header; the operation name follows a dot.
pub const TARGET_PREFIX: &str = "DynamoDB_20120810";

const PROTECTED_MARKER: &str = "protected against deletion";

#[derive(Debug, Clone)]
pub struct DynoClient {
    config: ConnectConfig,
    retry: RetryConfig,
    http: reqwest::Client,
}

impl DynoClient {
    #[must_use]
    pub fn new(config: ConnectConfig) -> Self {
        Self {
            config,
            retry: RetryConfig::default(),
            http: http_client().clone(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ConnectConfig {
        &self.config
    }

    /// Send any request body and decode the raw output.
    pub async fn send<R: DynamoRequest>(&self, request: &R) -> Result<OperationOutput, DynoError> {
        let target = format!("{TARGET_PREFIX}.{}", R::OPERATION);
        let body = serde_json::to_vec(request)?;

        let outcome = send_with_retry(|| self.build(&target, &body), &self.retry).await;
        match outcome {
            RetryOutcome::Success(response) => {
                let bytes = response.bytes().await?;
                tracing::debug!(operation = R::OPERATION, bytes = bytes.len(), "Request succeeded");
                if bytes.is_empty() {
                    return Ok(OperationOutput::default());
                }
                Ok(serde_json::from_slice(&bytes)?)
            }
            RetryOutcome::ServiceError { status, body } => {
                let error = DynoError::from_service(status.as_u16(), &body);
                tracing::debug!(operation = R::OPERATION, status = %status, %error, "Service error");
                Err(error)
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                tracing::warn!(operation = R::OPERATION, attempts, error = %source, "Request failed");
                Err(DynoError::Connection { attempts, source })
            }
            RetryOutcome::NonRetryable(e) => {
                tracing::warn!(operation = R::OPERATION, error = %e, "Request failed");
                Err(e.into())
            }
            RetryOutcome::NotSent(e) => Err(e),
        }
    }

    fn build(&self, target: &str, body: &[u8]) -> Result<RequestBuilder, DynoError> {
        let Signature {
            authorization,
            amz_date,
            security_token,
        } = sigv4::sign(&self.config, target, body, Utc::now())?;

        let mut builder = self
            .http
            .post(self.config.endpoint().clone())
            .header(CONTENT_TYPE, sigv4::CONTENT_TYPE)
            .header("X-Amz-Target", target)
            .header("X-Amz-Date", amz_date)
            .header(AUTHORIZATION, authorization)
            .body(body.to_vec());
        if let Some(token) = security_token {
            builder = builder.header("X-Amz-Security-Token", token);
        }
        Ok(builder)
    }

    /// Replace an existing item with the full record.
    ///
    /// The response carries the record as written.
    pub async fn put_item(
        &self,
        table: &Table,
        schema: &str,
        record: &Record,
        options: PutOptions,
    ) -> Result<DynoResponse, DynoError> {
        let request = table.put_request(schema, record, options)?;
        tracing::debug!(table = table.name(), schema, "put_item");
        let output = self.send(&request).await?;
        let link = table.link(Some(schema), None)?;
        let written = read_item(&link, &request.item)?;
        Ok(DynoResponse::from_output(output, Some(&link))?.with_record(written))
    }

    /// Write a new item; an existing key surfaces as [`DynoError::AlreadyExists`].
    pub async fn insert(&self, table: &Table, schema: &str, record: &Record) -> Result<DynoResponse, DynoError> {
        let request = table.insert_request(schema, record)?;
        tracing::debug!(table = table.name(), schema, "insert");
        let output = self.send(&request).await.map_err(|e| match e {
            DynoError::ConditionalCheckFailed { .. } => {
                DynoError::AlreadyExists(format!("{}[{schema}] item", table.name()))
            }
            other => other,
        })?;
        let link = table.link(Some(schema), None)?;
        let written = read_item(&link, &request.item)?;
        Ok(DynoResponse::from_output(output, Some(&link))?.with_record(written))
    }

    pub async fn get_item(&self, table: &Table, schema: &str, key_record: &Record) -> Result<DynoResponse, DynoError> {
        let request = table.get_request(schema, key_record, false)?;
        tracing::debug!(table = table.name(), schema, "get_item");
        let output = self.send(&request).await?;
        let link = table.link(Some(schema), None)?;
        Ok(DynoResponse::from_output(output, Some(&link))?)
    }

    /// Delete an existing item, returning what was stored.
    pub async fn delete_item(
        &self,
        table: &Table,
        schema: &str,
        key_record: &Record,
    ) -> Result<DynoResponse, DynoError> {
        let request = table.delete_request(schema, key_record)?;
        tracing::debug!(table = table.name(), schema, "delete_item");
        let output = self.send(&request).await.map_err(|e| match e {
            DynoError::ConditionalCheckFailed { .. } => DynoError::NotFound {
                message: format!("{}[{schema}] item", table.name()),
            },
            other => other,
        })?;
        let link = table.link(Some(schema), None)?;
        Ok(DynoResponse::from_output(output, Some(&link))?)
    }

    pub async fn update(&self, update: &Update<'_>) -> Result<DynoResponse, DynoError> {
        let request = update.build()?;
        tracing::debug!(table = request.table_name.as_str(), "update");
        let output = self.send(&request).await?;
        Ok(DynoResponse::from_output(output, Some(update.link()))?)
    }

    /// Run a query; the next page's start key is stored on the query.
    pub async fn query(&self, query: &mut Query<'_>) -> Result<DynoResponse, DynoError> {
        let request = query.build_query()?;
        tracing::debug!(table = request.table_name.as_str(), index = ?request.index_name, "query");
        let output = self.send(&request).await?;
        Self::page(query, output)
    }

    /// Run a scan; the next page's start key is stored on the query.
    pub async fn scan(&self, query: &mut Query<'_>) -> Result<DynoResponse, DynoError> {
        let request = query.build_scan()?;
        tracing::debug!(table = request.table_name.as_str(), index = ?request.index_name, "scan");
        let output = self.send(&request).await?;
        Self::page(query, output)
    }

    fn page(query: &mut Query<'_>, output: OperationOutput) -> Result<DynoResponse, DynoError> {
        let response = DynoResponse::from_output(output, Some(query.link()))?;
        query.set_start_key(response.last_evaluated_key.clone());
        if query.limit() == Some(1) {
            return Ok(response.into_single());
        }
        Ok(response)
    }

    /// One page of every record: a query when the schema fixes the partition
    /// value, a scan otherwise.
    pub async fn all(
        &self,
        table: &Table,
        schema: Option<&str>,
        index: Option<&str>,
        limit: i64,
        start_key: Option<Item>,
    ) -> Result<DynoResponse, DynoError> {
        let mut query = Query::new(table, schema, index)?
            .with_limit(limit)
            .with_start_key(start_key);
        if schema.is_some() && query.has_partition() {
            self.query(&mut query).await
        } else {
            self.scan(&mut query).await
        }
    }

    /// First record whose key matches the record's rendered key, if any.
    pub async fn fetch(
        &self,
        table: &Table,
        schema: &str,
        index: Option<&str>,
        record: &Record,
    ) -> Result<Option<Record>, DynoError> {
        let mut query = Query::new(table, Some(schema), index)?.with_limit(1);
        query.apply_key(record)?;
        let response = self.query(&mut query).await?;
        Ok(response.into_records().into_iter().next())
    }

    pub async fn table_create(&self, table: &Table) -> Result<DynoResponse, DynoError> {
        tracing::info!(table = table.name(), "Creating table");
        let output = self
            .send(&table.create_table_request())
            .await
            .map_err(|e| match e {
                DynoError::ResourceInUse { .. } => DynoError::AlreadyExists(format!("table {}", table.name())),
                other => other,
            })?;
        Ok(DynoResponse::from_output(output, None)?)
    }

    pub async fn table_delete(&self, table: &Table) -> Result<DynoResponse, DynoError> {
        tracing::info!(table = table.name(), "Deleting table");
        let output = self
            .send(&table.delete_table_request())
            .await
            .map_err(|e| protected(table, e))?;
        Ok(DynoResponse::from_output(output, None)?)
    }

    pub async fn table_protect(&self, table: &Table, protect: bool) -> Result<DynoResponse, DynoError> {
        tracing::info!(table = table.name(), protect, "Updating deletion protection");
        let output = self
            .send(&table.protect_request(protect))
            .await
            .map_err(|e| protected(table, e))?;
        Ok(DynoResponse::from_output(output, None)?)
    }

    /// Enable or disable expiry on a datetime attribute.
    pub async fn set_time_to_live(
        &self,
        table: &Table,
        attribute: &str,
        enable: bool,
    ) -> Result<DynoResponse, DynoError> {
        let request = table.time_to_live_request(attribute, enable)?;
        tracing::info!(table = table.name(), attribute, enable, "Updating time to live");
        let output = self.send(&request).await?;
        Ok(DynoResponse::from_output(output, None)?)
    }

    /// `TableDescription` of a table by name.
    pub async fn describe_table(&self, name: &str) -> Result<Value, DynoError> {
        let output = self
            .send(&DescribeTableRequest {
                table_name: name.to_string(),
            })
            .await?;
        Ok(output.table.or(output.table_description).unwrap_or(Value::Null))
    }

    /// Every table name, following pagination to the end.
    pub async fn list_tables(&self) -> Result<Vec<String>, DynoError> {
        let mut names = Vec::new();
        let mut request = ListTablesRequest::default();
        loop {
            let output = self.send(&request).await?;
            names.extend(output.table_names.unwrap_or_default());
            match output.last_evaluated_table_name {
                Some(last) => request.exclusive_start_table_name = Some(last),
                None => return Ok(names),
            }
        }
    }

    /// Next value of a schema counter.
    ///
    /// The counter lives on the item addressed by the record's key; when that
    /// item does not exist yet a bare stub is inserted and the increment is
    /// retried once. `None` when the service returns no counter value.
    pub async fn auto_increment(
        &self,
        table: &Table,
        schema: &str,
        name: &str,
        record: &Record,
        reset: bool,
    ) -> Result<Option<i64>, DynoError> {
        let request = table.auto_increment_request(record, schema, name, reset)?;
        let output = match self.send(&request).await {
            Err(DynoError::ConditionalCheckFailed { .. }) => {
                tracing::debug!(table = table.name(), schema, name, "Counter item missing; inserting stub");
                match self.send(&table.stub_request(schema, record)?).await {
                    // Lost a race with another writer creating the same stub.
                    Ok(_) | Err(DynoError::ConditionalCheckFailed { .. }) => {}
                    Err(e) => return Err(e),
                }
                self.send(&request).await?
            }
            other => other?,
        };
        Ok(output
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.get(name))
            .and_then(counter_value))
    }

    pub async fn transact(&self, transaction: &Transaction) -> Result<DynoResponse, DynoError> {
        let request = transaction.build()?;
        tracing::debug!(items = transaction.len(), "transact");
        let output = self.send(&request).await?;
        Ok(DynoResponse::from_output(output, None)?)
    }
}

fn protected(table: &Table, error: DynoError) -> DynoError {
    match error {
        DynoError::Validation { ref message } | DynoError::ResourceInUse { ref message }
            if message.contains(PROTECTED_MARKER) =>
        {
            DynoError::DeleteProtected(table.name().to_string())
        }
        other => other,
    }
}

fn counter_value(value: &AttributeValue) -> Option<i64> {
    match value {
        AttributeValue::N(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyno_types::{
        Attribute, AutoIncrement, Filter, GlobalIndex, GlobalIndexFormat, KeyFormat, Schema,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const CONDITIONAL_FAILED: &str = r#"{"__type":"com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException","message":"The conditional request failed"}"#;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn table() -> Table {
        let user = Schema::new("User", KeyFormat::parse("user#{id}", "user").unwrap().require(["id"]))
            .with_index(GlobalIndexFormat::new(
                "gsi1",
                KeyFormat::parse("email#{email}", "user").unwrap(),
            ))
            .with_attribute("id", Attribute::string())
            .with_attribute("email", Attribute::string())
            .with_attribute("age", Attribute::int())
            .with_auto_increment("counter", AutoIncrement::new(0, 1));
        let event = Schema::new("Event", KeyFormat::parse("event", "{id}").unwrap())
            .with_attribute("id", Attribute::string());
        Table::new("sample")
            .with_index(GlobalIndex::new("gsi1"))
            .with_schema(user)
            .with_schema(event)
    }

    fn target(operation: &str) -> String {
        format!("{TARGET_PREFIX}.{operation}")
    }

    fn fast_retry_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_factor: 0.0,
        }
    }

    fn client(server: &MockServer) -> DynoClient {
        DynoClient::new(ConnectConfig::local(Some(&server.uri())).unwrap()).with_retry(fast_retry_config())
    }

    #[tokio::test]
    async fn put_item_sends_a_signed_put() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", target("PutItem").as_str()))
            .and(header("content-type", "application/x-amz-json-1.0"))
            .and(header_exists("x-amz-date"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "TableName": "sample",
                "Item": {"pk": {"S": "user#u1"}, "sk": {"S": "user"}, "gsi1_pk": {"S": "email#a@b.c"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ConsumedCapacity": {"TableName": "sample", "CapacityUnits": 1.0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let table = table();
        let response = client(&server)
            .put_item(
                &table,
                "User",
                &record(json!({"id": "u1", "email": "a@b.c", "age": 30})),
                PutOptions::default(),
            )
            .await
            .unwrap();

        assert!((response.consumed - 1.0).abs() < f64::EPSILON);
        let written = response.record().unwrap();
        assert_eq!(written["age"], json!(30));
        assert_eq!(written["schema"], json!("User"));
    }

    #[tokio::test]
    async fn authorization_names_the_local_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(|req: &Request| {
                let authorization = req
                    .headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=local/"));
                assert!(authorization.contains("/us-east-1/dynamodb/aws4_request"));
                ResponseTemplate::new(200).set_body_json(json!({"TableNames": []}))
            })
            .expect(1)
            .mount(&server)
            .await;

        let names = client(&server).list_tables().await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn insert_conflict_is_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("PutItem").as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_string(CONDITIONAL_FAILED))
            .expect(1)
            .mount(&server)
            .await;

        let table = table();
        let err = client(&server)
            .insert(&table, "User", &record(json!({"id": "u1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DynoError::AlreadyExists(_)), "got {err:?}");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn get_item_retries_throttling_and_decodes() {
        let server = MockServer::start().await;
        let attempt = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("GetItem").as_str()))
            .respond_with(move |_: &Request| {
                if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(400).set_body_string(
                        r#"{"__type":"com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException","message":"slow down"}"#,
                    )
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({
                        "Item": {
                            "pk": {"S": "user#u1"},
                            "sk": {"S": "user"},
                            "schema": {"S": "User"},
                            "id": {"S": "u1"},
                            "age": {"N": "41"},
                            "internal": {"S": "dropped"}
                        }
                    }))
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let table = table();
        let response = client(&server)
            .get_item(&table, "User", &record(json!({"id": "u1"})))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(response.record().unwrap().clone()),
            json!({"pk": "user#u1", "sk": "user", "schema": "User", "id": "u1", "age": 41})
        );
        assert_eq!(response.to_string(), "DR ok with 1 items");
    }

    #[tokio::test]
    async fn delete_of_missing_item_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("DeleteItem").as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_string(CONDITIONAL_FAILED))
            .mount(&server)
            .await;

        let table = table();
        let err = client(&server)
            .delete_item(&table, "User", &record(json!({"id": "gone"})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn query_stores_the_next_start_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("Query").as_str()))
            .and(body_partial_json(json!({"TableName": "sample", "Limit": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [{"pk": {"S": "event"}, "sk": {"S": "e1"}, "id": {"S": "e1"}}],
                "Count": 1,
                "ScannedCount": 1,
                "LastEvaluatedKey": {"pk": {"S": "event"}, "sk": {"S": "e1"}}
            })))
            .mount(&server)
            .await;

        let table = table();
        let mut query = Query::new(&table, Some("Event"), None).unwrap().with_limit(1);
        let response = client(&server).query(&mut query).await.unwrap();

        assert_eq!(response.record().unwrap()["id"], json!("e1"));
        assert_eq!(response.to_string(), "DR ok with 1 items");
        let next = query.start_key().unwrap();
        assert_eq!(next["sk"], AttributeValue::S("e1".into()));
    }

    #[tokio::test]
    async fn all_scans_without_a_fixed_partition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("Scan").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Items": [
                    {"schema": {"S": "User"}, "id": {"S": "u1"}},
                    {"schema": {"S": "Event"}, "id": {"S": "e1"}}
                ],
                "Count": 2,
                "ScannedCount": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let table = table();
        let response = client(&server).all(&table, None, None, 100, None).await.unwrap();
        assert_eq!(response.to_string(), "DR ok with 2 items");
        assert_eq!(response.count, 2);
    }

    #[tokio::test]
    async fn auto_increment_inserts_a_missing_counter_item() {
        let server = MockServer::start().await;
        let updates = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("UpdateItem").as_str()))
            .respond_with(move |_: &Request| {
                if updates.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(400).set_body_string(CONDITIONAL_FAILED)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"Attributes": {"counter": {"N": "1"}}}))
                }
            })
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("PutItem").as_str()))
            .and(body_partial_json(json!({
                "Item": {"pk": {"S": "user#u1"}, "sk": {"S": "user"}, "schema": {"S": "User"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let table = table();
        let next = client(&server)
            .auto_increment(&table, "User", "counter", &record(json!({"id": "u1"})), false)
            .await
            .unwrap();
        assert_eq!(next, Some(1));
    }

    #[tokio::test]
    async fn table_administration_errors_are_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("CreateTable").as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceInUseException","message":"Table already exists: sample"}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("DeleteTable").as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ValidationException","message":"Resource cannot be deleted as it is currently protected against deletion. Disable deletion protection first."}"#,
            ))
            .mount(&server)
            .await;

        let table = table();
        let client = client(&server);
        let created = client.table_create(&table).await.unwrap_err();
        assert!(matches!(created, DynoError::AlreadyExists(_)));
        let deleted = client.table_delete(&table).await.unwrap_err();
        assert!(matches!(deleted, DynoError::DeleteProtected(ref name) if name == "sample"));
    }

    #[tokio::test]
    async fn time_to_live_requires_a_datetime_attribute() {
        let server = MockServer::start().await;
        let table = table();
        let err = client(&server)
            .set_time_to_live(&table, "age", true)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn list_tables_follows_pages() {
        let server = MockServer::start().await;
        let calls = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("ListTables").as_str()))
            .respond_with(move |_: &Request| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"TableNames": ["a", "b"], "LastEvaluatedTableName": "b"}))
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"TableNames": ["c"]}))
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let names = client(&server).list_tables().await.unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn transaction_cancellation_keeps_reasons() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("TransactWriteItems").as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#TransactionCanceledException","Message":"Transaction cancelled","CancellationReasons":[{"Code":"ConditionalCheckFailed"}]}"#,
            ))
            .mount(&server)
            .await;

        let table = table();
        let mut transaction = Transaction::new();
        transaction
            .condition_check(&table, "User", &record(json!({"id": "u1"})), &Filter::new().exists("age"))
            .unwrap();
        let err = client(&server).transact(&transaction).await.unwrap_err();
        match err {
            DynoError::TransactionCanceled { reasons, .. } => assert_eq!(reasons, vec!["ConditionalCheckFailed"]),
            other => panic!("expected TransactionCanceled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_returns_new_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("UpdateItem").as_str()))
            .and(body_partial_json(json!({"ReturnValues": "UPDATED_NEW"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Attributes": {"age": {"N": "42"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let table = table();
        let mut update = Update::new(&table, "User", &record(json!({"id": "u1"}))).unwrap();
        update.set(&record(json!({"age": 42}))).unwrap();
        let response = client(&server).update(&update).await.unwrap();
        assert_eq!(response.record().unwrap()["age"], json!(42));
    }

    #[tokio::test]
    async fn fetch_returns_the_first_match() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", target("Query").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Items": [], "Count": 0})))
            .mount(&server)
            .await;

        let table = table();
        let found = client(&server)
            .fetch(&table, "User", None, &record(json!({"id": "u9"})))
            .await
            .unwrap();
        assert_eq!(found, None);
    }
}
