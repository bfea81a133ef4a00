use anyhow::{Context as _, Result, anyhow, bail};
use dyno_client::{ConnectConfig, DynoClient, DynoResponse};
use dyno_config::DynoConfig;
use dyno_types::{Item, PutOptions, Query, Record, Table};
use serde_json::{Value, json};

use crate::{Command, Page, TableCommand, Target};

pub(crate) async fn run(command: Command, config: &DynoConfig, endpoint: Option<&str>) -> Result<Value> {
    if let Command::Table {
        command: TableCommand::Validate { table },
    } = &command
    {
        return validate(config, table.as_deref());
    }

    let client = connect(config, endpoint)?;
    tracing::debug!(connection = %client.config(), "Connected");

    match command {
        Command::Tables => Ok(json!(client.list_tables().await?)),
        Command::Table { command } => table_command(&client, config, command).await,
        Command::Put {
            target,
            record,
            insert,
            ignore_gsi,
        } => {
            let table = declared(config, &target.table)?;
            let record = parse_record(&record)?;
            let response = if insert {
                client.insert(table, &target.schema, &record).await?
            } else {
                let options = PutOptions {
                    ignore_gsi,
                    ..PutOptions::default()
                };
                client.put_item(table, &target.schema, &record, options).await?
            };
            Ok(response.to_json())
        }
        Command::Get { target, key } => {
            let table = declared(config, &target.table)?;
            let response = client.get_item(table, &target.schema, &parse_record(&key)?).await?;
            Ok(response.to_json())
        }
        Command::Delete { target, key } => {
            let table = declared(config, &target.table)?;
            let response = client.delete_item(table, &target.schema, &parse_record(&key)?).await?;
            Ok(response.to_json())
        }
        Command::Query { page, key } => {
            let table = declared(config, &page.table)?;
            let mut query = page_query(table, &page)?;
            if let Some(key) = key {
                query.apply_key(&parse_record(&key)?)?;
            }
            let response = client.query(&mut query).await?;
            Ok(page_json(&response))
        }
        Command::Scan { page } => {
            let table = declared(config, &page.table)?;
            let mut query = page_query(table, &page)?;
            let response = client.scan(&mut query).await?;
            Ok(page_json(&response))
        }
        Command::NextId {
            target,
            name,
            key,
            reset,
        } => {
            let table = declared(config, &target.table)?;
            let next = client
                .auto_increment(table, &target.schema, &name, &parse_record(&key)?, reset)
                .await?;
            Ok(json!(next))
        }
    }
}

async fn table_command(client: &DynoClient, config: &DynoConfig, command: TableCommand) -> Result<Value> {
    let response = match command {
        TableCommand::Create { table } => client.table_create(declared(config, &table)?).await?,
        TableCommand::Delete { table } => client.table_delete(declared(config, &table)?).await?,
        TableCommand::Describe { table } => return Ok(client.describe_table(&table).await?),
        TableCommand::Protect { table, off } => client.table_protect(declared(config, &table)?, !off).await?,
        TableCommand::Ttl {
            table,
            attribute,
            disable,
        } => {
            client
                .set_time_to_live(declared(config, &table)?, &attribute, !disable)
                .await?
        }
        TableCommand::Validate { table } => return validate(config, table.as_deref()),
    };
    Ok(response.table.unwrap_or_else(|| json!({"ok": true})))
}

fn validate(config: &DynoConfig, name: Option<&str>) -> Result<Value> {
    let tables: Vec<&Table> = match name {
        Some(name) => vec![declared(config, name)?],
        None => config.tables.iter().collect(),
    };
    let mut report = Vec::with_capacity(tables.len());
    for table in tables {
        table
            .validate()
            .with_context(|| format!("table '{}'", table.name()))?;
        report.push(json!({
            "table": table.name(),
            "schemas": table.schemas().iter().map(|s| s.name()).collect::<Vec<_>>(),
            "indexes": table.indexes().iter().map(|i| i.name()).collect::<Vec<_>>(),
        }));
    }
    Ok(Value::Array(report))
}

fn connect(config: &DynoConfig, endpoint: Option<&str>) -> Result<DynoClient> {
    let connect = match endpoint {
        Some(endpoint) => ConnectConfig::local(Some(endpoint))?,
        None => config.connect_config()?,
    };
    Ok(DynoClient::new(connect).with_retry(config.retry_config()))
}

fn declared<'c>(config: &'c DynoConfig, name: &str) -> Result<&'c Table> {
    config
        .table(name)
        .ok_or_else(|| anyhow!("table '{name}' is not declared in the config"))
}

fn parse_record(text: &str) -> Result<Record> {
    match serde_json::from_str(text).context("record is not valid JSON")? {
        Value::Object(record) => Ok(record),
        other => bail!("expected a JSON object, got {other}"),
    }
}

fn page_query<'t>(table: &'t Table, page: &Page) -> Result<Query<'t>> {
    let start = page
        .start
        .as_deref()
        .map(serde_json::from_str::<Item>)
        .transpose()
        .context("--start is not a valid key")?;
    Ok(Query::new(table, page.schema.as_deref(), page.index.as_deref())?
        .with_limit(page.limit)
        .with_start_key(start))
}

fn page_json(response: &DynoResponse) -> Value {
    json!({
        "items": response.to_json(),
        "count": response.count,
        "scanned": response.scanned,
        "consumed": response.consumed,
        "last_evaluated_key": response.last_evaluated_key,
    })
}
