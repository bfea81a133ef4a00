//! Table declarations and everything derived from them.

use std::collections::BTreeSet;
use std::iter;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::attribute::{Attribute, AttributeError, AttributeKind, json_kind};
use crate::definition::RawTable;
use crate::filter::{ExpressionState, Filter};
use crate::index::GlobalIndex;
use crate::key::{KeyAttributes, KeyFormat, TableKey};
use crate::request::{
    AttributeDefinition, BillingMode, CreateTableRequest, DeleteTableRequest,
    DescribeTableRequest, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProvisionedThroughput, ReturnConsumedCapacity, ReturnValues, TableClass,
    TimeToLiveSpecification, UpdateItemRequest, UpdateTableRequest, UpdateTimeToLiveRequest,
};
use crate::schema::Schema;
use crate::value::{AttributeValue, DataType, Item, Record, decode_base64, encode_base64, number_to_json};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("table name is required")]
    EmptyName,
    #[error("table key attribute names must be non-empty")]
    EmptyKey,
    #[error("table key sk must differ from pk ('{0}')")]
    DuplicateKey(String),
    #[error("global index '{0}' is declared more than once")]
    DuplicateIndex(String),
    #[error("global index '{index}' key '{attribute}' collides with another key attribute")]
    IndexKeyCollision { index: String, attribute: String },
    #[error("schema '{0}' is declared more than once")]
    DuplicateSchema(String),
    #[error("schema '{0}' key templates must be non-empty")]
    EmptySchemaKey(String),
    #[error("schema '{schema}' references unknown global index '{index}'")]
    UnknownSchemaIndex { schema: String, index: String },
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),
    #[error("unknown global index '{0}'")]
    UnknownIndex(String),
    #[error("schema '{schema}' has no key format for global index '{index}'")]
    MissingIndexFormat { schema: String, index: String },
    #[error("unknown auto-increment '{schema}.{name}'")]
    UnknownAutoIncrement { schema: String, name: String },
    #[error("one or more key values of '{0}' are not available")]
    IncompleteKey(String),
    #[error("attribute '{name}': {source}")]
    Attribute {
        name: String,
        #[source]
        source: AttributeError,
    },
    #[error("no datetime attribute named '{0}'")]
    NotDateTime(String),
    #[error("a schema is required for this operation")]
    SchemaRequired,
    #[error("query requires a partition key value")]
    MissingPartition,
    #[error("update has no statements")]
    EmptyUpdate,
    #[error("transaction has no items")]
    EmptyTransaction,
    #[error("transaction has {count} items; the limit is {limit}")]
    TooManyItems { count: usize, limit: usize },
}

impl TableError {
    pub(crate) fn attribute(name: impl Into<String>, source: AttributeError) -> Self {
        TableError::Attribute {
            name: name.into(),
            source,
        }
    }
}

/// Capacity mode of a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Billing {
    #[default]
    PayPerRequest,
    Provisioned { read: u64, write: u64 },
}

/// A declared table: key, indexes and the schemas stored in it.
///
/// Deserializes from a `[[tables]]` definition, validated on the way in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    name: String,
    schema_field: Option<String>,
    key: TableKey,
    indexes: Vec<GlobalIndex>,
    deletion_protection: bool,
    table_class: TableClass,
    billing: Billing,
    schemas: Vec<Schema>,
}

impl Table {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_field: Some("schema".to_string()),
            key: TableKey::default(),
            indexes: Vec::new(),
            deletion_protection: true,
            table_class: TableClass::Standard,
            billing: Billing::PayPerRequest,
            schemas: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: TableKey) -> Self {
        self.key = key;
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: GlobalIndex) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Name of the attribute tagging each record with its schema; `None`
    /// stores untagged records.
    #[must_use]
    pub fn with_schema_field(mut self, field: Option<String>) -> Self {
        self.schema_field = field;
        self
    }

    #[must_use]
    pub fn with_deletion_protection(mut self, enabled: bool) -> Self {
        self.deletion_protection = enabled;
        self
    }

    #[must_use]
    pub fn with_table_class(mut self, class: TableClass) -> Self {
        self.table_class = class;
        self
    }

    #[must_use]
    pub fn with_billing(mut self, billing: Billing) -> Self {
        self.billing = billing;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema_field(&self) -> Option<&str> {
        self.schema_field.as_deref()
    }

    #[must_use]
    pub fn key(&self) -> &TableKey {
        &self.key
    }

    #[must_use]
    pub fn indexes(&self) -> &[GlobalIndex] {
        &self.indexes
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&GlobalIndex> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    #[must_use]
    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|schema| schema.name() == name)
    }

    #[must_use]
    pub fn deletion_protection(&self) -> bool {
        self.deletion_protection
    }

    #[must_use]
    pub fn billing(&self) -> Billing {
        self.billing
    }

    pub(crate) fn require_schema(&self, name: &str) -> Result<&Schema, TableError> {
        self.schema(name)
            .ok_or_else(|| TableError::UnknownSchema(name.to_string()))
    }

    /// Check the declaration for naming conflicts and dangling references.
    pub fn validate(&self) -> Result<(), TableError> {
        if self.name.trim().is_empty() {
            return Err(TableError::EmptyName);
        }
        if self.key.pk().is_empty() || self.key.sk().is_empty() {
            return Err(TableError::EmptyKey);
        }
        if self.key.pk() == self.key.sk() {
            return Err(TableError::DuplicateKey(self.key.sk().to_string()));
        }

        let mut key_names: BTreeSet<&str> = BTreeSet::from([self.key.pk(), self.key.sk()]);
        let mut index_names = BTreeSet::new();
        for index in &self.indexes {
            if !index_names.insert(index.name()) {
                return Err(TableError::DuplicateIndex(index.name().to_string()));
            }
            for attribute in [index.pk(), index.sk()] {
                if !key_names.insert(attribute) {
                    return Err(TableError::IndexKeyCollision {
                        index: index.name().to_string(),
                        attribute: attribute.to_string(),
                    });
                }
            }
        }

        let mut schema_names = BTreeSet::new();
        for schema in &self.schemas {
            if !schema_names.insert(schema.name()) {
                return Err(TableError::DuplicateSchema(schema.name().to_string()));
            }
            if schema.key().pk().is_empty() || schema.key().sk().is_empty() {
                return Err(TableError::EmptySchemaKey(schema.name().to_string()));
            }
            for format in schema.indexes() {
                if !index_names.contains(format.name()) {
                    return Err(TableError::UnknownSchemaIndex {
                        schema: schema.name().to_string(),
                        index: format.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve a (schema, index) pair against this table.
    pub fn link(&self, schema: Option<&str>, index: Option<&str>) -> Result<TableLink<'_>, TableError> {
        let schema = schema.map(|name| self.require_schema(name)).transpose()?;
        let index = index
            .map(|name| {
                self.index(name)
                    .ok_or_else(|| TableError::UnknownIndex(name.to_string()))
            })
            .transpose()?;
        Ok(TableLink {
            table: self,
            schema,
            index,
        })
    }

    /// Attribute names that may be written or read for a schema/index pair.
    ///
    /// Without a schema every schema's attributes are allowed; without an
    /// index every index's key attributes are.
    #[must_use]
    pub fn allow_list<'t>(
        &'t self,
        schema: Option<&'t Schema>,
        index: Option<&'t GlobalIndex>,
        nested: bool,
    ) -> AllowList<'t> {
        let mut allow = AllowList::default();
        allow.insert(self.key.pk(), self.key.pk_type(), None);
        allow.insert(self.key.sk(), self.key.sk_type(), None);

        for gsi in &self.indexes {
            if index.is_some_and(|wanted| wanted.name() != gsi.name()) {
                continue;
            }
            allow.insert(gsi.pk(), gsi.pk_type(), None);
            allow.insert(gsi.sk(), gsi.sk_type(), None);
        }

        if let Some(field) = &self.schema_field {
            allow.insert(field, DataType::String, None);
        }

        for candidate in &self.schemas {
            if schema.is_some_and(|wanted| wanted.name() != candidate.name()) {
                continue;
            }
            for (name, attribute) in candidate.attribute_list(nested) {
                allow.insert(&name, attribute.data_type(), Some(attribute));
            }
        }
        allow
    }

    /// Produce the stored plain record for a schema.
    ///
    /// Tags the schema, normalises each allowed attribute, then renders the
    /// table key (required) and each index key the schema can render.
    pub fn write_value(
        &self,
        record: &Record,
        schema: &str,
        index: Option<&str>,
        include_readonly: bool,
    ) -> Result<Record, TableError> {
        let link = self.link(Some(schema), index)?;
        let schema = link.schema.ok_or(TableError::SchemaRequired)?;
        let allow = self.allow_list(Some(schema), link.index, false);

        let mut result = Record::new();
        if let Some(field) = &self.schema_field {
            result.insert(field.clone(), Value::String(schema.name().to_string()));
        }

        for (name, allowed) in allow.iter() {
            let Some(attribute) = allowed.attribute else {
                continue;
            };
            if attribute.is_readonly() && !include_readonly {
                continue;
            }
            if !attribute.always() && !record.contains_key(name) {
                continue;
            }
            let value = attribute
                .write_value(record.get(name))
                .map_err(|e| TableError::attribute(name, e))?;
            result.insert(name.to_string(), value);
        }

        let format = schema.key();
        let (Some(pk), Some(sk)) = (format.format_pk(&result), format.format_sk(&result)) else {
            return Err(TableError::IncompleteKey(schema.name().to_string()));
        };
        result.insert(self.key.pk().to_string(), key_plain(self.key.pk_type(), pk));
        result.insert(self.key.sk().to_string(), key_plain(self.key.sk_type(), sk));

        for gsi in &self.indexes {
            if link.index.is_some_and(|wanted| wanted.name() != gsi.name()) {
                continue;
            }
            let Some(format) = schema.index(gsi.name()) else {
                continue;
            };
            let format = format.format();
            if let (Some(pk), Some(sk)) = (format.format_pk(&result), format.format_sk(&result)) {
                result.insert(gsi.pk().to_string(), key_plain(gsi.pk_type(), pk));
                result.insert(gsi.sk().to_string(), key_plain(gsi.sk_type(), sk));
            }
        }
        Ok(result)
    }

    /// Encode a plain record into a wire item, dropping undeclared fields.
    pub fn encode(&self, record: &Record, schema: Option<&str>) -> Result<Item, TableError> {
        let schema = schema.map(|name| self.require_schema(name)).transpose()?;
        let allow = self.allow_list(schema, None, false);
        let mut item = Item::new();
        for (name, value) in record {
            let Some(allowed) = allow.get(name) else {
                continue;
            };
            let encoded = match allowed.attribute {
                Some(attribute) => attribute.encode(value),
                None => key_wire(allowed.data_type, value),
            }
            .map_err(|e| TableError::attribute(name.as_str(), e))?;
            item.insert(name.clone(), encoded);
        }
        Ok(item)
    }

    /// The table key item a schema renders for a record.
    pub fn key_item(&self, schema: &Schema, record: &Record) -> Result<Item, TableError> {
        schema
            .key()
            .write(&self.key, record)
            .ok_or_else(|| TableError::IncompleteKey(schema.name().to_string()))
    }

    /// Increment a schema counter stored on the record's item.
    ///
    /// Sets `name = if_not_exists(name, start) + step` (or `start + step` on
    /// reset) on an existing item and returns the new value.
    pub fn auto_increment_request(
        &self,
        record: &Record,
        schema: &str,
        name: &str,
        reset: bool,
    ) -> Result<UpdateItemRequest, TableError> {
        let schema = self.require_schema(schema)?;
        let counter = schema
            .auto_increment(name)
            .ok_or_else(|| TableError::UnknownAutoIncrement {
                schema: schema.name().to_string(),
                name: name.to_string(),
            })?;
        let key = self.key_item(schema, record)?;

        let mut state = ExpressionState::new();
        let field = state.alias(name);
        let start = state.value(counter.start());
        let step = state.value(counter.step());
        let update_expression = if reset {
            format!("SET {field} = {start} + {step}")
        } else {
            format!("SET {field} = if_not_exists({field}, {start}) + {step}")
        };
        let condition_expression = Filter::new().exists(self.key.pk()).write(&mut state);
        let (names, values) = state.into_parts();

        Ok(UpdateItemRequest {
            table_name: self.name.clone(),
            key,
            update_expression,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: Some(ReturnValues::UpdatedNew),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }

    #[must_use]
    pub fn create_table_request(&self) -> CreateTableRequest {
        let provisioned = match self.billing {
            Billing::PayPerRequest => None,
            Billing::Provisioned { read, write } => Some(ProvisionedThroughput {
                read_capacity_units: read,
                write_capacity_units: write,
            }),
        };

        let mut attribute_definitions = Vec::with_capacity(2 + self.indexes.len() * 2);
        for key in iter::once(&self.key as &dyn KeyAttributes)
            .chain(self.indexes.iter().map(|gsi| gsi as &dyn KeyAttributes))
        {
            attribute_definitions.push(AttributeDefinition {
                attribute_name: key.pk().to_string(),
                attribute_type: key.pk_type(),
            });
            attribute_definitions.push(AttributeDefinition {
                attribute_name: key.sk().to_string(),
                attribute_type: key.sk_type(),
            });
        }

        let global_secondary_indexes = self
            .indexes
            .iter()
            .map(|gsi| GlobalSecondaryIndex {
                index_name: gsi.name().to_string(),
                key_schema: key_schema(gsi),
                projection: Projection::all(),
                provisioned_throughput: provisioned.map(|_| ProvisionedThroughput {
                    read_capacity_units: gsi.read_units(),
                    write_capacity_units: gsi.write_units(),
                }),
            })
            .collect();

        CreateTableRequest {
            table_name: self.name.clone(),
            attribute_definitions,
            key_schema: key_schema(&self.key),
            billing_mode: match self.billing {
                Billing::PayPerRequest => BillingMode::PayPerRequest,
                Billing::Provisioned { .. } => BillingMode::Provisioned,
            },
            table_class: self.table_class,
            deletion_protection_enabled: self.deletion_protection,
            provisioned_throughput: provisioned,
            global_secondary_indexes,
        }
    }

    #[must_use]
    pub fn delete_table_request(&self) -> DeleteTableRequest {
        DeleteTableRequest {
            table_name: self.name.clone(),
        }
    }

    #[must_use]
    pub fn describe_table_request(&self) -> DescribeTableRequest {
        DescribeTableRequest {
            table_name: self.name.clone(),
        }
    }

    #[must_use]
    pub fn protect_request(&self, enabled: bool) -> UpdateTableRequest {
        UpdateTableRequest {
            table_name: self.name.clone(),
            deletion_protection_enabled: Some(enabled),
        }
    }

    /// Enable or disable expiry on a datetime attribute of any schema.
    pub fn time_to_live_request(
        &self,
        attribute: &str,
        enable: bool,
    ) -> Result<UpdateTimeToLiveRequest, TableError> {
        let declared = self.schemas.iter().any(|schema| {
            schema
                .attributes()
                .get(attribute)
                .is_some_and(|a| matches!(a.kind(), AttributeKind::DateTime { .. }))
        });
        if !declared {
            return Err(TableError::NotDateTime(attribute.to_string()));
        }
        Ok(UpdateTimeToLiveRequest {
            table_name: self.name.clone(),
            time_to_live_specification: TimeToLiveSpecification {
                attribute_name: attribute.to_string(),
                enabled: enable,
            },
        })
    }
}

fn key_schema(key: &dyn KeyAttributes) -> Vec<KeySchemaElement> {
    vec![
        KeySchemaElement {
            attribute_name: key.pk().to_string(),
            key_type: KeyType::Hash,
        },
        KeySchemaElement {
            attribute_name: key.sk().to_string(),
            key_type: KeyType::Range,
        },
    ]
}

/// Plain form of rendered key text.
pub(crate) fn key_plain(data_type: DataType, text: String) -> Value {
    match data_type {
        DataType::Number => number_to_json(&text),
        DataType::Bytes => Value::String(encode_base64(text.as_bytes())),
        _ => Value::String(text),
    }
}

/// Wire form of a plain key value.
pub(crate) fn key_wire(data_type: DataType, value: &Value) -> Result<AttributeValue, AttributeError> {
    match (data_type, value) {
        (_, Value::Null) => Ok(AttributeValue::null()),
        (DataType::Number, Value::Number(n)) => Ok(AttributeValue::N(n.to_string())),
        (DataType::Number, Value::String(s)) => match number_to_json(s) {
            Value::Number(n) => Ok(AttributeValue::N(n.to_string())),
            _ => Err(AttributeError::InvalidNumber(s.clone())),
        },
        (DataType::Bytes, Value::String(s)) => decode_base64(s)
            .map(AttributeValue::B)
            .map_err(|e| AttributeError::InvalidBase64(e.to_string())),
        (DataType::String, Value::String(s)) => Ok(AttributeValue::S(s.clone())),
        (DataType::String, Value::Number(n)) => Ok(AttributeValue::S(n.to_string())),
        (_, other) => Err(AttributeError::WrongType {
            expected: "key value",
            found: json_kind(other),
        }),
    }
}

/// One entry of an [`AllowList`].
#[derive(Debug, Clone, Copy)]
pub struct Allowed<'t> {
    pub data_type: DataType,
    pub attribute: Option<&'t Attribute>,
}

/// Ordered attribute names with their wire type and declaration.
#[derive(Debug, Clone, Default)]
pub struct AllowList<'t> {
    entries: Vec<(String, Allowed<'t>)>,
}

impl<'t> AllowList<'t> {
    fn insert(&mut self, name: &str, data_type: DataType, attribute: Option<&'t Attribute>) {
        let allowed = Allowed {
            data_type,
            attribute,
        };
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| existing == name) {
            slot.1 = allowed;
        } else {
            self.entries.push((name.to_string(), allowed));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Allowed<'t>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, allowed)| allowed)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Allowed<'t>)> {
        self.entries.iter().map(|(name, allowed)| (name.as_str(), allowed))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A table resolved together with an optional schema and index.
#[derive(Debug, Clone, Copy)]
pub struct TableLink<'t> {
    table: &'t Table,
    schema: Option<&'t Schema>,
    index: Option<&'t GlobalIndex>,
}

impl<'t> TableLink<'t> {
    #[must_use]
    pub fn table(&self) -> &'t Table {
        self.table
    }

    #[must_use]
    pub fn schema(&self) -> Option<&'t Schema> {
        self.schema
    }

    #[must_use]
    pub fn index(&self) -> Option<&'t GlobalIndex> {
        self.index
    }

    /// Key attributes addressed by this link: the index key, else the table key.
    #[must_use]
    pub fn key(&self) -> &'t dyn KeyAttributes {
        match self.index {
            Some(index) => index as &dyn KeyAttributes,
            None => &self.table.key,
        }
    }

    /// The schema's template for the addressed key.
    #[must_use]
    pub fn key_format(&self) -> Option<&'t KeyFormat> {
        let schema = self.schema?;
        match self.index {
            Some(index) => schema.index(index.name()).map(|format| format.format()),
            None => Some(schema.key()),
        }
    }

    #[must_use]
    pub fn allow_list(&self, nested: bool) -> AllowList<'t> {
        self.table.allow_list(self.schema, self.index, nested)
    }
}
