//! Declarative table definitions.
//!
//! Raw structs mirror the `[[tables]]` TOML layout and stay private; a
//! [`Table`] is only produced once the whole declaration has been checked.

use std::mem;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::attribute::{Attribute, Attributes, AutoIncrement, Bounds};
use crate::index::{GlobalIndex, GlobalIndexFormat};
use crate::key::{KeyFormat, KeyTemplate, TableKey, TemplateError};
use crate::request::TableClass;
use crate::schema::Schema;
use crate::table::{Billing, Table, TableError};
use crate::value::DataType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("schema '{schema}': {source}")]
    Template {
        schema: String,
        #[source]
        source: TemplateError,
    },
    #[error("attribute '{name}' has unknown type '{kind}'")]
    UnknownType { name: String, kind: String },
    #[error("attribute '{name}' of type '{kind}' needs at least one choice")]
    MissingChoices { name: String, kind: &'static str },
    #[error("attribute '{name}' has an invalid choice {choice}")]
    InvalidChoice { name: String, choice: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawTable {
    name: String,
    /// Empty text stores untagged records.
    schema_field: Option<String>,
    #[serde(default)]
    key: RawKey,
    deletion_protection: Option<bool>,
    table_class: Option<TableClass>,
    read_units: Option<u64>,
    write_units: Option<u64>,
    #[serde(default)]
    indexes: Vec<RawIndex>,
    #[serde(default)]
    schemas: Vec<RawSchema>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKey {
    pk: Option<String>,
    sk: Option<String>,
    pk_type: Option<DataType>,
    sk_type: Option<DataType>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndex {
    name: String,
    pk: Option<String>,
    sk: Option<String>,
    pk_type: Option<DataType>,
    sk_type: Option<DataType>,
    read_units: Option<u64>,
    write_units: Option<u64>,
    unique: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFormat {
    name: String,
    pk: String,
    sk: String,
    #[serde(default)]
    required: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchema {
    name: String,
    pk: String,
    sk: String,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    indexes: Vec<RawFormat>,
    #[serde(default)]
    attributes: Vec<RawAttribute>,
    #[serde(default)]
    auto_increments: Vec<RawAutoIncrement>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutoIncrement {
    name: String,
    #[serde(default)]
    start: i64,
    #[serde(default = "one")]
    step: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAttribute {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    readonly: bool,
    default: Option<Value>,
    #[serde(default)]
    as_text: bool,
    #[serde(default)]
    current: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    gt: Option<f64>,
    ge: Option<f64>,
    lt: Option<f64>,
    le: Option<f64>,
    #[serde(default)]
    choices: Vec<Value>,
    #[serde(default)]
    members: Vec<RawAttribute>,
}

impl RawAttribute {
    fn bounds(&self) -> Bounds {
        Bounds {
            gt: self.gt,
            ge: self.ge,
            lt: self.lt,
            le: self.le,
        }
    }

    fn text_choices(&self, kind: &'static str) -> Result<Vec<String>, DefinitionError> {
        if self.choices.is_empty() {
            return Err(DefinitionError::MissingChoices {
                name: self.name.clone(),
                kind,
            });
        }
        self.choices
            .iter()
            .map(|choice| match choice {
                Value::String(s) => Ok(s.clone()),
                other => Err(DefinitionError::InvalidChoice {
                    name: self.name.clone(),
                    choice: other.to_string(),
                }),
            })
            .collect()
    }

    fn int_choices(&self) -> Result<Vec<i64>, DefinitionError> {
        if self.choices.is_empty() {
            return Err(DefinitionError::MissingChoices {
                name: self.name.clone(),
                kind: "int_enum",
            });
        }
        self.choices
            .iter()
            .map(|choice| {
                choice.as_i64().ok_or_else(|| DefinitionError::InvalidChoice {
                    name: self.name.clone(),
                    choice: choice.to_string(),
                })
            })
            .collect()
    }

    fn into_attribute(mut self) -> Result<(String, Attribute), DefinitionError> {
        let kind = mem::take(&mut self.kind);
        let mut attribute = match kind.as_str() {
            "uuid" => Attribute::uuid(),
            "datetime" if self.current => Attribute::current_datetime(),
            "datetime" => Attribute::datetime(),
            "int" => Attribute::int().bounds(self.bounds()),
            "float" => Attribute::float().bounds(self.bounds()),
            "bool" => Attribute::bool(),
            "bytes" => Attribute::bytes(),
            "string" => {
                let mut string = Attribute::string();
                if let Some(min) = self.min_length {
                    string = string.min_length(min);
                }
                if let Some(max) = self.max_length {
                    string = string.max_length(max);
                }
                string
            }
            "int_enum" => Attribute::int_enum(self.int_choices()?),
            "str_enum" => Attribute::str_enum(self.text_choices("str_enum")?),
            "flag" => Attribute::flag(self.text_choices("flag")?),
            "string_list" => Attribute::string_list(),
            "int_list" => Attribute::int_list(),
            "float_list" => Attribute::float_list(),
            "byte_list" => Attribute::byte_list(),
            "map" | "list" => {
                let members = self
                    .members
                    .into_iter()
                    .map(RawAttribute::into_attribute)
                    .collect::<Result<Attributes, _>>()?;
                if kind == "map" {
                    Attribute::map(members)
                } else {
                    Attribute::list(members)
                }
            }
            _ => {
                return Err(DefinitionError::UnknownType {
                    name: self.name,
                    kind: kind.clone(),
                });
            }
        };
        if self.as_text {
            attribute = attribute.as_text();
        }
        if self.optional {
            attribute = attribute.optional();
        }
        if self.readonly {
            attribute = attribute.readonly();
        }
        if let Some(default) = self.default {
            attribute = attribute.with_default(default);
        }
        Ok((self.name, attribute))
    }
}

fn key_format(schema: &str, pk: &str, sk: &str, required: Vec<String>) -> Result<KeyFormat, DefinitionError> {
    let template = |text: &str| {
        KeyTemplate::new(text).map_err(|source| DefinitionError::Template {
            schema: schema.to_string(),
            source,
        })
    };
    Ok(KeyFormat::new(template(pk)?, template(sk)?).require(required))
}

impl TryFrom<RawSchema> for Schema {
    type Error = DefinitionError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let mut schema = Schema::new(
            raw.name.clone(),
            key_format(&raw.name, &raw.pk, &raw.sk, raw.required)?,
        );
        for index in raw.indexes {
            let format = key_format(&raw.name, &index.pk, &index.sk, index.required)?;
            schema = schema.with_index(GlobalIndexFormat::new(index.name, format));
        }
        for attribute in raw.attributes {
            let (name, attribute) = attribute.into_attribute()?;
            schema = schema.with_attribute(name, attribute);
        }
        for counter in raw.auto_increments {
            schema = schema.with_auto_increment(counter.name, AutoIncrement::new(counter.start, counter.step));
        }
        Ok(schema)
    }
}

impl From<RawIndex> for GlobalIndex {
    fn from(raw: RawIndex) -> Self {
        let mut index = GlobalIndex::new(raw.name.clone());
        if raw.pk.is_some() || raw.sk.is_some() {
            index = index.with_keys(
                raw.pk.unwrap_or_else(|| format!("{}_pk", raw.name)),
                raw.sk.unwrap_or_else(|| format!("{}_sk", raw.name)),
            );
        }
        index = index
            .with_types(
                raw.pk_type.unwrap_or(DataType::String),
                raw.sk_type.unwrap_or(DataType::String),
            )
            .with_units(raw.read_units.unwrap_or(1), raw.write_units.unwrap_or(1));
        if raw.unique == Some(false) {
            index = index.non_unique();
        }
        index
    }
}

impl TryFrom<RawTable> for Table {
    type Error = DefinitionError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let key = TableKey::new(
            raw.key.pk.unwrap_or_else(|| "pk".to_string()),
            raw.key.sk.unwrap_or_else(|| "sk".to_string()),
        )
        .with_types(
            raw.key.pk_type.unwrap_or(DataType::String),
            raw.key.sk_type.unwrap_or(DataType::String),
        );
        let billing = if raw.read_units.is_some() || raw.write_units.is_some() {
            Billing::Provisioned {
                read: raw.read_units.unwrap_or(1).max(1),
                write: raw.write_units.unwrap_or(1).max(1),
            }
        } else {
            Billing::PayPerRequest
        };
        let schema_field = match raw.schema_field {
            None => Some("schema".to_string()),
            Some(field) if field.trim().is_empty() => None,
            Some(field) => Some(field),
        };

        let mut table = Table::new(raw.name)
            .with_key(key)
            .with_schema_field(schema_field)
            .with_deletion_protection(raw.deletion_protection.unwrap_or(true))
            .with_table_class(raw.table_class.unwrap_or_default())
            .with_billing(billing);
        for index in raw.indexes {
            table = table.with_index(index.into());
        }
        for schema in raw.schemas {
            table = table.with_schema(schema.try_into()?);
        }
        table.validate()?;
        Ok(table)
    }
}
