//! Update builder for one item of a schema.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::attribute::Attribute;
use crate::filter::{ExpressionState, Filter};
use crate::key::KeyAttributes;
use crate::request::{ReturnConsumedCapacity, ReturnValues, UpdateItemRequest};
use crate::schema::Schema;
use crate::table::{Table, TableError, TableLink};
use crate::value::{AttributeValue, Item, Record};

/// Statements against the item a key record addresses.
///
/// Unless [`Update::upsert`] is set the item must already exist.
#[derive(Debug, Clone)]
pub struct Update<'t> {
    link: TableLink<'t>,
    schema: &'t Schema,
    key_record: Record,
    key: Item,
    written: Record,
    set: Vec<(String, AttributeValue)>,
    increments: Vec<(String, i64)>,
    add: Vec<(String, AttributeValue)>,
    remove: Vec<String>,
    delete: Vec<(String, AttributeValue)>,
    custom_set: Vec<String>,
    custom_add: Vec<String>,
    custom_remove: Vec<String>,
    custom_delete: Vec<String>,
    condition: Filter,
    upsert: bool,
}

impl<'t> Update<'t> {
    /// Address the item whose table key the schema renders from `key_record`.
    pub fn new(table: &'t Table, schema: &str, key_record: &Record) -> Result<Self, TableError> {
        let link = table.link(Some(schema), None)?;
        let schema = link.schema().ok_or(TableError::SchemaRequired)?;
        let key = table.key_item(schema, key_record)?;
        Ok(Self {
            link,
            schema,
            key_record: key_record.clone(),
            key,
            written: Record::new(),
            set: Vec::new(),
            increments: Vec::new(),
            add: Vec::new(),
            remove: Vec::new(),
            delete: Vec::new(),
            custom_set: Vec::new(),
            custom_add: Vec::new(),
            custom_remove: Vec::new(),
            custom_delete: Vec::new(),
            condition: Filter::new(),
            upsert: false,
        })
    }

    #[must_use]
    pub fn link(&self) -> &TableLink<'t> {
        &self.link
    }

    #[must_use]
    pub fn key(&self) -> &Item {
        &self.key
    }

    /// Names that address the item and so cannot be changed by an update.
    fn locked(&self) -> BTreeSet<&str> {
        let table = self.link.table();
        let mut locked: BTreeSet<&str> = BTreeSet::from([table.key().pk(), table.key().sk()]);
        for index in table.indexes() {
            locked.insert(index.pk());
            locked.insert(index.sk());
        }
        if let Some(field) = table.schema_field() {
            locked.insert(field);
        }
        let format = self.schema.key();
        locked.extend(format.pk().fields());
        locked.extend(format.sk().fields());
        locked
    }

    /// Declared, writable attributes present in `record`.
    fn writable<'r>(&self, record: &'r Record) -> Vec<(&'t str, &'t Attribute, &'r Value)> {
        let locked = self.locked();
        self.schema
            .attributes()
            .iter()
            .filter(|(name, attribute)| !attribute.is_readonly() && !locked.contains(name))
            .filter_map(|(name, attribute)| record.get(name).map(|value| (name, attribute, value)))
            .collect()
    }

    /// SET every declared attribute present in `record`.
    ///
    /// Maps are replaced whole: a stored map may be NULL or absent, and
    /// DynamoDB rejects a member path under a missing parent.
    pub fn set(&mut self, record: &Record) -> Result<(), TableError> {
        for (name, attribute, value) in self.writable(record) {
            let plain = attribute
                .write_value(Some(value))
                .map_err(|e| TableError::attribute(name, e))?;
            let encoded = attribute
                .encode(&plain)
                .map_err(|e| TableError::attribute(name, e))?;
            self.set.push((name.to_string(), encoded));
            self.written.insert(name.to_string(), plain);
        }
        Ok(())
    }

    /// ADD numbers or set elements.
    pub fn add(&mut self, record: &Record) -> Result<(), TableError> {
        for (name, attribute, value) in self.writable(record) {
            let encoded = attribute
                .write_encode(Some(value))
                .map_err(|e| TableError::attribute(name, e))?;
            if !encoded.is_null() {
                self.add.push((name.to_string(), encoded));
            }
        }
        Ok(())
    }

    /// REMOVE attributes; names addressing the item are ignored.
    pub fn remove<S: AsRef<str>>(&mut self, names: impl IntoIterator<Item = S>) {
        let locked: BTreeSet<String> = self.locked().into_iter().map(str::to_string).collect();
        for name in names {
            let name = name.as_ref();
            let top = name.split('.').next().unwrap_or(name);
            if !locked.contains(top) {
                self.remove.push(name.to_string());
            }
        }
    }

    /// DELETE elements from set attributes.
    pub fn delete(&mut self, record: &Record) -> Result<(), TableError> {
        for (name, attribute, value) in self.writable(record) {
            let encoded = attribute
                .write_encode(Some(value))
                .map_err(|e| TableError::attribute(name, e))?;
            if !encoded.is_null() {
                self.delete.push((name.to_string(), encoded));
            }
        }
        Ok(())
    }

    /// `field = if_not_exists(field, 0) + step`.
    pub fn increment(&mut self, field: impl Into<String>, step: i64) {
        self.increments.push((field.into(), step));
    }

    pub fn custom_set(&mut self, statement: impl Into<String>) {
        self.custom_set.push(statement.into());
    }

    pub fn custom_add(&mut self, statement: impl Into<String>) {
        self.custom_add.push(statement.into());
    }

    pub fn custom_remove(&mut self, statement: impl Into<String>) {
        self.custom_remove.push(statement.into());
    }

    pub fn custom_delete(&mut self, statement: impl Into<String>) {
        self.custom_delete.push(statement.into());
    }

    /// Extra condition ANDed with the existence check.
    #[must_use]
    pub fn with_condition(mut self, condition: Filter) -> Self {
        self.condition = condition;
        self
    }

    /// Create the item when it does not exist. The created item carries the
    /// schema tag like one written by a put.
    #[must_use]
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.increments.is_empty()
            && self.add.is_empty()
            && self.remove.is_empty()
            && self.delete.is_empty()
            && self.custom_set.is_empty()
            && self.custom_add.is_empty()
            && self.custom_remove.is_empty()
            && self.custom_delete.is_empty()
    }

    /// Index keys the schema renders from the key record and the SET values.
    fn index_keys(&self) -> Vec<(String, AttributeValue)> {
        if self.written.is_empty() {
            return Vec::new();
        }
        let mut merged = self.key_record.clone();
        merged.extend(self.written.clone());

        let mut keys = Vec::new();
        for index in self.link.table().indexes() {
            let Some(format) = self.schema.index(index.name()) else {
                continue;
            };
            let format = format.format();
            if let (Some(pk), Some(sk)) = (format.format_pk(&merged), format.format_sk(&merged)) {
                keys.push((index.pk().to_string(), AttributeValue::key(index.pk_type(), pk)));
                keys.push((index.sk().to_string(), AttributeValue::key(index.sk_type(), sk)));
            }
        }
        keys
    }

    /// Always-replaced attributes not already SET.
    fn replacements(&self) -> Result<Vec<(String, AttributeValue)>, TableError> {
        let mut out = Vec::new();
        for (name, attribute) in self.schema.attributes().iter() {
            if !attribute.replaces() || self.written.contains_key(name) {
                continue;
            }
            let encoded = attribute
                .write_encode(None)
                .map_err(|e| TableError::attribute(name, e))?;
            out.push((name.to_string(), encoded));
        }
        Ok(out)
    }

    pub fn build(&self) -> Result<UpdateItemRequest, TableError> {
        if self.is_empty() {
            return Err(TableError::EmptyUpdate);
        }

        let mut state = ExpressionState::new();
        let mut set: Vec<String> = Vec::new();
        for (path, value) in &self.set {
            let name = state.path(path);
            let placeholder = state.value(value.clone());
            set.push(format!("{name} = {placeholder}"));
        }
        for (field, step) in &self.increments {
            let name = state.path(field);
            let zero = state.value(0_i64);
            let step = state.value(*step);
            set.push(format!("{name} = if_not_exists({name}, {zero}) + {step}"));
        }
        for (field, value) in self.replacements()?.into_iter().chain(self.index_keys()) {
            let name = state.alias(&field);
            let placeholder = state.value(value);
            set.push(format!("{name} = {placeholder}"));
        }
        if self.upsert
            && let Some(field) = self.link.table().schema_field()
        {
            let name = state.alias(field);
            let placeholder = state.value(AttributeValue::S(self.schema.name().to_string()));
            set.push(format!("{name} = {placeholder}"));
        }
        set.extend(self.custom_set.iter().cloned());

        let mut add: Vec<String> = Vec::new();
        for (path, value) in &self.add {
            let name = state.path(path);
            let placeholder = state.value(value.clone());
            add.push(format!("{name} {placeholder}"));
        }
        add.extend(self.custom_add.iter().cloned());

        let mut remove: Vec<String> = self.remove.iter().map(|path| state.path(path)).collect();
        remove.extend(self.custom_remove.iter().cloned());

        let mut delete: Vec<String> = Vec::new();
        for (path, value) in &self.delete {
            let name = state.path(path);
            let placeholder = state.value(value.clone());
            delete.push(format!("{name} {placeholder}"));
        }
        delete.extend(self.custom_delete.iter().cloned());

        let update_expression = [("SET", set), ("ADD", add), ("REMOVE", remove), ("DELETE", delete)]
            .into_iter()
            .filter(|(_, statements)| !statements.is_empty())
            .map(|(action, statements)| format!("{action} {}", statements.join(", ")))
            .collect::<Vec<_>>()
            .join(" ");

        let key = self.link.table().key();
        let condition = if self.upsert {
            Filter::new()
        } else {
            Filter::new().exists(key.pk()).exists(key.sk())
        };
        let condition_expression = condition.and(self.condition.clone()).write(&mut state);
        let (names, values) = state.into_parts();

        Ok(UpdateItemRequest {
            table_name: self.link.table().name().to_string(),
            key: self.key.clone(),
            update_expression,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: Some(ReturnValues::UpdatedNew),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }
}
