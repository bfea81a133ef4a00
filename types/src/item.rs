//! Single-item request builders.

use crate::filter::{ExpressionState, Filter};
use crate::key::KeyAttributes;
use crate::request::{
    DeleteItemRequest, GetItemRequest, PutItemRequest, ReturnConsumedCapacity, ReturnValues,
};
use crate::table::{Table, TableError};
use crate::value::{AttributeValue, Item, Record};

/// How a put treats global index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOptions {
    /// Strip index key attributes from the input before writing.
    pub ignore_gsi: bool,
    /// Only allow unique index keys of the stored item to be absent or unchanged.
    pub enforce_gsi: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            ignore_gsi: false,
            enforce_gsi: true,
        }
    }
}

impl Table {
    /// Replace an existing item with the full record.
    pub fn put_request(
        &self,
        schema: &str,
        record: &Record,
        options: PutOptions,
    ) -> Result<PutItemRequest, TableError> {
        let mut input = record.clone();
        if options.ignore_gsi {
            for index in self.indexes() {
                input.remove(index.pk());
                input.remove(index.sk());
            }
        }
        let plain = self.write_value(&input, schema, None, true)?;
        let item = self.encode(&plain, Some(schema))?;

        let mut condition = Filter::new().exists(self.key().pk()).exists(self.key().sk());
        if options.enforce_gsi && !options.ignore_gsi {
            for index in self.indexes().iter().filter(|index| index.unique()) {
                for name in [index.pk(), index.sk()] {
                    let Some(value) = item.get(name) else {
                        continue;
                    };
                    condition = condition.and(unchanged_or_absent(name, value));
                }
            }
        }

        let mut state = ExpressionState::new();
        let condition_expression = condition.write(&mut state);
        let (names, values) = state.into_parts();
        Ok(PutItemRequest {
            table_name: self.name().to_string(),
            item,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: None,
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }

    /// Write a new item; fails when the key is already taken.
    pub fn insert_request(&self, schema: &str, record: &Record) -> Result<PutItemRequest, TableError> {
        let plain = self.write_value(record, schema, None, true)?;
        let item = self.encode(&plain, Some(schema))?;
        self.put_new(item)
    }

    /// The bare item an auto-increment counter lives on: key and schema tag.
    pub fn stub_request(&self, schema: &str, record: &Record) -> Result<PutItemRequest, TableError> {
        let schema = self.require_schema(schema)?;
        let mut item = self.key_item(schema, record)?;
        if let Some(field) = self.schema_field() {
            item.insert(field.to_string(), AttributeValue::S(schema.name().to_string()));
        }
        self.put_new(item)
    }

    fn put_new(&self, item: Item) -> Result<PutItemRequest, TableError> {
        let mut state = ExpressionState::new();
        let condition_expression = Filter::new()
            .not_exists(self.key().pk())
            .not_exists(self.key().sk())
            .write(&mut state);
        let (names, values) = state.into_parts();
        Ok(PutItemRequest {
            table_name: self.name().to_string(),
            item,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: None,
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }

    pub fn get_request(
        &self,
        schema: &str,
        key_record: &Record,
        consistent_read: bool,
    ) -> Result<GetItemRequest, TableError> {
        let schema = self.require_schema(schema)?;
        Ok(GetItemRequest {
            table_name: self.name().to_string(),
            key: self.key_item(schema, key_record)?,
            consistent_read: Some(consistent_read),
            projection_expression: None,
            expression_attribute_names: Default::default(),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }

    /// Delete an existing item and return what was stored.
    pub fn delete_request(&self, schema: &str, key_record: &Record) -> Result<DeleteItemRequest, TableError> {
        let schema = self.require_schema(schema)?;
        let key = self.key_item(schema, key_record)?;
        let mut state = ExpressionState::new();
        let condition_expression = Filter::new().exists(self.key().pk()).write(&mut state);
        let (names, values) = state.into_parts();
        Ok(DeleteItemRequest {
            table_name: self.name().to_string(),
            key,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            return_values: Some(ReturnValues::AllOld),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }
}

fn unchanged_or_absent(name: &str, value: &AttributeValue) -> Filter {
    Filter::new()
        .not_exists(name)
        .or(Filter::new().eq(name, value.clone()))
}
