//! Write transactions.

use crate::filter::{ExpressionState, Filter};
use crate::item::PutOptions;
use crate::request::{
    ReturnConsumedCapacity, TransactOperation, TransactWriteItem, TransactWriteItemsRequest,
};
use crate::table::{Table, TableError};
use crate::update::Update;
use crate::value::Record;

/// Most items DynamoDB accepts in one `TransactWriteItems` call.
pub const TRANSACTION_LIMIT: usize = 100;

/// Writes applied all together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    items: Vec<TransactWriteItem>,
}

impl Transaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn put(
        &mut self,
        table: &Table,
        schema: &str,
        record: &Record,
        options: PutOptions,
    ) -> Result<(), TableError> {
        self.items.push(table.put_request(schema, record, options)?.into());
        Ok(())
    }

    pub fn insert(&mut self, table: &Table, schema: &str, record: &Record) -> Result<(), TableError> {
        self.items.push(table.insert_request(schema, record)?.into());
        Ok(())
    }

    pub fn update(&mut self, update: &Update<'_>) -> Result<(), TableError> {
        self.items.push(update.build()?.into());
        Ok(())
    }

    pub fn delete(&mut self, table: &Table, schema: &str, key_record: &Record) -> Result<(), TableError> {
        self.items.push(table.delete_request(schema, key_record)?.into());
        Ok(())
    }

    /// Require `condition` to hold on another item without writing it.
    pub fn condition_check(
        &mut self,
        table: &Table,
        schema: &str,
        key_record: &Record,
        condition: &Filter,
    ) -> Result<(), TableError> {
        let schema = table.require_schema(schema)?;
        let key = table.key_item(schema, key_record)?;
        let mut state = ExpressionState::new();
        let condition_expression = condition.write(&mut state);
        let (names, values) = state.into_parts();
        self.items.push(TransactWriteItem::ConditionCheck(TransactOperation {
            table_name: table.name().to_string(),
            item: None,
            key: Some(key),
            update_expression: None,
            condition_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
        }));
        Ok(())
    }

    /// Bump a schema counter as part of the transaction.
    pub fn auto_increment(
        &mut self,
        table: &Table,
        schema: &str,
        name: &str,
        record: &Record,
        reset: bool,
    ) -> Result<(), TableError> {
        self.items
            .push(table.auto_increment_request(record, schema, name, reset)?.into());
        Ok(())
    }

    pub fn build(&self) -> Result<TransactWriteItemsRequest, TableError> {
        if self.items.is_empty() {
            return Err(TableError::EmptyTransaction);
        }
        if self.items.len() > TRANSACTION_LIMIT {
            return Err(TableError::TooManyItems {
                count: self.items.len(),
                limit: TRANSACTION_LIMIT,
            });
        }
        Ok(TransactWriteItemsRequest {
            transact_items: self.items.clone(),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        })
    }
}
