//! Core domain types for Dyno.
//!
//! Tables, schemas and attributes are declared once; everything the client
//! sends is derived from them here: key values, wire items, expressions and
//! typed request bodies. No IO, no async.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod attribute;
mod definition;
mod filter;
mod index;
mod item;
mod key;
mod query;
mod reader;
mod request;
mod schema;
mod table;
mod transaction;
mod update;
mod value;

pub use attribute::{
    Attribute, AttributeError, AttributeKind, Attributes, AutoIncrement, Bound, Bounds,
};
pub use definition::DefinitionError;
pub use filter::{Comparator, ComparatorParseError, ExpressionState, Filter, KeyFilter};
pub use index::{GlobalIndex, GlobalIndexFormat};
pub use item::PutOptions;
pub use key::{KeyAttributes, KeyFormat, KeyTemplate, TableKey, TemplateError};
pub use query::Query;
pub use reader::{Reader, read_item};
pub use request::{
    AttributeDefinition, BillingMode, ConsumedCapacity, CreateTableRequest, DeleteItemRequest,
    DeleteTableRequest, DescribeTableRequest, DynamoRequest, GetItemRequest, GlobalSecondaryIndex,
    KeySchemaElement, KeyType, ListTablesRequest, Names, OperationOutput, Projection,
    ProvisionedThroughput, PutItemRequest, QueryRequest, ReturnConsumedCapacity, ReturnValues,
    ScanRequest, Select, TableClass, TimeToLiveSpecification, TransactOperation,
    TransactWriteItem, TransactWriteItemsRequest, UpdateItemRequest, UpdateTableRequest,
    UpdateTimeToLiveRequest,
};
pub use schema::Schema;
pub use table::{AllowList, Allowed, Billing, Table, TableError, TableLink};
pub use transaction::{TRANSACTION_LIMIT, Transaction};
pub use update::Update;
pub use value::{
    AttributeValue, DataType, DataTypeParseError, Item, Record, decode_base64, encode_base64,
    number_to_json,
};

/// Version of the dyno workspace, printed by `dyno --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_the_package() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(VERSION.split('.').count(), 3);
    }
}
