use std::fmt;

use dyno_types::{Item, OperationOutput, Reader, Record, TableError, TableLink};
use serde_json::Value;

/// Decoded payload of a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseData {
    #[default]
    None,
    One(Record),
    Many(Vec<Record>),
}

/// Result of one DynamoDB operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynoResponse {
    pub data: ResponseData,
    pub count: u64,
    pub scanned: u64,
    /// Capacity units consumed, summed over every table reported.
    pub consumed: f64,
    pub last_evaluated_key: Option<Item>,
    /// `TableDescription` of table administration calls.
    pub table: Option<Value>,
}

impl DynoResponse {
    /// Decode an operation output; `Item`, `Items` and `Attributes` are read
    /// through the link, or converted plainly without one.
    pub fn from_output(output: OperationOutput, link: Option<&TableLink<'_>>) -> Result<Self, TableError> {
        let reader = match (output.items, output.item, output.attributes) {
            (Some(items), _, _) => Some(Reader::many(items)),
            (None, Some(item), _) | (None, None, Some(item)) => Some(Reader::one(item)),
            (None, None, None) => None,
        };

        let data = match reader {
            None => ResponseData::None,
            Some(reader) => {
                let single = reader.is_single();
                let mut records = match link {
                    Some(link) => reader.read(link)?,
                    None => reader.items().iter().map(plain_record).collect(),
                };
                match (single, records.pop()) {
                    (true, Some(record)) => ResponseData::One(record),
                    (true, None) => ResponseData::None,
                    (false, last) => {
                        records.extend(last);
                        ResponseData::Many(records)
                    }
                }
            }
        };

        Ok(Self {
            data,
            count: output.count.unwrap_or_default(),
            scanned: output.scanned_count.unwrap_or_default(),
            consumed: output
                .consumed_capacity
                .iter()
                .filter_map(|c| c.capacity_units)
                .sum(),
            last_evaluated_key: output.last_evaluated_key,
            table: output.table_description.or(output.table),
        })
    }

    /// Collapse a page to its first record.
    #[must_use]
    pub fn into_single(mut self) -> Self {
        if let ResponseData::Many(records) = &mut self.data
            && !records.is_empty()
        {
            self.data = ResponseData::One(records.swap_remove(0));
        }
        self
    }

    #[must_use]
    pub fn with_record(mut self, record: Record) -> Self {
        self.data = ResponseData::One(record);
        self
    }

    /// The single record, or the first of a page.
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        match &self.data {
            ResponseData::None => None,
            ResponseData::One(record) => Some(record),
            ResponseData::Many(records) => records.first(),
        }
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self.data {
            ResponseData::None => Vec::new(),
            ResponseData::One(record) => vec![record],
            ResponseData::Many(records) => records,
        }
    }

    /// Plain JSON form of the payload, `null` when there is none.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match &self.data {
            ResponseData::None => Value::Null,
            ResponseData::One(record) => Value::Object(record.clone()),
            ResponseData::Many(records) => Value::Array(records.iter().cloned().map(Value::Object).collect()),
        }
    }
}

impl fmt::Display for DynoResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ResponseData::None => write!(f, "DR ok"),
            ResponseData::One(_) => write!(f, "DR ok with 1 items"),
            ResponseData::Many(records) => write!(f, "DR ok with {} items", records.len()),
        }
    }
}

fn plain_record(item: &Item) -> Record {
    item.iter().map(|(name, value)| (name.clone(), value.to_json())).collect()
}
