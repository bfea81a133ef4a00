//! Decoding stored items back into plain records.

use serde_json::Value;

use crate::table::{Table, TableError, TableLink};
use crate::value::{Item, Record};

/// Items returned by one operation, in wire form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reader {
    items: Vec<Item>,
    single: bool,
}

impl Reader {
    /// A response carrying one item (`Item` or `Attributes`).
    #[must_use]
    pub fn one(item: Item) -> Self {
        Self {
            items: vec![item],
            single: true,
        }
    }

    /// A response carrying a page of items.
    #[must_use]
    pub fn many(items: Vec<Item>) -> Self {
        Self {
            items,
            single: false,
        }
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        self.single
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Decode every item for the link.
    pub fn read(&self, link: &TableLink<'_>) -> Result<Vec<Record>, TableError> {
        self.items.iter().map(|item| read_item(link, item)).collect()
    }
}

impl Table {
    /// Decode one stored item.
    pub fn read(&self, item: &Item, schema: Option<&str>, index: Option<&str>) -> Result<Record, TableError> {
        read_item(&self.link(schema, index)?, item)
    }
}

/// Keep allowed attributes only, reading declared ones through their
/// declaration; an unlinked read uses the schema the item is tagged with.
///
/// Without any schema two declarations may share a name with different
/// types, so a value that does not fit is kept in its plain wire form.
pub fn read_item(link: &TableLink<'_>, item: &Item) -> Result<Record, TableError> {
    let table = link.table();
    let schema = link.schema().or_else(|| {
        let field = table.schema_field()?;
        let tag = item.get(field)?.as_str()?;
        table.schema(tag)
    });
    let allow = table.allow_list(schema, link.index(), false);

    let mut record = Record::new();
    for (name, wire) in item {
        let Some(allowed) = allow.get(name) else {
            continue;
        };
        let value = match allowed.attribute {
            Some(attribute) => match attribute.read(wire) {
                Ok(value) => value,
                Err(_) if schema.is_none() => wire.to_json(),
                Err(e) => return Err(TableError::attribute(name.as_str(), e)),
            },
            None => wire.to_json(),
        };
        record.insert(name.clone(), value);
    }
    if let (Some(schema), Some(field)) = (schema, table.schema_field()) {
        record.insert(field.to_string(), Value::String(schema.name().to_string()));
    }
    Ok(record)
}
