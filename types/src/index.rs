//! Global secondary indexes.

use crate::key::{KeyAttributes, KeyFormat};
use crate::value::DataType;

/// A global secondary index declared on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalIndex {
    name: String,
    pk: String,
    sk: String,
    pk_type: DataType,
    sk_type: DataType,
    read_units: u64,
    write_units: u64,
    unique: bool,
}

impl GlobalIndex {
    /// Key attributes default to `<name>_pk` / `<name>_sk`, units to 1.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            pk: format!("{name}_pk"),
            sk: format!("{name}_sk"),
            name,
            pk_type: DataType::String,
            sk_type: DataType::String,
            read_units: 1,
            write_units: 1,
            unique: true,
        }
    }

    #[must_use]
    pub fn with_keys(mut self, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        self.pk = pk.into();
        self.sk = sk.into();
        self
    }

    #[must_use]
    pub fn with_types(mut self, pk_type: DataType, sk_type: DataType) -> Self {
        self.pk_type = pk_type;
        self.sk_type = sk_type;
        self
    }

    /// Provisioned capacity, clamped to at least one unit each.
    #[must_use]
    pub fn with_units(mut self, read: u64, write: u64) -> Self {
        self.read_units = read.max(1);
        self.write_units = write.max(1);
        self
    }

    #[must_use]
    pub fn non_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn read_units(&self) -> u64 {
        self.read_units
    }

    #[must_use]
    pub fn write_units(&self) -> u64 {
        self.write_units
    }

    /// Whether a record's key on this index identifies it.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.unique
    }
}

impl KeyAttributes for GlobalIndex {
    fn pk(&self) -> &str {
        &self.pk
    }

    fn sk(&self) -> &str {
        &self.sk
    }

    fn pk_type(&self) -> DataType {
        self.pk_type
    }

    fn sk_type(&self) -> DataType {
        self.sk_type
    }
}

/// How a schema renders its key on one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalIndexFormat {
    name: String,
    format: KeyFormat,
}

impl GlobalIndexFormat {
    #[must_use]
    pub fn new(name: impl Into<String>, format: KeyFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn format(&self) -> &KeyFormat {
        &self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_index_name() {
        let index = GlobalIndex::new("gsi1");
        assert_eq!(index.pk(), "gsi1_pk");
        assert_eq!(index.sk(), "gsi1_sk");
        assert_eq!(index.pk_type(), DataType::String);
        assert_eq!((index.read_units(), index.write_units()), (1, 1));
        assert!(index.unique());
    }

    #[test]
    fn units_clamp_to_one() {
        let index = GlobalIndex::new("gsi1").with_units(0, 5);
        assert_eq!((index.read_units(), index.write_units()), (1, 5));
        assert!(!index.non_unique().unique());
    }
}
