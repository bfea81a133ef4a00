//! Record schemas stored in a table.

use crate::attribute::{Attribute, Attributes, AutoIncrement};
use crate::index::GlobalIndexFormat;
use crate::key::KeyFormat;

/// One record shape of a single-table design.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    key: KeyFormat,
    indexes: Vec<GlobalIndexFormat>,
    attributes: Attributes,
    auto_increments: Vec<(String, AutoIncrement)>,
}

impl Schema {
    #[must_use]
    pub fn new(name: impl Into<String>, key: KeyFormat) -> Self {
        Self {
            name: name.into(),
            key,
            indexes: Vec::new(),
            attributes: Attributes::new(),
            auto_increments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: GlobalIndexFormat) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_auto_increment(mut self, name: impl Into<String>, counter: AutoIncrement) -> Self {
        self.auto_increments.push((name.into(), counter));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key(&self) -> &KeyFormat {
        &self.key
    }

    #[must_use]
    pub fn indexes(&self) -> &[GlobalIndexFormat] {
        &self.indexes
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&GlobalIndexFormat> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Declared attributes; with `nested`, map and list members are added as
    /// `parent.child` after their parent.
    #[must_use]
    pub fn attribute_list(&self, nested: bool) -> Vec<(String, &Attribute)> {
        let mut out = Vec::with_capacity(self.attributes.len());
        for (name, attribute) in self.attributes.iter() {
            out.push((name.to_string(), attribute));
            if !nested {
                continue;
            }
            if let Some(members) = attribute.members() {
                for (child, member) in members.iter() {
                    out.push((format!("{name}.{child}"), member));
                }
            }
        }
        out
    }

    #[must_use]
    pub fn auto_increment(&self, name: &str) -> Option<AutoIncrement> {
        self.auto_increments
            .iter()
            .find(|(counter, _)| counter == name)
            .map(|(_, counter)| *counter)
    }

    pub fn auto_increments(&self) -> impl Iterator<Item = (&str, AutoIncrement)> {
        self.auto_increments
            .iter()
            .map(|(name, counter)| (name.as_str(), *counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new("User", KeyFormat::parse("user#{id}", "user").unwrap())
            .with_index(GlobalIndexFormat::new(
                "gsi1",
                KeyFormat::parse("email#{email}", "user").unwrap(),
            ))
            .with_attribute("id", Attribute::uuid())
            .with_attribute(
                "address",
                Attribute::map(Attributes::new().with("city", Attribute::string())),
            )
            .with_auto_increment("seq", AutoIncrement::new(100, 5))
    }

    #[test]
    fn nested_attribute_list_flattens_members() {
        let schema = schema();
        let flat: Vec<String> = schema.attribute_list(false).into_iter().map(|(n, _)| n).collect();
        assert_eq!(flat, vec!["id", "address"]);

        let nested: Vec<String> = schema.attribute_list(true).into_iter().map(|(n, _)| n).collect();
        assert_eq!(nested, vec!["id", "address", "address.city"]);
    }

    #[test]
    fn looks_up_indexes_and_counters() {
        let schema = schema();
        assert!(schema.index("gsi1").is_some());
        assert!(schema.index("gsi2").is_none());
        assert_eq!(schema.auto_increment("seq"), Some(AutoIncrement::new(100, 5)));
        assert_eq!(schema.auto_increment("other"), None);
    }
}
