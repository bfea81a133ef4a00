//! Table keys and the templates schemas use to render them.

use std::collections::BTreeSet;
use std::{fmt, mem};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::value::{AttributeValue, DataType, Item, Record};

/// Names and types of a partition/sort key pair.
///
/// Implemented by the table key and by every global secondary index.
pub trait KeyAttributes {
    fn pk(&self) -> &str;
    fn sk(&self) -> &str;
    fn pk_type(&self) -> DataType;
    fn sk_type(&self) -> DataType;
}

/// Primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableKey {
    pk: String,
    sk: String,
    pk_type: DataType,
    sk_type: DataType,
}

impl TableKey {
    #[must_use]
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            pk_type: DataType::String,
            sk_type: DataType::String,
        }
    }

    #[must_use]
    pub fn with_types(mut self, pk_type: DataType, sk_type: DataType) -> Self {
        self.pk_type = pk_type;
        self.sk_type = sk_type;
        self
    }
}

impl Default for TableKey {
    fn default() -> Self {
        Self::new("pk", "sk")
    }
}

impl KeyAttributes for TableKey {
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

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed placeholder in key template '{0}'")]
    Unclosed(String),
    #[error("unmatched '}}' in key template '{0}'")]
    Unmatched(String),
    #[error("empty placeholder in key template '{0}'")]
    EmptyPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Key text with `{field}` placeholders; `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl KeyTemplate {
    pub fn new(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let segments = parse_template(&source)?;
        Ok(Self { source, segments })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Placeholder field names, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Render against a record.
    ///
    /// Returns `None` when a placeholder field is missing, or is null and
    /// listed in `required`. Other nulls render as empty text.
    #[must_use]
    pub fn render(&self, record: &Record, required: &BTreeSet<String>) -> Option<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match record.get(name)? {
                    Value::Null if required.contains(name) => return None,
                    Value::Null => {}
                    Value::String(s) => out.push_str(s),
                    Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                    Value::Number(n) => out.push_str(&n.to_string()),
                    other => out.push_str(&other.to_string()),
                },
            }
        }
        Some(out)
    }
}

impl TryFrom<String> for KeyTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for KeyTemplate {
    type Error = TemplateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyTemplate> for String {
    fn from(value: KeyTemplate) -> Self {
        value.source
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_template(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(TemplateError::Unclosed(source.to_string())),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(source.to_string()));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(mem::take(&mut literal)));
                }
                segments.push(Segment::Field(name.to_string()));
            }
            '}' => return Err(TemplateError::Unmatched(source.to_string())),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// A schema's partition and sort key templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormat {
    pk: KeyTemplate,
    sk: KeyTemplate,
    required: BTreeSet<String>,
}

impl KeyFormat {
    #[must_use]
    pub fn new(pk: KeyTemplate, sk: KeyTemplate) -> Self {
        Self {
            pk,
            sk,
            required: BTreeSet::new(),
        }
    }

    /// Parse both templates.
    pub fn parse(pk: &str, sk: &str) -> Result<Self, TemplateError> {
        Ok(Self::new(KeyTemplate::new(pk)?, KeyTemplate::new(sk)?))
    }

    /// Fields that must be non-null for the key to render.
    #[must_use]
    pub fn require<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn pk(&self) -> &KeyTemplate {
        &self.pk
    }

    #[must_use]
    pub fn sk(&self) -> &KeyTemplate {
        &self.sk
    }

    #[must_use]
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    #[must_use]
    pub fn format_pk(&self, record: &Record) -> Option<String> {
        self.pk.render(record, &self.required)
    }

    #[must_use]
    pub fn format_sk(&self, record: &Record) -> Option<String> {
        self.sk.render(record, &self.required)
    }

    /// The two-attribute key item, or `None` when either half cannot render.
    #[must_use]
    pub fn write(&self, key: &(impl KeyAttributes + ?Sized), record: &Record) -> Option<Item> {
        let pk = self.format_pk(record)?;
        let sk = self.format_sk(record)?;
        let mut item = Item::new();
        item.insert(key.pk().to_string(), AttributeValue::key(key.pk_type(), pk));
        item.insert(key.sk().to_string(), AttributeValue::key(key.sk_type(), sk));
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn renders_fields_and_escapes() {
        let template = KeyTemplate::new("{{user}}#{id}#{active}#{count}").unwrap();
        let rendered = template.render(
            &record(json!({"id": "abc", "active": true, "count": 3})),
            &BTreeSet::new(),
        );
        assert_eq!(rendered.as_deref(), Some("{user}#abc#true#3"));
    }

    #[test]
    fn missing_field_fails() {
        let template = KeyTemplate::new("user#{id}").unwrap();
        assert_eq!(template.render(&Record::new(), &BTreeSet::new()), None);
    }

    #[test]
    fn null_renders_empty_unless_required() {
        let format = KeyFormat::parse("user#{id}", "name#{name}").unwrap();
        let data = record(json!({"id": null, "name": "x"}));
        assert_eq!(format.format_pk(&data).as_deref(), Some("user#"));

        let format = format.require(["id"]);
        assert_eq!(format.format_pk(&data), None);
        assert_eq!(format.format_sk(&data).as_deref(), Some("name#x"));
    }

    #[test]
    fn constant_templates_render_without_data() {
        let format = KeyFormat::parse("account", "id#{id}").unwrap();
        assert_eq!(format.format_pk(&Record::new()).as_deref(), Some("account"));
        assert_eq!(format.pk().fields().count(), 0);
        assert_eq!(format.sk().fields().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(matches!(KeyTemplate::new("a{b"), Err(TemplateError::Unclosed(_))));
        assert!(matches!(KeyTemplate::new("a}b"), Err(TemplateError::Unmatched(_))));
        assert!(matches!(KeyTemplate::new("a{}"), Err(TemplateError::EmptyPlaceholder(_))));
    }

    #[test]
    fn write_uses_key_types() {
        let key = TableKey::new("pk", "sk").with_types(DataType::String, DataType::Number);
        let format = KeyFormat::parse("item", "{n}").unwrap();
        let item = format.write(&key, &record(json!({"n": 12}))).unwrap();
        assert_eq!(item["pk"], AttributeValue::S("item".into()));
        assert_eq!(item["sk"], AttributeValue::N("12".into()));

        assert!(format.write(&key, &Record::new()).is_none());
    }

    #[test]
    fn deserializes_from_text() {
        let template: KeyTemplate = serde_json::from_value(json!("a#{b}")).unwrap();
        assert_eq!(template.as_str(), "a#{b}");
        assert!(serde_json::from_value::<KeyTemplate>(json!("a#{b")).is_err());
    }
}
