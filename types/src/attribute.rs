//! Typed attribute declarations.
//!
//! An [`Attribute`] turns loosely typed input into the plain value that is
//! stored (`write_value`), the plain value into its wire form (`encode`), and
//! a wire value back into plain form (`read`).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::value::{AttributeValue, DataType, Item, decode_base64, encode_base64, number_to_json};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributeError {
    #[error("expected {expected}, got {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("length {len} is shorter than the minimum {min}")]
    TooShort { min: usize, len: usize },
    #[error("value {value} must be {bound}")]
    OutOfBounds { value: f64, bound: Bound },
    #[error("value {value} is not an allowed choice")]
    NotAllowed { value: String },
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid datetime '{0}'")]
    InvalidDateTime(String),
    #[error("unexpected wire type {found}, expected {expected}")]
    UnexpectedWireType { expected: DataType, found: DataType },
    #[error("{name}: {source}")]
    Member {
        name: String,
        source: Box<AttributeError>,
    },
}

impl AttributeError {
    pub(crate) fn member(name: impl Into<String>, source: AttributeError) -> Self {
        AttributeError::Member {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

/// A violated numeric bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Gt(f64),
    Ge(f64),
    Lt(f64),
    Le(f64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Gt(limit) => write!(f, "greater than {limit}"),
            Bound::Ge(limit) => write!(f, "greater than or equal to {limit}"),
            Bound::Lt(limit) => write!(f, "less than {limit}"),
            Bound::Le(limit) => write!(f, "less than or equal to {limit}"),
        }
    }
}

/// Inclusive/exclusive limits for numeric attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
}

impl Bounds {
    fn check(&self, value: f64) -> Result<(), AttributeError> {
        let violated = if self.gt.is_some_and(|limit| value <= limit) {
            self.gt.map(Bound::Gt)
        } else if self.ge.is_some_and(|limit| value < limit) {
            self.ge.map(Bound::Ge)
        } else if self.lt.is_some_and(|limit| value >= limit) {
            self.lt.map(Bound::Lt)
        } else if self.le.is_some_and(|limit| value > limit) {
            self.le.map(Bound::Le)
        } else {
            None
        };
        match violated {
            Some(bound) => Err(AttributeError::OutOfBounds { value, bound }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Uuid,
    DateTime { as_integer: bool, current: bool },
    Int(Bounds),
    Float(Bounds),
    Bool,
    Bytes,
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    IntEnum(Vec<i64>),
    StrEnum(Vec<String>),
    Flag(BTreeSet<String>),
    StringList,
    IntList,
    FloatList,
    ByteList,
    Map(Attributes),
    List(Attributes),
}

impl AttributeKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            AttributeKind::Uuid => "uuid",
            AttributeKind::DateTime { .. } => "datetime",
            AttributeKind::Int(_) => "int",
            AttributeKind::Float(_) => "float",
            AttributeKind::Bool => "bool",
            AttributeKind::Bytes => "bytes",
            AttributeKind::String { .. } => "string",
            AttributeKind::IntEnum(_) => "int_enum",
            AttributeKind::StrEnum(_) => "str_enum",
            AttributeKind::Flag(_) => "flag",
            AttributeKind::StringList => "string_list",
            AttributeKind::IntList => "int_list",
            AttributeKind::FloatList => "float_list",
            AttributeKind::ByteList => "byte_list",
            AttributeKind::Map(_) => "map",
            AttributeKind::List(_) => "list",
        }
    }
}

/// Ordered, named attribute declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, Attribute)>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a declaration, keeping first-declared order.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.insert(name, attribute);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(existing, _)| *existing == name) {
            slot.1 = attribute;
        } else {
            self.0.push((name, attribute));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, attribute)| attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.0.iter().map(|(name, attribute)| (name.as_str(), attribute))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Attribute)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (S, Attribute)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, attribute) in iter {
            attributes.insert(name, attribute);
        }
        attributes
    }
}

/// A declared attribute of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    kind: AttributeKind,
    always: bool,
    readonly: bool,
    default: Option<Value>,
}

impl Attribute {
    #[must_use]
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            always: true,
            readonly: false,
            default: None,
        }
    }

    #[must_use]
    pub fn uuid() -> Self {
        Self::new(AttributeKind::Uuid)
    }

    /// Epoch-seconds timestamp, read back as an integer.
    #[must_use]
    pub fn datetime() -> Self {
        Self::new(AttributeKind::DateTime {
            as_integer: true,
            current: false,
        })
    }

    /// Timestamp rewritten to "now" on every write.
    #[must_use]
    pub fn current_datetime() -> Self {
        Self::new(AttributeKind::DateTime {
            as_integer: true,
            current: true,
        })
    }

    #[must_use]
    pub fn int() -> Self {
        Self::new(AttributeKind::Int(Bounds::default()))
    }

    #[must_use]
    pub fn float() -> Self {
        Self::new(AttributeKind::Float(Bounds::default()))
    }

    #[must_use]
    pub fn bool() -> Self {
        Self::new(AttributeKind::Bool)
    }

    #[must_use]
    pub fn bytes() -> Self {
        Self::new(AttributeKind::Bytes)
    }

    #[must_use]
    pub fn string() -> Self {
        Self::new(AttributeKind::String {
            min_length: None,
            max_length: None,
        })
    }

    #[must_use]
    pub fn int_enum(choices: impl IntoIterator<Item = i64>) -> Self {
        Self::new(AttributeKind::IntEnum(choices.into_iter().collect()))
    }

    #[must_use]
    pub fn str_enum<S: Into<String>>(choices: impl IntoIterator<Item = S>) -> Self {
        Self::new(AttributeKind::StrEnum(
            choices.into_iter().map(Into::into).collect(),
        ))
    }

    #[must_use]
    pub fn flag<S: Into<String>>(options: impl IntoIterator<Item = S>) -> Self {
        Self::new(AttributeKind::Flag(
            options.into_iter().map(Into::into).collect(),
        ))
    }

    #[must_use]
    pub fn string_list() -> Self {
        Self::new(AttributeKind::StringList)
    }

    #[must_use]
    pub fn int_list() -> Self {
        Self::new(AttributeKind::IntList)
    }

    #[must_use]
    pub fn float_list() -> Self {
        Self::new(AttributeKind::FloatList)
    }

    #[must_use]
    pub fn byte_list() -> Self {
        Self::new(AttributeKind::ByteList)
    }

    #[must_use]
    pub fn map(members: Attributes) -> Self {
        Self::new(AttributeKind::Map(members))
    }

    #[must_use]
    pub fn list(members: Attributes) -> Self {
        Self::new(AttributeKind::List(members))
    }

    /// Skip the attribute on writes when the input does not carry it.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.always = false;
        self
    }

    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Read datetimes back as RFC 3339 text instead of epoch seconds.
    #[must_use]
    pub fn as_text(mut self) -> Self {
        if let AttributeKind::DateTime { as_integer, .. } = &mut self.kind {
            *as_integer = false;
        }
        self
    }

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        if let AttributeKind::String { min_length, max_length } = &mut self.kind {
            *min_length = Some(min);
            *max_length = max_length.map(|max| max.max(min));
        }
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        if let AttributeKind::String { min_length, max_length } = &mut self.kind {
            *max_length = Some(min_length.map_or(max, |min| max.max(min)));
        }
        self
    }

    #[must_use]
    pub fn bounds(mut self, limits: Bounds) -> Self {
        if let AttributeKind::Int(bounds) | AttributeKind::Float(bounds) = &mut self.kind {
            *bounds = limits;
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    #[must_use]
    pub fn always(&self) -> bool {
        self.always
    }

    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Attributes that must be rewritten on every update.
    #[must_use]
    pub fn replaces(&self) -> bool {
        matches!(self.kind, AttributeKind::DateTime { current: true, .. })
    }

    /// Declared members of map and list attributes.
    #[must_use]
    pub fn members(&self) -> Option<&Attributes> {
        match &self.kind {
            AttributeKind::Map(members) | AttributeKind::List(members) => Some(members),
            _ => None,
        }
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self.kind {
            AttributeKind::Uuid
            | AttributeKind::String { .. }
            | AttributeKind::StrEnum(_)
            | AttributeKind::Flag(_) => DataType::String,
            AttributeKind::DateTime { .. }
            | AttributeKind::Int(_)
            | AttributeKind::Float(_)
            | AttributeKind::IntEnum(_) => DataType::Number,
            AttributeKind::Bool => DataType::Boolean,
            AttributeKind::Bytes => DataType::Bytes,
            AttributeKind::StringList => DataType::StringSet,
            AttributeKind::IntList | AttributeKind::FloatList => DataType::NumberSet,
            AttributeKind::ByteList => DataType::BytesSet,
            AttributeKind::Map(_) => DataType::Map,
            AttributeKind::List(_) => DataType::List,
        }
    }

    /// Normalise an input value into the plain value that gets stored.
    ///
    /// `None` and JSON null both mean "absent"; the result is `Value::Null`
    /// when nothing should be stored.
    pub fn write_value(&self, value: Option<&Value>) -> Result<Value, AttributeError> {
        let value = value.filter(|v| !v.is_null());
        match &self.kind {
            AttributeKind::Uuid => Ok(match value {
                Some(Value::String(s)) => Value::String(s.clone()),
                _ => Value::String(Uuid::new_v4().simple().to_string()),
            }),
            AttributeKind::DateTime { current, .. } => {
                if *current {
                    return Ok(Value::from(Utc::now().timestamp()));
                }
                match value {
                    None => Ok(Value::from(Utc::now().timestamp())),
                    Some(Value::Number(n)) => Ok(Value::from(truncate(n)?)),
                    Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                        .map(|dt| Value::from(dt.timestamp()))
                        .map_err(|_| AttributeError::InvalidDateTime(s.clone())),
                    Some(other) => Err(wrong_type("number or RFC 3339 text", other)),
                }
            }
            AttributeKind::Int(bounds) => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::Number(n)) => {
                    let int = truncate(n)?;
                    #[allow(clippy::cast_precision_loss)]
                    bounds.check(int as f64)?;
                    Ok(Value::from(int))
                }
                Some(other) => Err(wrong_type("number", other)),
            },
            AttributeKind::Float(bounds) => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::Number(n)) => {
                    let float = n
                        .as_f64()
                        .ok_or_else(|| AttributeError::InvalidNumber(n.to_string()))?;
                    bounds.check(float)?;
                    Ok(Value::from(float))
                }
                Some(other) => Err(wrong_type("number", other)),
            },
            AttributeKind::Bool => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
                Some(other) => Err(wrong_type("bool", other)),
            },
            AttributeKind::Bytes => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::String(s)) => {
                    decode_base64(s).map_err(|e| AttributeError::InvalidBase64(e.to_string()))?;
                    Ok(Value::String(s.clone()))
                }
                Some(other) => Err(wrong_type("base64 text", other)),
            },
            AttributeKind::String {
                min_length,
                max_length,
            } => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::String(s)) => {
                    let len = s.chars().count();
                    if let Some(min) = *min_length
                        && len < min
                    {
                        return Err(AttributeError::TooShort { min, len });
                    }
                    match *max_length {
                        Some(max) if len > max => Ok(Value::String(s.chars().take(max).collect())),
                        _ => Ok(Value::String(s.clone())),
                    }
                }
                Some(other) => Err(wrong_type("string", other)),
            },
            AttributeKind::IntEnum(choices) => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(i) if choices.contains(&i) => Ok(Value::from(i)),
                    _ => Err(AttributeError::NotAllowed {
                        value: n.to_string(),
                    }),
                },
                Some(other) => Err(wrong_type("integer", other)),
            },
            AttributeKind::StrEnum(choices) => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::String(s)) if choices.contains(s) => Ok(Value::String(s.clone())),
                Some(Value::String(s)) => Err(AttributeError::NotAllowed { value: s.clone() }),
                Some(other) => Err(wrong_type("string", other)),
            },
            AttributeKind::Flag(options) => match value.or(self.default.as_ref()) {
                None => Ok(Value::Null),
                Some(Value::String(s)) if options.contains(s) => Ok(Value::String(s.clone())),
                Some(Value::String(s)) => Err(AttributeError::NotAllowed { value: s.clone() }),
                Some(other) => Err(wrong_type("string", other)),
            },
            AttributeKind::StringList => write_list(value, |item| {
                Ok(Some(match item {
                    Value::String(s) => Value::String(s.clone()),
                    other => Value::String(other.to_string()),
                }))
            }),
            AttributeKind::IntList => write_list(value, |item| {
                coerce_number(item)
                    .and_then(|n| truncate(&n))
                    .map(|i| Some(Value::from(i)))
            }),
            AttributeKind::FloatList => write_list(value, |item| {
                let n = coerce_number(item)?;
                n.as_f64()
                    .map(|f| Some(Value::from(f)))
                    .ok_or_else(|| AttributeError::InvalidNumber(n.to_string()))
            }),
            AttributeKind::ByteList => write_list(value, |item| match item {
                Value::String(s) => {
                    decode_base64(s).map_err(|e| AttributeError::InvalidBase64(e.to_string()))?;
                    Ok(Some(Value::String(s.clone())))
                }
                _ => Ok(None),
            }),
            AttributeKind::Map(members) => match value {
                None => Ok(Value::Null),
                Some(Value::Object(object)) => write_members(members, object).map(Value::Object),
                Some(other) => Err(wrong_type("object", other)),
            },
            AttributeKind::List(members) => match value {
                None => Ok(Value::Null),
                Some(Value::Array(items)) => {
                    let mut rows = Vec::with_capacity(items.len());
                    for item in items {
                        let Value::Object(object) = item else {
                            continue;
                        };
                        let row = write_members(members, object)?;
                        if !row.is_empty() {
                            rows.push(Value::Object(row));
                        }
                    }
                    Ok(Value::Array(rows))
                }
                Some(other) => Err(wrong_type("array", other)),
            },
        }
    }

    /// Encode an already-normalised plain value into wire form.
    pub fn encode(&self, value: &Value) -> Result<AttributeValue, AttributeError> {
        if value.is_null() {
            return Ok(AttributeValue::null());
        }
        match (&self.kind, value) {
            (
                AttributeKind::Uuid
                | AttributeKind::String { .. }
                | AttributeKind::StrEnum(_)
                | AttributeKind::Flag(_),
                Value::String(s),
            ) => Ok(AttributeValue::S(s.clone())),
            (
                AttributeKind::DateTime { .. }
                | AttributeKind::Int(_)
                | AttributeKind::Float(_)
                | AttributeKind::IntEnum(_),
                Value::Number(n),
            ) => Ok(AttributeValue::N(n.to_string())),
            (AttributeKind::Bool, Value::Bool(b)) => Ok(AttributeValue::Bool(*b)),
            (AttributeKind::Bytes, Value::String(s)) => decode_base64(s)
                .map(AttributeValue::B)
                .map_err(|e| AttributeError::InvalidBase64(e.to_string())),
            (AttributeKind::StringList, Value::Array(items)) => Ok(AttributeValue::Ss(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            )),
            (AttributeKind::IntList | AttributeKind::FloatList, Value::Array(items)) => items
                .iter()
                .map(|item| coerce_number(item).map(|n| n.to_string()))
                .collect::<Result<Vec<_>, _>>()
                .map(AttributeValue::Ns),
            (AttributeKind::ByteList, Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| decode_base64(s).map_err(|e| AttributeError::InvalidBase64(e.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(AttributeValue::Bs),
            (AttributeKind::Map(members), Value::Object(object)) => {
                encode_members(members, object).map(AttributeValue::M)
            }
            (AttributeKind::List(members), Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_object)
                .map(|object| encode_members(members, object).map(AttributeValue::M))
                .collect::<Result<Vec<_>, _>>()
                .map(AttributeValue::L),
            (kind, other) => Err(AttributeError::WrongType {
                expected: kind.name(),
                found: json_kind(other),
            }),
        }
    }

    /// Normalise and encode in one step.
    pub fn write_encode(&self, value: Option<&Value>) -> Result<AttributeValue, AttributeError> {
        let plain = self.write_value(value)?;
        self.encode(&plain)
    }

    /// Decode a stored wire value into plain form.
    pub fn read(&self, wire: &AttributeValue) -> Result<Value, AttributeError> {
        if wire.is_null() {
            return Ok(match &self.kind {
                AttributeKind::StringList
                | AttributeKind::IntList
                | AttributeKind::FloatList
                | AttributeKind::ByteList
                | AttributeKind::List(_) => Value::Array(Vec::new()),
                AttributeKind::IntEnum(_) => self.default.clone().unwrap_or(Value::Null),
                _ => Value::Null,
            });
        }
        match (&self.kind, wire) {
            (AttributeKind::Uuid | AttributeKind::String { .. } | AttributeKind::Flag(_), AttributeValue::S(s)) => {
                Ok(Value::String(s.clone()))
            }
            (AttributeKind::DateTime { as_integer, .. }, AttributeValue::N(n)) => {
                let seconds = parse_integer(n)?;
                if *as_integer {
                    return Ok(Value::from(seconds));
                }
                DateTime::<Utc>::from_timestamp(seconds, 0)
                    .map(|dt| Value::String(dt.to_rfc3339()))
                    .ok_or_else(|| AttributeError::InvalidDateTime(n.clone()))
            }
            (AttributeKind::Int(_), AttributeValue::N(n)) => parse_integer(n).map(Value::from),
            (AttributeKind::Float(_), AttributeValue::N(n)) => n
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| AttributeError::InvalidNumber(n.clone())),
            // Numeric attributes tolerate foreign wire types as absent.
            (AttributeKind::Int(_) | AttributeKind::Float(_), _) => Ok(Value::Null),
            (AttributeKind::Bool, AttributeValue::Bool(b)) => Ok(Value::Bool(*b)),
            (AttributeKind::Bytes, AttributeValue::B(b)) => Ok(Value::String(encode_base64(b))),
            (AttributeKind::IntEnum(choices), AttributeValue::N(n)) => Ok(parse_integer(n)
                .ok()
                .filter(|i| choices.contains(i))
                .map_or(Value::Null, Value::from)),
            (AttributeKind::StrEnum(choices), AttributeValue::S(s)) => Ok(if choices.contains(s) {
                Value::String(s.clone())
            } else {
                Value::Null
            }),
            (AttributeKind::IntEnum(_) | AttributeKind::StrEnum(_), _) => Ok(Value::Null),
            (AttributeKind::StringList, AttributeValue::Ss(items)) => {
                Ok(Value::Array(items.iter().cloned().map(Value::String).collect()))
            }
            (AttributeKind::IntList, AttributeValue::Ns(items)) => items
                .iter()
                .map(|n| parse_integer(n).map(Value::from))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (AttributeKind::FloatList, AttributeValue::Ns(items)) => items
                .iter()
                .map(|n| {
                    n.parse::<f64>()
                        .map(Value::from)
                        .map_err(|_| AttributeError::InvalidNumber(n.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (AttributeKind::ByteList, AttributeValue::Bs(items)) => Ok(Value::Array(
                items.iter().map(|b| Value::String(encode_base64(b))).collect(),
            )),
            (AttributeKind::Map(members), AttributeValue::M(item)) => {
                read_members(members, item).map(Value::Object)
            }
            (AttributeKind::List(members), AttributeValue::L(items)) => items
                .iter()
                .filter_map(|entry| match entry {
                    AttributeValue::M(item) => Some(read_members(members, item).map(Value::Object)),
                    _ => None,
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (_, other) => Err(AttributeError::UnexpectedWireType {
                expected: self.data_type(),
                found: other.data_type(),
            }),
        }
    }
}

/// A schema counter incremented through `if_not_exists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoIncrement {
    start: i64,
    step: i64,
}

impl AutoIncrement {
    /// Clamps `start` to at least 0 and `step` to at least 1.
    #[must_use]
    pub fn new(start: i64, step: i64) -> Self {
        Self {
            start: start.max(0),
            step: step.max(1),
        }
    }

    #[must_use]
    pub fn start(&self) -> i64 {
        self.start
    }

    #[must_use]
    pub fn step(&self) -> i64 {
        self.step
    }
}

impl Default for AutoIncrement {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

fn write_members(
    members: &Attributes,
    object: &Map<String, Value>,
) -> Result<Map<String, Value>, AttributeError> {
    let mut out = Map::new();
    for (name, value) in object {
        if let Some(member) = members.get(name) {
            let written = member
                .write_value(Some(value))
                .map_err(|e| AttributeError::member(name.as_str(), e))?;
            out.insert(name.clone(), written);
        }
    }
    Ok(out)
}

fn encode_members(
    members: &Attributes,
    object: &Map<String, Value>,
) -> Result<Item, AttributeError> {
    let mut out = Item::new();
    for (name, value) in object {
        if let Some(member) = members.get(name) {
            let encoded = member
                .encode(value)
                .map_err(|e| AttributeError::member(name.as_str(), e))?;
            out.insert(name.clone(), encoded);
        }
    }
    Ok(out)
}

fn read_members(
    members: &Attributes,
    item: &Item,
) -> Result<Map<String, Value>, AttributeError> {
    let mut out = Map::new();
    for (name, wire) in item {
        if let Some(member) = members.get(name) {
            let read = member
                .read(wire)
                .map_err(|e| AttributeError::member(name.as_str(), e))?;
            out.insert(name.clone(), read);
        }
    }
    Ok(out)
}

fn write_list(
    value: Option<&Value>,
    coerce: impl Fn(&Value) -> Result<Option<Value>, AttributeError>,
) -> Result<Value, AttributeError> {
    match value {
        None => Ok(Value::Null),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(coerced) = coerce(item)? {
                    out.push(coerced);
                }
            }
            // Sets cannot be empty on the wire.
            if out.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Array(out))
            }
        }
        Some(other) => Err(wrong_type("array", other)),
    }
}

fn coerce_number(value: &Value) -> Result<serde_json::Number, AttributeError> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        Value::String(s) => match number_to_json(s) {
            Value::Number(n) => Ok(n),
            _ => Err(AttributeError::InvalidNumber(s.clone())),
        },
        other => Err(wrong_type("number", other)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(n: &serde_json::Number) -> Result<i64, AttributeError> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(AttributeError::InvalidNumber(n.to_string())),
    }
}

fn parse_integer(text: &str) -> Result<i64, AttributeError> {
    match number_to_json(text) {
        Value::Number(n) => truncate(&n),
        _ => Err(AttributeError::InvalidNumber(text.to_string())),
    }
}

fn wrong_type(expected: &'static str, found: &Value) -> AttributeError {
    AttributeError::WrongType {
        expected,
        found: json_kind(found),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
