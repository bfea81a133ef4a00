//! DynamoDB wire values.
//!
//! [`AttributeValue`] serializes to the single-key JSON objects the DynamoDB
//! API speaks (`{"S": "abc"}`, `{"N": "12"}`, `{"NULL": true}`). Plain values
//! travel as [`serde_json::Value`]; binary data is base64 text in plain form.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire-encoded item: attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;

/// Plain (decoded) record.
pub type Record = serde_json::Map<String, Value>;

/// DynamoDB attribute type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Bytes,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "BOOL")]
    Boolean,
    #[serde(rename = "SS")]
    StringSet,
    #[serde(rename = "NS")]
    NumberSet,
    #[serde(rename = "BS")]
    BytesSet,
    #[serde(rename = "M")]
    Map,
    #[serde(rename = "L")]
    List,
}

const DATA_TYPE_CODES: &[&str] = &["S", "N", "B", "NULL", "BOOL", "SS", "NS", "BS", "M", "L"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid data type '{raw}'; expected one of: {expected:?}")]
pub struct DataTypeParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl DataType {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            DataType::String => "S",
            DataType::Number => "N",
            DataType::Bytes => "B",
            DataType::Null => "NULL",
            DataType::Boolean => "BOOL",
            DataType::StringSet => "SS",
            DataType::NumberSet => "NS",
            DataType::BytesSet => "BS",
            DataType::Map => "M",
            DataType::List => "L",
        }
    }

    /// Infer the wire type of a plain value.
    ///
    /// Arrays are sets when every element is a string (or every element a
    /// number), lists otherwise. An empty array has no inferable type.
    #[must_use]
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(DataType::Null),
            Value::Bool(_) => Some(DataType::Boolean),
            Value::Number(_) => Some(DataType::Number),
            Value::String(_) => Some(DataType::String),
            Value::Object(_) => Some(DataType::Map),
            Value::Array(items) => {
                if items.is_empty() {
                    None
                } else if items.iter().all(Value::is_string) {
                    Some(DataType::StringSet)
                } else if items.iter().all(Value::is_number) {
                    Some(DataType::NumberSet)
                } else {
                    Some(DataType::List)
                }
            }
        }
    }

    /// Types usable for table and index key attributes.
    #[must_use]
    pub const fn is_key_type(self) -> bool {
        matches!(self, DataType::String | DataType::Number | DataType::Bytes)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DataType {
    type Err = DataTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s {
            "S" => DataType::String,
            "N" => DataType::Number,
            "B" => DataType::Bytes,
            "NULL" => DataType::Null,
            "BOOL" => DataType::Boolean,
            "SS" => DataType::StringSet,
            "NS" => DataType::NumberSet,
            "BS" => DataType::BytesSet,
            "M" => DataType::Map,
            "L" => DataType::List,
            _ => {
                return Err(DataTypeParseError {
                    raw: s.to_string(),
                    expected: DATA_TYPE_CODES,
                });
            }
        };
        Ok(parsed)
    }
}

/// A single DynamoDB attribute value in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B", with = "base64_bytes")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS", with = "base64_bytes_list")]
    Bs(Vec<Vec<u8>>),
    #[serde(rename = "M")]
    M(Item),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
}

impl AttributeValue {
    #[must_use]
    pub const fn null() -> Self {
        AttributeValue::Null(true)
    }

    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            AttributeValue::S(_) => DataType::String,
            AttributeValue::N(_) => DataType::Number,
            AttributeValue::B(_) => DataType::Bytes,
            AttributeValue::Bool(_) => DataType::Boolean,
            AttributeValue::Null(_) => DataType::Null,
            AttributeValue::Ss(_) => DataType::StringSet,
            AttributeValue::Ns(_) => DataType::NumberSet,
            AttributeValue::Bs(_) => DataType::BytesSet,
            AttributeValue::M(_) => DataType::Map,
            AttributeValue::L(_) => DataType::List,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null(_))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Key value of the given key type, built from rendered key text.
    #[must_use]
    pub fn key(data_type: DataType, text: String) -> Self {
        match data_type {
            DataType::Number => AttributeValue::N(text),
            DataType::Bytes => AttributeValue::B(text.into_bytes()),
            _ => AttributeValue::S(text),
        }
    }

    /// Encode a plain value by inferring its wire type.
    ///
    /// Strings stay strings (binary data must be encoded through a typed
    /// attribute). Homogeneous string/number arrays become sets, other arrays
    /// lists.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::null(),
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::String(s) => AttributeValue::S(s.clone()),
            Value::Object(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
                    .collect(),
            ),
            Value::Array(items) => match DataType::of(value) {
                Some(DataType::StringSet) => AttributeValue::Ss(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                ),
                Some(DataType::NumberSet) => {
                    AttributeValue::Ns(items.iter().map(ToString::to_string).collect())
                }
                _ => AttributeValue::L(items.iter().map(AttributeValue::from_json).collect()),
            },
        }
    }

    /// Decode into a plain value without a declaration.
    ///
    /// Numbers become integers when integral, floats otherwise; unparsable
    /// number text is kept as a string.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::S(s) => Value::String(s.clone()),
            AttributeValue::N(n) => number_to_json(n),
            AttributeValue::B(b) => Value::String(BASE64.encode(b)),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Null(_) => Value::Null,
            AttributeValue::Ss(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            AttributeValue::Ns(items) => {
                Value::Array(items.iter().map(|n| number_to_json(n)).collect())
            }
            AttributeValue::Bs(items) => Value::Array(
                items
                    .iter()
                    .map(|b| Value::String(BASE64.encode(b)))
                    .collect(),
            ),
            AttributeValue::M(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            AttributeValue::L(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::N(value.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::N(value.to_string())
    }
}

impl From<&Value> for AttributeValue {
    fn from(value: &Value) -> Self {
        AttributeValue::from_json(value)
    }
}

/// Parse DynamoDB number text into the narrowest plain number.
#[must_use]
pub fn number_to_json(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
        Ok(f) => serde_json::Number::from_f64(f).map_or_else(|| Value::String(text.to_string()), Value::Number),
        Err(_) => Value::String(text.to_string()),
    }
}

/// Decode base64 text carried in a plain record.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(text)
}

#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64.decode(text).map_err(DeError::custom)
    }
}

mod base64_bytes_list {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde::ser::SerializeSeq;
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for bytes in items {
            seq.serialize_element(&BASE64.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let texts = Vec::<String>::deserialize(deserializer)?;
        texts
            .into_iter()
            .map(|text| BASE64.decode(text).map_err(DeError::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_single_key_objects() {
        let value = AttributeValue::S("abc".to_string());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"S": "abc"}));

        let value = AttributeValue::null();
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"NULL": true}));

        let value = AttributeValue::B(b"hi".to_vec());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"B": "aGk="}));
    }

    #[test]
    fn deserializes_nested_map() {
        let raw = json!({"M": {"city": {"S": "somewhere"}, "zip": {"N": "12345"}}});
        let value: AttributeValue = serde_json::from_value(raw).unwrap();
        let AttributeValue::M(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["city"], AttributeValue::S("somewhere".to_string()));
        assert_eq!(map["zip"], AttributeValue::N("12345".to_string()));
    }

    #[test]
    fn infers_data_types() {
        assert_eq!(DataType::of(&json!(null)), Some(DataType::Null));
        assert_eq!(DataType::of(&json!("x")), Some(DataType::String));
        assert_eq!(DataType::of(&json!(true)), Some(DataType::Boolean));
        assert_eq!(DataType::of(&json!(1.5)), Some(DataType::Number));
        assert_eq!(DataType::of(&json!({"a": 1})), Some(DataType::Map));
        assert_eq!(DataType::of(&json!(["a", "b"])), Some(DataType::StringSet));
        assert_eq!(DataType::of(&json!([1, 2])), Some(DataType::NumberSet));
        assert_eq!(DataType::of(&json!([{"a": 1}])), Some(DataType::List));
        assert_eq!(DataType::of(&json!([])), None);
    }

    #[test]
    fn data_type_round_trips_codes() {
        for code in DATA_TYPE_CODES {
            let parsed: DataType = code.parse().unwrap();
            assert_eq!(parsed.code(), *code);
        }
        assert!("X".parse::<DataType>().is_err());
    }

    #[test]
    fn numbers_decode_narrowly() {
        assert_eq!(number_to_json("20"), json!(20));
        assert_eq!(number_to_json("20.0"), json!(20));
        assert_eq!(number_to_json("1.25"), json!(1.25));
        assert_eq!(number_to_json("abc"), json!("abc"));
    }

    #[test]
    fn plain_conversion_infers_sets() {
        let value = AttributeValue::from_json(&json!(["a", "b"]));
        assert_eq!(value, AttributeValue::Ss(vec!["a".into(), "b".into()]));

        let value = AttributeValue::from_json(&json!([1, 2.5]));
        assert_eq!(value, AttributeValue::Ns(vec!["1".into(), "2.5".into()]));

        let value = AttributeValue::from_json(&json!([1, "a"]));
        assert!(matches!(value, AttributeValue::L(items) if items.len() == 2));
    }

    #[test]
    fn to_json_decodes_binary_as_base64() {
        let value = AttributeValue::Bs(vec![b"hi".to_vec()]);
        assert_eq!(value.to_json(), json!(["aGk="]));
    }
}
