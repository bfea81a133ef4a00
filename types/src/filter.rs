//! Condition, filter and key-condition expressions.
//!
//! Expressions never embed names or values directly: every attribute name is
//! aliased as `#nN` and every value bound as `:vN` through an
//! [`ExpressionState`] shared by all expressions of one request.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::key::KeyAttributes;
use crate::request::Names;
use crate::value::{AttributeValue, DataType, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid comparator '{0}'; expected one of: = <> < <= > >= (or eq ne lt le gt ge)")]
pub struct ComparatorParseError(String);

impl Comparator {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = ComparatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Ok(Comparator::Eq),
            "<>" | "!=" | "ne" => Ok(Comparator::Ne),
            "<" | "lt" => Ok(Comparator::Lt),
            "<=" | "le" => Ok(Comparator::Le),
            ">" | "gt" => Ok(Comparator::Gt),
            ">=" | "ge" => Ok(Comparator::Ge),
            _ => Err(ComparatorParseError(s.to_string())),
        }
    }
}

/// Alias allocator for one request's expressions.
#[derive(Debug, Clone, Default)]
pub struct ExpressionState {
    aliases: HashMap<String, String>,
    names: Names,
    values: Item,
}

impl ExpressionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias of a single attribute name, allocated on first use.
    pub fn alias(&mut self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        let alias = format!("#n{}", self.aliases.len() + 1);
        self.aliases.insert(name.to_string(), alias.clone());
        self.names.insert(alias.clone(), name.to_string());
        alias
    }

    /// Alias of a document path; each dotted segment is aliased on its own.
    pub fn path(&mut self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.alias(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Bind a value to a fresh placeholder.
    pub fn value(&mut self, value: impl Into<AttributeValue>) -> String {
        let placeholder = format!(":v{}", self.values.len() + 1);
        self.values.insert(placeholder.clone(), value.into());
        placeholder
    }

    #[must_use]
    pub fn names(&self) -> &Names {
        &self.names
    }

    #[must_use]
    pub fn values(&self) -> &Item {
        &self.values
    }

    #[must_use]
    pub fn into_parts(self) -> (Names, Item) {
        (self.names, self.values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        path: String,
        op: Comparator,
        value: AttributeValue,
    },
    In {
        path: String,
        values: Vec<AttributeValue>,
    },
    Between {
        path: String,
        low: AttributeValue,
        high: AttributeValue,
    },
    Function {
        function: &'static str,
        path: String,
    },
    FunctionValue {
        function: &'static str,
        path: String,
        value: AttributeValue,
    },
    Size {
        path: String,
        op: Comparator,
        value: AttributeValue,
    },
    Scope {
        scope: Scope,
        filter: Filter,
    },
}

/// Conditions joined by AND, each rendered in parentheses.
///
/// Scopes (`and`, `or`, `not`) fold everything rendered before them:
/// `( prior ) OR ( sub )`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    #[must_use]
    pub fn compare(mut self, path: impl Into<String>, op: Comparator, value: impl Into<AttributeValue>) -> Self {
        self.conditions.push(Condition::Compare {
            path: path.into(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn eq(self, path: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.compare(path, Comparator::Eq, value)
    }

    /// `path IN (...)`; an empty list adds no clause, since DynamoDB
    /// rejects `IN ()`.
    #[must_use]
    pub fn is_in<V: Into<AttributeValue>>(mut self, path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<AttributeValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self;
        }
        self.conditions.push(Condition::In {
            path: path.into(),
            values,
        });
        self
    }

    #[must_use]
    pub fn between(
        mut self,
        path: impl Into<String>,
        low: impl Into<AttributeValue>,
        high: impl Into<AttributeValue>,
    ) -> Self {
        self.conditions.push(Condition::Between {
            path: path.into(),
            low: low.into(),
            high: high.into(),
        });
        self
    }

    #[must_use]
    pub fn exists(mut self, path: impl Into<String>) -> Self {
        self.conditions.push(Condition::Function {
            function: "attribute_exists",
            path: path.into(),
        });
        self
    }

    #[must_use]
    pub fn not_exists(mut self, path: impl Into<String>) -> Self {
        self.conditions.push(Condition::Function {
            function: "attribute_not_exists",
            path: path.into(),
        });
        self
    }

    #[must_use]
    pub fn attribute_type(mut self, path: impl Into<String>, data_type: DataType) -> Self {
        self.conditions.push(Condition::FunctionValue {
            function: "attribute_type",
            path: path.into(),
            value: AttributeValue::S(data_type.code().to_string()),
        });
        self
    }

    #[must_use]
    pub fn begins_with(mut self, path: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.conditions.push(Condition::FunctionValue {
            function: "begins_with",
            path: path.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn contains(mut self, path: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.conditions.push(Condition::FunctionValue {
            function: "contains",
            path: path.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn size(mut self, path: impl Into<String>, op: Comparator, value: impl Into<AttributeValue>) -> Self {
        self.conditions.push(Condition::Size {
            path: path.into(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn and(self, filter: Filter) -> Self {
        self.scoped(Scope::And, filter)
    }

    #[must_use]
    pub fn or(self, filter: Filter) -> Self {
        self.scoped(Scope::Or, filter)
    }

    #[must_use]
    pub fn not(self, filter: Filter) -> Self {
        self.scoped(Scope::Not, filter)
    }

    fn scoped(mut self, scope: Scope, filter: Filter) -> Self {
        self.conditions.push(Condition::Scope { scope, filter });
        self
    }

    /// Render the expression, or `None` when nothing renders.
    pub fn write(&self, state: &mut ExpressionState) -> Option<String> {
        let mut statements: Vec<String> = Vec::new();
        for condition in &self.conditions {
            match condition {
                Condition::Compare { path, op, value } => {
                    let name = state.path(path);
                    let placeholder = state.value(value.clone());
                    statements.push(format!("( {name} {op} {placeholder} )"));
                }
                Condition::In { path, values } => {
                    let name = state.path(path);
                    let placeholders: Vec<String> =
                        values.iter().map(|v| state.value(v.clone())).collect();
                    statements.push(format!("( {name} IN ({}) )", placeholders.join(", ")));
                }
                Condition::Between { path, low, high } => {
                    let name = state.path(path);
                    let low = state.value(low.clone());
                    let high = state.value(high.clone());
                    statements.push(format!("( {name} BETWEEN {low} AND {high} )"));
                }
                Condition::Function { function, path } => {
                    let name = state.path(path);
                    statements.push(format!("( {function} ( {name} ) )"));
                }
                Condition::FunctionValue { function, path, value } => {
                    let name = state.path(path);
                    let placeholder = state.value(value.clone());
                    statements.push(format!("( {function} ( {name}, {placeholder} ) )"));
                }
                Condition::Size { path, op, value } => {
                    let name = state.path(path);
                    let placeholder = state.value(value.clone());
                    statements.push(format!("( size ( {name} ) {op} {placeholder} )"));
                }
                Condition::Scope { scope, filter } => {
                    let Some(sub) = filter.write(state) else {
                        continue;
                    };
                    fold_scope(&mut statements, *scope, &sub);
                }
            }
        }
        if statements.is_empty() {
            None
        } else {
            Some(statements.join(" AND "))
        }
    }
}

fn fold_scope(statements: &mut Vec<String>, scope: Scope, sub: &str) {
    let rendered = if statements.is_empty() {
        match scope {
            Scope::Not => format!("( NOT ( {sub} ) )"),
            Scope::And | Scope::Or => format!("( {sub} )"),
        }
    } else {
        let prior = statements.join(" AND ");
        match scope {
            Scope::And => format!("( {prior} ) AND ( {sub} )"),
            Scope::Or => format!("( {prior} ) OR ( {sub} )"),
            Scope::Not => format!("( {prior} ) AND ( NOT ( {sub} ) )"),
        }
    };
    statements.clear();
    statements.push(rendered);
}

#[derive(Debug, Clone, PartialEq)]
enum SortCondition {
    Compare(Comparator, AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

/// Key condition: partition equality plus at most one sort-key condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFilter {
    partition: Option<AttributeValue>,
    sort: Option<SortCondition>,
}

impl KeyFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn partition(mut self, value: impl Into<AttributeValue>) -> Self {
        self.partition = Some(value.into());
        self
    }

    pub fn set_partition(&mut self, value: impl Into<AttributeValue>) {
        self.partition = Some(value.into());
    }

    #[must_use]
    pub fn partition_value(&self) -> Option<&AttributeValue> {
        self.partition.as_ref()
    }

    #[must_use]
    pub fn has_sort(&self) -> bool {
        self.sort.is_some()
    }

    /// Sort-key comparison, replacing any earlier sort condition.
    #[must_use]
    pub fn compare(mut self, op: Comparator, value: impl Into<AttributeValue>) -> Self {
        self.sort = Some(SortCondition::Compare(op, value.into()));
        self
    }

    #[must_use]
    pub fn eq(self, value: impl Into<AttributeValue>) -> Self {
        self.compare(Comparator::Eq, value)
    }

    #[must_use]
    pub fn between(mut self, low: impl Into<AttributeValue>, high: impl Into<AttributeValue>) -> Self {
        self.sort = Some(SortCondition::Between(low.into(), high.into()));
        self
    }

    #[must_use]
    pub fn begins_with(mut self, value: impl Into<AttributeValue>) -> Self {
        self.sort = Some(SortCondition::BeginsWith(value.into()));
        self
    }

    pub(crate) fn set_sort_eq(&mut self, value: AttributeValue) {
        self.sort = Some(SortCondition::Compare(Comparator::Eq, value));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partition.is_none() && self.sort.is_none()
    }

    /// Render against a table or index key.
    pub fn write(
        &self,
        key: &(impl KeyAttributes + ?Sized),
        state: &mut ExpressionState,
    ) -> Option<String> {
        let mut statements = Vec::with_capacity(2);
        if let Some(value) = &self.partition {
            let name = state.alias(key.pk());
            let placeholder = state.value(value.clone());
            statements.push(format!("( {name} = {placeholder} )"));
        }
        if let Some(sort) = &self.sort {
            let name = state.alias(key.sk());
            let rendered = match sort {
                SortCondition::Compare(op, value) => {
                    let placeholder = state.value(value.clone());
                    format!("( {name} {op} {placeholder} )")
                }
                SortCondition::Between(low, high) => {
                    let low = state.value(low.clone());
                    let high = state.value(high.clone());
                    format!("( {name} BETWEEN {low} AND {high} )")
                }
                SortCondition::BeginsWith(value) => {
                    let placeholder = state.value(value.clone());
                    format!("( begins_with ( {name}, {placeholder} ) )")
                }
            };
            statements.push(rendered);
        }
        if statements.is_empty() {
            None
        } else {
            Some(statements.join(" AND "))
        }
    }
}
