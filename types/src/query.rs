//! Query and scan builder.

use crate::filter::{ExpressionState, Filter, KeyFilter};
use crate::key::KeyAttributes;
use crate::request::{QueryRequest, ReturnConsumedCapacity, ScanRequest, Select};
use crate::table::{Table, TableError, TableLink};
use crate::value::{AttributeValue, Item, Record};

/// A query or scan over a table, optionally narrowed to a schema and index.
#[derive(Debug, Clone)]
pub struct Query<'t> {
    link: TableLink<'t>,
    limit: Option<u32>,
    consistent_read: bool,
    ascending: bool,
    select: Select,
    projection: Vec<String>,
    filter: Filter,
    key_filter: KeyFilter,
    start_key: Option<Item>,
}

impl<'t> Query<'t> {
    /// Resolve the link and pre-set the partition value when the addressed
    /// key template renders without data.
    pub fn new(table: &'t Table, schema: Option<&str>, index: Option<&str>) -> Result<Self, TableError> {
        let link = table.link(schema, index)?;
        let mut key_filter = KeyFilter::new();
        if let Some(format) = link.key_format()
            && let Some(pk) = format.format_pk(&Record::new())
        {
            key_filter.set_partition(AttributeValue::key(link.key().pk_type(), pk));
        }
        Ok(Self {
            link,
            limit: None,
            consistent_read: false,
            ascending: true,
            select: if index.is_some() {
                Select::AllProjectedAttributes
            } else {
                Select::AllAttributes
            },
            projection: Vec::new(),
            filter: Filter::new(),
            key_filter,
            start_key: None,
        })
    }

    /// A non-positive limit means no limit.
    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.set_limit(limit);
        self
    }

    pub fn set_limit(&mut self, limit: i64) {
        self.limit = u32::try_from(limit).ok().filter(|n| *n > 0);
    }

    #[must_use]
    pub fn with_consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = consistent;
        self
    }

    #[must_use]
    pub fn with_order(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    #[must_use]
    pub fn with_select(mut self, select: Select) -> Self {
        self.select = select;
        self
    }

    /// Project only the named attributes; implies `SPECIFIC_ATTRIBUTES`.
    #[must_use]
    pub fn with_projection<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.projection.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the key condition; a filter without a partition value keeps
    /// the current one.
    #[must_use]
    pub fn with_key_filter(mut self, mut key_filter: KeyFilter) -> Self {
        if key_filter.partition_value().is_none()
            && let Some(current) = self.key_filter.partition_value()
        {
            key_filter.set_partition(current.clone());
        }
        self.key_filter = key_filter;
        self
    }

    #[must_use]
    pub fn with_start_key(mut self, start_key: Option<Item>) -> Self {
        self.set_start_key(start_key);
        self
    }

    /// Keep only the key attributes of the table and the queried index whose
    /// wire type matches the declaration.
    pub fn set_start_key(&mut self, start_key: Option<Item>) {
        let mut keys: Vec<&dyn KeyAttributes> = vec![self.link.table().key() as &dyn KeyAttributes];
        if let Some(index) = self.link.index() {
            keys.push(index);
        }

        let filtered: Item = start_key
            .unwrap_or_default()
            .into_iter()
            .filter(|(name, value)| {
                let name = name.as_str();
                keys.iter().any(|key| {
                    (key.pk() == name && key.pk_type() == value.data_type())
                        || (key.sk() == name && key.sk_type() == value.data_type())
                })
            })
            .collect();
        self.start_key = (!filtered.is_empty()).then_some(filtered);
    }

    /// Set partition and sort equality from the schema's key templates.
    pub fn apply_key(&mut self, record: &Record) -> Result<(), TableError> {
        let schema = self.link.schema().ok_or(TableError::SchemaRequired)?;
        let format = self.link.key_format().ok_or_else(|| TableError::MissingIndexFormat {
            schema: schema.name().to_string(),
            index: self.link.index().map(|i| i.name().to_string()).unwrap_or_default(),
        })?;
        let key = self.link.key();
        if let Some(pk) = format.format_pk(record) {
            self.key_filter.set_partition(AttributeValue::key(key.pk_type(), pk));
        }
        if let Some(sk) = format.format_sk(record) {
            self.key_filter.set_sort_eq(AttributeValue::key(key.sk_type(), sk));
        }
        Ok(())
    }

    #[must_use]
    pub fn link(&self) -> &TableLink<'t> {
        &self.link
    }

    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub fn start_key(&self) -> Option<&Item> {
        self.start_key.as_ref()
    }

    #[must_use]
    pub fn has_partition(&self) -> bool {
        self.key_filter.partition_value().is_some()
    }

    fn resolved_select(&self) -> Select {
        if !self.projection.is_empty() {
            Select::SpecificAttributes
        } else if self.link.index().is_none() && self.select == Select::AllProjectedAttributes {
            Select::AllAttributes
        } else {
            self.select
        }
    }

    fn projection_expression(&self, state: &mut ExpressionState) -> Option<String> {
        if self.projection.is_empty() {
            return None;
        }
        let paths: Vec<String> = self.projection.iter().map(|name| state.path(name)).collect();
        Some(paths.join(", "))
    }

    pub fn build_query(&self) -> Result<QueryRequest, TableError> {
        if !self.has_partition() {
            return Err(TableError::MissingPartition);
        }
        let mut state = ExpressionState::new();
        let key_condition_expression = self
            .key_filter
            .write(self.link.key(), &mut state)
            .ok_or(TableError::MissingPartition)?;
        let filter_expression = self.filter.write(&mut state);
        let projection_expression = self.projection_expression(&mut state);
        let (names, values) = state.into_parts();

        Ok(QueryRequest {
            table_name: self.link.table().name().to_string(),
            index_name: self.link.index().map(|index| index.name().to_string()),
            key_condition_expression,
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            select: self.resolved_select(),
            limit: self.limit,
            consistent_read: Some(self.consistent_read),
            scan_index_forward: self.ascending,
            exclusive_start_key: self.start_key.clone(),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Indexes),
        })
    }

    /// Scan the table or index; a linked schema narrows the scan to records
    /// tagged with it.
    pub fn build_scan(&self) -> Result<ScanRequest, TableError> {
        let table = self.link.table();
        let filter = match (self.link.schema(), table.schema_field()) {
            (Some(schema), Some(field)) => Filter::new()
                .eq(field, schema.name())
                .and(self.filter.clone()),
            _ => self.filter.clone(),
        };

        let mut state = ExpressionState::new();
        let filter_expression = filter.write(&mut state);
        let projection_expression = self.projection_expression(&mut state);
        let (names, values) = state.into_parts();

        Ok(ScanRequest {
            table_name: table.name().to_string(),
            index_name: self.link.index().map(|index| index.name().to_string()),
            filter_expression,
            projection_expression,
            expression_attribute_names: names,
            expression_attribute_values: values,
            select: self.resolved_select(),
            limit: self.limit,
            consistent_read: Some(self.consistent_read),
            exclusive_start_key: self.start_key.clone(),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Indexes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::filter::Comparator;
    use crate::index::{GlobalIndex, GlobalIndexFormat};
    use crate::key::KeyFormat;
    use crate::schema::Schema;
    use insta::assert_snapshot;
    use serde_json::{Value, json};

    fn table() -> Table {
        let user = Schema::new(
            "User",
            KeyFormat::parse("account#user#", "accountid#{accountid}#user#{userid}").unwrap(),
        )
        .with_index(GlobalIndexFormat::new(
            "gsi1",
            KeyFormat::parse("user#", "email#{email}").unwrap().require(["email"]),
        ))
        .with_attribute("accountid", Attribute::uuid())
        .with_attribute("userid", Attribute::uuid())
        .with_attribute("email", Attribute::string())
        .with_attribute("age", Attribute::int());
        let orphan = Schema::new("Orphan", KeyFormat::parse("{id}", "{id}").unwrap())
            .with_attribute("id", Attribute::string());

        Table::new("sample")
            .with_index(GlobalIndex::new("gsi1"))
            .with_schema(user)
            .with_schema(orphan)
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn partition_is_preset_from_constant_template() {
        let table = table();
        let query = Query::new(&table, Some("User"), None).unwrap();
        assert!(query.has_partition());

        let query = Query::new(&table, Some("Orphan"), None).unwrap();
        assert!(!query.has_partition());
        assert_eq!(query.build_query().unwrap_err(), TableError::MissingPartition);
    }

    #[test]
    fn builds_query_with_key_and_filter() {
        let table = table();
        let query = Query::new(&table, Some("User"), None)
            .unwrap()
            .with_key_filter(KeyFilter::new().begins_with("accountid#a1"))
            .with_filter(Filter::new().compare("age", Comparator::Gt, 30_i64))
            .with_limit(10)
            .with_order(false);
        let request = query.build_query().unwrap();
        assert_snapshot!(request.key_condition_expression, @"( #n1 = :v1 ) AND ( begins_with ( #n2, :v2 ) )");
        assert_eq!(request.filter_expression.as_deref(), Some("( #n3 > :v3 )"));
        assert_eq!(request.limit, Some(10));
        assert!(!request.scan_index_forward);
        assert_eq!(request.select, Select::AllAttributes);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["ExpressionAttributeValues"][":v1"], json!({"S": "account#user#"}));
        assert_eq!(body["ReturnConsumedCapacity"], json!("INDEXES"));
        assert!(body.get("IndexName").is_none());
    }

    #[test]
    fn apply_key_sets_partition_and_sort() {
        let table = table();
        let mut query = Query::new(&table, Some("User"), Some("gsi1")).unwrap();
        query.apply_key(&record(json!({"email": "a@b.c"}))).unwrap();
        let request = query.build_query().unwrap();
        assert_eq!(request.index_name.as_deref(), Some("gsi1"));
        assert_eq!(request.select, Select::AllProjectedAttributes);
        assert_eq!(request.expression_attribute_names["#n1"], "gsi1_pk");
        assert_eq!(request.expression_attribute_values[":v2"], AttributeValue::S("email#a@b.c".into()));
    }

    #[test]
    fn non_positive_limit_means_none() {
        let table = table();
        let query = Query::new(&table, Some("User"), None).unwrap().with_limit(0);
        assert_eq!(query.limit(), None);
        let query = query.with_limit(-3);
        assert_eq!(query.limit(), None);
    }

    #[test]
    fn projection_implies_specific_attributes() {
        let table = table();
        let request = Query::new(&table, Some("User"), None)
            .unwrap()
            .with_projection(["email", "age"])
            .build_query()
            .unwrap();
        assert_eq!(request.select, Select::SpecificAttributes);
        assert_eq!(request.projection_expression.as_deref(), Some("#n2, #n3"));
    }

    #[test]
    fn start_key_keeps_only_matching_key_attributes() {
        let table = table();
        let mut start = Item::new();
        start.insert("pk".into(), AttributeValue::S("a".into()));
        start.insert("sk".into(), AttributeValue::N("1".into()));
        start.insert("gsi1_pk".into(), AttributeValue::S("b".into()));
        start.insert("email".into(), AttributeValue::S("c".into()));

        let query = Query::new(&table, Some("User"), None)
            .unwrap()
            .with_start_key(Some(start.clone()));
        let kept: Vec<&String> = query.start_key().unwrap().keys().collect();
        assert_eq!(kept, vec!["pk"]);

        let query = Query::new(&table, Some("User"), Some("gsi1"))
            .unwrap()
            .with_start_key(Some(start));
        let kept: Vec<&String> = query.start_key().unwrap().keys().collect();
        assert_eq!(kept, vec!["gsi1_pk", "pk"]);

        let query = Query::new(&table, None, None).unwrap().with_start_key(None);
        assert!(query.start_key().is_none());
    }

    #[test]
    fn scan_narrows_to_schema_records() {
        let table = table();
        let request = Query::new(&table, Some("User"), None)
            .unwrap()
            .with_filter(Filter::new().exists("email"))
            .build_scan()
            .unwrap();
        assert_snapshot!(request.filter_expression.unwrap(), @"( ( #n1 = :v1 ) ) AND ( ( attribute_exists ( #n2 ) ) )");
        assert_eq!(request.expression_attribute_names["#n1"], "schema");

        let request = Query::new(&table, None, None).unwrap().build_scan().unwrap();
        assert!(request.filter_expression.is_none());
    }
}
