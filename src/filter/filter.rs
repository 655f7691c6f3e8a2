use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};

/// Validated filter bound to one table. Produces SQL for the Postgres backend
/// and exposes its parts to the in-process matcher.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    /// Build and validate a filter for `table_name` in one step
    pub fn from_data(table_name: &str, data: &FilterData) -> Result<Self, FilterError> {
        let mut filter = Self::new(table_name)?;
        filter.assign(data.clone())?;
        Ok(filter)
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        else if let Some(offset) = data.offset {
            if offset < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); }
            self.offset = Some(offset);
        }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column != "*" { FilterWhere::validate_column(column)?; }
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        // Compile once up front so malformed clauses fail before reaching a backend
        FilterWhere::generate(&conditions, 0)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn table_name(&self) -> &str { &self.table_name }
    pub fn where_data(&self) -> Option<&Value> { self.where_data.as_ref() }
    pub fn order_data(&self) -> &[FilterOrderInfo] { &self.order_data }
    pub fn select_columns(&self) -> &[String] { &self.select_columns }
    pub fn limit_value(&self) -> Option<i32> { self.limit }
    pub fn offset_value(&self) -> Option<i32> { self.offset }

    /// Rows are projected through `to_jsonb` so every backend returns JSON objects
    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {} AS row", self.build_select_clause()),
            format!("FROM \"{}\" AS t", self.table_name),
            format!("WHERE {}", where_result.query),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    /// WHERE predicate only, with placeholders numbered after `starting_param_index`
    pub fn to_where_sql(&self, starting_param_index: usize) -> Result<SqlResult, FilterError> {
        let (query, params) = match self.where_data {
            Some(ref where_data) => FilterWhere::generate(where_data, starting_param_index)?,
            None => ("1=1".to_string(), vec![]),
        };
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(0)?;
        let query = format!("SELECT COUNT(*) as count FROM \"{}\" WHERE {}", self.table_name, where_result.query);
        Ok(SqlResult { query, params: where_result.params })
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() { return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())); }
        FilterWhere::validate_column(name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "to_jsonb(t)".to_string()
        } else {
            let pairs = self.select_columns
                .iter()
                .map(|c| format!("'{}', t.\"{}\"", c, c))
                .collect::<Vec<_>>()
                .join(", ");
            format!("jsonb_build_object({})", pairs)
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_sql_projects_rows_as_json() {
        let data = FilterData {
            where_clause: Some(json!({ "tenant_id": "t1" })),
            order: Some(json!("name asc")),
            limit: Some(10),
            ..Default::default()
        };
        let sql = Filter::from_data("departments", &data).unwrap().to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT to_jsonb(t) AS row FROM \"departments\" AS t WHERE \"tenant_id\" = $1 ORDER BY \"name\" ASC LIMIT 10"
        );
        assert_eq!(sql.params, vec![json!("t1")]);
    }

    #[test]
    fn count_sql_without_where_matches_all() {
        let sql = Filter::new("users").unwrap().to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) as count FROM \"users\" WHERE 1=1");
    }

    #[test]
    fn rejects_negative_limit_and_bad_table() {
        assert!(Filter::new("users; drop").is_err());
        let data = FilterData { limit: Some(-1), ..Default::default() };
        assert!(Filter::from_data("users", &data).is_err());
    }
}
