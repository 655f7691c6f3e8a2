use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo};

/// Compiles a JSON WHERE clause into a parameterised Postgres predicate.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Placeholders are numbered from `starting_param_index + 1`
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        Self::validate(where_data)?;
        let mut filter_where = Self::new(starting_param_index);
        let clause = filter_where.build_clause(where_data)?;
        Ok((clause, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build_clause(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok("1=1".to_string()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut sql_conditions = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                sql_conditions.push(self.build_logical(key, value)?);
            } else {
                for condition in Self::parse_field_condition(key, value)? {
                    sql_conditions.push(self.build_sql_condition(&condition)?);
                }
            }
        }

        if sql_conditions.is_empty() {
            Ok("1=1".to_string())
        } else {
            Ok(sql_conditions.join(" AND "))
        }
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    // Empty conjunction is true, empty disjunction is false
                    return Ok(if op == "$and" { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    Self::validate(v)?;
                    sql_parts.push(format!("({})", self.build_clause(v)?));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => {
                Self::validate(value)?;
                Ok(format!("NOT ({})", self.build_clause(value)?))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    pub(crate) fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        Self::validate_column(field)?;
        let mut out = Vec::new();
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    let operator = Self::map_operator(op_key)?;
                    out.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() });
                }
            }
            // Implicit equality: { field: value }
            _ => out.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() }),
        }
        Ok(out)
    }

    pub(crate) fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$null" => FilterOp::Null,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    pub(crate) fn validate_column(column: &str) -> Result<(), FilterError> {
        let mut chars = column.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq => {
                if data.is_null() { Ok(format!("{} IS NULL", quoted_column)) }
                else { Ok(format!("{} = {}", quoted_column, self.param(data.clone()))) }
            }
            FilterOp::Ne => {
                if data.is_null() { Ok(format!("{} IS NOT NULL", quoted_column)) }
                else { Ok(format!("{} <> {}", quoted_column, self.param(data.clone()))) }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted_column, self.param(data.clone()))),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted_column, self.param(data.clone()))),
            FilterOp::Lt => Ok(format!("{} < {}", quoted_column, self.param(data.clone()))),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted_column, self.param(data.clone()))),
            FilterOp::Like => Ok(format!("{} LIKE {}", quoted_column, self.param(data.clone()))),
            FilterOp::ILike => Ok(format!("{} ILIKE {}", quoted_column, self.param(data.clone()))),
            FilterOp::In | FilterOp::NIn => {
                let negate = condition.operator == FilterOp::NIn;
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    let low = self.param(values[0].clone());
                    let high = self.param(values[1].clone());
                    Ok(format!("{} BETWEEN {} AND {}", quoted_column, low, high))
                }
                _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Null => match data.as_bool() {
                Some(true) => Ok(format!("{} IS NULL", quoted_column)),
                Some(false) => Ok(format!("{} IS NOT NULL", quoted_column)),
                None => Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_uses_placeholders() {
        let (sql, params) = FilterWhere::generate(&json!({ "name": "Engineering" }), 0).unwrap();
        assert_eq!(sql, "\"name\" = $1");
        assert_eq!(params, vec![json!("Engineering")]);
    }

    #[test]
    fn nested_logical_operators_keep_numbering() {
        let where_data = json!({
            "$and": [
                { "$or": [{ "name": "a" }, { "name": "b" }] },
                { "tenant_id": "t1" }
            ]
        });
        let (sql, params) = FilterWhere::generate(&where_data, 1).unwrap();
        assert_eq!(sql, "((((\"name\" = $2) OR (\"name\" = $3))) AND (\"tenant_id\" = $4))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn rejects_unsafe_column_names() {
        let err = FilterWhere::generate(&json!({ "name\" OR 1=1 --": "x" }), 0).unwrap_err();
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }

    #[test]
    fn rejects_raw_string_clauses() {
        assert!(FilterWhere::generate(&json!("1=1"), 0).is_err());
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({ "id": { "$in": [] } }), 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }
}
