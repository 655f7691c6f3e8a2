use serde_json::Value;
use sqlx::postgres::PgArguments;

use crate::database::manager::DatabaseError;
use crate::filter::filter_where::FilterWhere;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

/// Builds parameterised statements for one table. Rows travel as a single
/// JSONB parameter and are expanded with `jsonb_populate_record`, so the
/// statement shape does not depend on the model.
pub struct QueryBuilder {
    table_name: String,
}

impl QueryBuilder {
    pub fn new(table_name: impl Into<String>) -> Result<Self, DatabaseError> {
        let name = table_name.into();
        // Reuse Filter table name validation
        Filter::new(&name)?;
        Ok(Self { table_name: name })
    }

    pub fn select_sql(&self, data: &FilterData) -> Result<SqlResult, DatabaseError> {
        Ok(Filter::from_data(&self.table_name, data)?.to_sql()?)
    }

    pub fn count_sql(&self, data: &FilterData) -> Result<SqlResult, DatabaseError> {
        Ok(self.where_only(data)?.to_count_sql()?)
    }

    /// `$1` is the row as JSONB
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO \"{t}\" AS t SELECT * FROM jsonb_populate_record(NULL::\"{t}\", $1) RETURNING to_jsonb(t.*) AS row",
            t = self.table_name
        )
    }

    /// `$1` is the changed columns as JSONB, filter parameters follow
    pub fn update_sql<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a String>,
        data: &FilterData,
    ) -> Result<SqlResult, DatabaseError> {
        let mut quoted = Vec::new();
        for column in columns {
            FilterWhere::validate_column(column)?;
            quoted.push(format!("\"{}\"", column));
        }
        if quoted.is_empty() {
            return Err(DatabaseError::QueryError("UPDATE requires at least one column".to_string()));
        }
        let list = quoted.join(", ");
        let where_result = self.where_only(data)?.to_where_sql(1)?;
        let query = format!(
            "UPDATE \"{t}\" AS t SET ({list}) = (SELECT {list} FROM jsonb_populate_record(NULL::\"{t}\", $1)) WHERE {w} RETURNING to_jsonb(t.*) AS row",
            t = self.table_name,
            list = list,
            w = where_result.query
        );
        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn delete_sql(&self, data: &FilterData) -> Result<SqlResult, DatabaseError> {
        let where_result = self.where_only(data)?.to_where_sql(0)?;
        let query = format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_result.query);
        Ok(SqlResult { query, params: where_result.params })
    }

    // Paging and ordering do not apply to counts, updates or deletes
    fn where_only(&self, data: &FilterData) -> Result<Filter, DatabaseError> {
        let where_data = FilterData {
            where_clause: data.where_clause.clone(),
            ..Default::default()
        };
        Ok(Filter::from_data(&self.table_name, &where_data)?)
    }
}

pub fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // FilterWhere expands list operands into scalars, anything left is JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v),
    }
}
