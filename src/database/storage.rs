use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::filter::FilterData;

/// One stored record as a JSON object keyed by column name
pub type Row = Map<String, Value>;

/// A physical storage target: the central database or one dedicated tenant database.
///
/// Implementations apply no tenant filtering of their own; that is the job of
/// [`crate::database::TenantRepository`].
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Database name this handle points at
    fn name(&self) -> &str;

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DatabaseError>;

    /// Insert every row or none of them
    async fn insert_all(&self, rows: Vec<(String, Row)>) -> Result<Vec<Row>, DatabaseError>;

    async fn select(&self, table: &str, filter: &FilterData) -> Result<Vec<Row>, DatabaseError>;

    async fn count(&self, table: &str, filter: &FilterData) -> Result<i64, DatabaseError>;

    /// Merge `changes` into every matching row, returning the updated rows
    async fn update(&self, table: &str, filter: &FilterData, changes: Row) -> Result<Vec<Row>, DatabaseError>;

    async fn delete(&self, table: &str, filter: &FilterData) -> Result<u64, DatabaseError>;

    /// Cheap liveness probe used before a cached handle is reused
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn close(&self) {}
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(row))
}
