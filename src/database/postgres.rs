use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, Row as _};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::database::manager::{Connector, DatabaseError, DatabaseManager};
use crate::database::query_builder::{bind_param, QueryBuilder};
use crate::database::schema::{self, TableDef};
use crate::database::storage::{Row, Storage};
use crate::filter::FilterData;

/// Postgres-backed storage for one database
#[derive(Debug, Clone)]
pub struct PgStorage {
    name: String,
    pool: PgPool,
    tables: Vec<TableDef>,
}

impl PgStorage {
    pub fn new(name: impl Into<String>, pool: PgPool, tables: Vec<TableDef>) -> Self {
        Self { name: name.into(), pool, tables }
    }

    fn builder(&self, table: &str) -> Result<QueryBuilder, DatabaseError> {
        if !self.tables.iter().any(|t| t.name == table) {
            return Err(DatabaseError::UnknownTable(table.to_string()));
        }
        QueryBuilder::new(table)
    }

    fn map_err(table: &str, err: sqlx::Error) -> DatabaseError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                return DatabaseError::UniqueViolation {
                    table: table.to_string(),
                    columns: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        DatabaseError::Sqlx(err)
    }

    fn into_row(row: &sqlx::postgres::PgRow) -> Result<Row, DatabaseError> {
        match row.try_get::<Value, _>("row")? {
            Value::Object(map) => Ok(map),
            other => Err(DatabaseError::QueryError(format!("expected JSON object row, got {}", other))),
        }
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DatabaseError> {
        let sql = self.builder(table)?.insert_sql();
        let payload = Value::Object(row);
        let record = sqlx::query(&sql)
            .bind(&payload)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_err(table, e))?;
        Self::into_row(&record)
    }

    async fn insert_all(&self, rows: Vec<(String, Row)>) -> Result<Vec<Row>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for (table, row) in rows {
            let sql = self.builder(&table)?.insert_sql();
            let payload = Value::Object(row);
            let record = sqlx::query(&sql)
                .bind(&payload)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| Self::map_err(&table, e))?;
            inserted.push(Self::into_row(&record)?);
        }
        // Dropping the transaction on an early return rolls it back
        tx.commit().await?;
        Ok(inserted)
    }

    async fn select(&self, table: &str, filter: &FilterData) -> Result<Vec<Row>, DatabaseError> {
        let sql_result = self.builder(table)?.select_sql(filter)?;
        debug!("{} select: {}", self.name, sql_result.query);
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let records = q.fetch_all(&self.pool).await?;
        records.iter().map(Self::into_row).collect()
    }

    async fn count(&self, table: &str, filter: &FilterData) -> Result<i64, DatabaseError> {
        let sql_result = self.builder(table)?.count_sql(filter)?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let record = q.fetch_one(&self.pool).await?;
        Ok(record.try_get("count")?)
    }

    async fn update(&self, table: &str, filter: &FilterData, changes: Row) -> Result<Vec<Row>, DatabaseError> {
        let sql_result = self.builder(table)?.update_sql(changes.keys(), filter)?;
        let payload = Value::Object(changes);
        let mut q = sqlx::query(&sql_result.query).bind(&payload);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let records = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::map_err(table, e))?;
        records.iter().map(Self::into_row).collect()
    }

    async fn delete(&self, table: &str, filter: &FilterData) -> Result<u64, DatabaseError> {
        let sql_result = self.builder(table)?.delete_sql(filter)?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        Ok(q.execute(&self.pool).await?.rows_affected())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::Unavailable(format!("{}: {}", self.name, e)))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Creates, migrates and drops dedicated tenant databases on one Postgres server
#[derive(Debug, Clone)]
pub struct PgConnector {
    base_url: String,
    admin: PgPool,
    max_connections: u32,
    timeout: Duration,
}

impl PgConnector {
    /// Connects the administrative pool (the `postgres` database) from `DatabaseConfig::url`
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let base_url = config.url.clone().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let timeout = Duration::from_secs(config.connection_timeout);
        let admin_url = DatabaseManager::build_connection_string(&base_url, "postgres")?;
        let admin = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(timeout)
            .connect(&admin_url)
            .await?;
        Ok(Self { base_url, admin, max_connections: config.max_connections, timeout })
    }

    /// Open the central database, creating and migrating it if needed.
    /// Shared-mode tenant tables live here too.
    pub async fn open_central(&self, database_name: &str) -> Result<PgStorage, DatabaseError> {
        let pool = self
            .open(database_name, &[schema::CENTRAL_MIGRATIONS, schema::TENANT_MIGRATIONS])
            .await?;
        Ok(PgStorage::new(database_name, pool, schema::central_tables()))
    }

    async fn open(&self, database_name: &str, migrations: &[&str]) -> Result<PgPool, DatabaseError> {
        self.ensure_database(database_name).await?;
        let url = DatabaseManager::build_connection_string(&self.base_url, database_name)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.timeout)
            .connect(&url)
            .await?;
        // Multi-statement DDL goes through the simple query protocol
        for ddl in migrations {
            (&pool).execute(*ddl).await?;
        }
        info!("Opened database pool for: {}", database_name);
        Ok(pool)
    }

    async fn ensure_database(&self, database_name: &str) -> Result<(), DatabaseError> {
        let exists = sqlx::query("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(database_name)
            .fetch_optional(&self.admin)
            .await?
            .is_some();
        if !exists {
            let ddl = format!("CREATE DATABASE {}", quote_identifier(database_name));
            sqlx::query(&ddl).execute(&self.admin).await?;
            info!("Created database: {}", database_name);
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, database_name: &str) -> Result<Arc<dyn Storage>, DatabaseError> {
        let pool = self.open(database_name, &[schema::TENANT_MIGRATIONS]).await?;
        Ok(Arc::new(PgStorage::new(database_name, pool, schema::dedicated_tables())))
    }

    async fn drop_database(&self, database_name: &str) -> Result<(), DatabaseError> {
        let ddl = format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", quote_identifier(database_name));
        sqlx::query(&ddl).execute(&self.admin).await?;
        Ok(())
    }
}

/// Quote SQL identifier to prevent injection
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("tenant_abc"), "\"tenant_abc\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
