use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::database::manager::{Connector, DatabaseError};
use crate::database::schema::{self, TableDef};
use crate::database::storage::{Row, Storage};
use crate::filter::{Filter, FilterData, RowMatcher};

/// In-process storage backend. Used by the development profile and the test suite;
/// enforces the same unique indexes as the Postgres DDL.
#[derive(Debug)]
pub struct MemoryStorage {
    name: String,
    defs: HashMap<&'static str, TableDef>,
    tables: RwLock<HashMap<String, Vec<Row>>>,
    online: AtomicBool,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>, tables: Vec<TableDef>) -> Self {
        let defs: HashMap<_, _> = tables.into_iter().map(|t| (t.name, t)).collect();
        let data = defs.keys().map(|k| (k.to_string(), Vec::new())).collect();
        Self {
            name: name.into(),
            defs,
            tables: RwLock::new(data),
            online: AtomicBool::new(true),
        }
    }

    pub fn central(name: impl Into<String>) -> Self {
        Self::new(name, schema::central_tables())
    }

    pub fn dedicated(name: impl Into<String>) -> Self {
        Self::new(name, schema::dedicated_tables())
    }

    /// Simulate the database going away (or coming back)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DatabaseError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::Unavailable(self.name.clone()))
        }
    }

    fn def(&self, table: &str) -> Result<&TableDef, DatabaseError> {
        self.defs
            .get(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))
    }

    /// Find a unique index that `row` would collide on. `skip` is the position
    /// of the row being replaced, if any.
    fn collision(def: &TableDef, rows: &[Row], row: &Row, skip: Option<usize>) -> Option<String> {
        for index in def.unique {
            let key: Vec<&Value> = index.iter().map(|c| row.get(*c).unwrap_or(&Value::Null)).collect();
            // NULLs never collide, as in Postgres
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            let taken = rows.iter().enumerate().any(|(i, other)| {
                Some(i) != skip
                    && index
                        .iter()
                        .zip(&key)
                        .all(|(c, v)| other.get(*c).map(|o| o == *v).unwrap_or(false))
            });
            if taken {
                return Some(index.join(", "));
            }
        }
        None
    }

    fn push_checked(&self, tables: &mut HashMap<String, Vec<Row>>, table: &str, row: Row) -> Result<Row, DatabaseError> {
        let def = self.def(table)?;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(columns) = Self::collision(def, rows, &row, None) {
            return Err(DatabaseError::UniqueViolation { table: table.to_string(), columns });
        }
        rows.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DatabaseError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        self.push_checked(&mut tables, table, row)
    }

    async fn insert_all(&self, rows: Vec<(String, Row)>) -> Result<Vec<Row>, DatabaseError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        // Work on a copy so a failure leaves nothing behind
        let mut staged = tables.clone();
        let mut inserted = Vec::with_capacity(rows.len());
        for (table, row) in rows {
            inserted.push(self.push_checked(&mut staged, &table, row)?);
        }
        *tables = staged;
        Ok(inserted)
    }

    async fn select(&self, table: &str, filter: &FilterData) -> Result<Vec<Row>, DatabaseError> {
        self.check_online()?;
        self.def(table)?;
        let filter = Filter::from_data(table, filter)?;
        let tables = self.tables.read().await;
        let rows = tables.get(table).cloned().unwrap_or_default();
        Ok(RowMatcher::new(&filter).apply(rows)?)
    }

    async fn count(&self, table: &str, filter: &FilterData) -> Result<i64, DatabaseError> {
        self.check_online()?;
        self.def(table)?;
        let filter = Filter::from_data(table, &FilterData { where_clause: filter.where_clause.clone(), ..Default::default() })?;
        let matcher = RowMatcher::new(&filter);
        let tables = self.tables.read().await;
        let mut n = 0;
        for row in tables.get(table).map(Vec::as_slice).unwrap_or_default() {
            if matcher.matches(row)? {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn update(&self, table: &str, filter: &FilterData, changes: Row) -> Result<Vec<Row>, DatabaseError> {
        self.check_online()?;
        let def = self.def(table)?;
        let filter = Filter::from_data(table, filter)?;
        let matcher = RowMatcher::new(&filter);

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let mut next = rows.clone();
        let mut updated = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if !matcher.matches(row)? {
                continue;
            }
            let mut merged = row.clone();
            for (k, v) in &changes {
                merged.insert(k.clone(), v.clone());
            }
            next[i] = merged.clone();
            updated.push((i, merged));
        }
        for (i, row) in &updated {
            if let Some(columns) = Self::collision(def, &next, row, Some(*i)) {
                return Err(DatabaseError::UniqueViolation { table: table.to_string(), columns });
            }
        }
        *rows = next;
        Ok(updated.into_iter().map(|(_, row)| row).collect())
    }

    async fn delete(&self, table: &str, filter: &FilterData) -> Result<u64, DatabaseError> {
        self.check_online()?;
        self.def(table)?;
        let filter = Filter::from_data(table, &FilterData { where_clause: filter.where_clause.clone(), ..Default::default() })?;
        let matcher = RowMatcher::new(&filter);

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let mut kept = Vec::with_capacity(rows.len());
        let mut removed = 0;
        for row in rows.drain(..) {
            if matcher.matches(&row)? {
                removed += 1;
            } else {
                kept.push(row);
            }
        }
        *rows = kept;
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check_online()
    }
}

/// Hands out in-process dedicated databases. Reconnecting to a name returns the
/// same storage, so data survives cache eviction like a real database would.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    databases: Mutex<HashMap<String, Arc<MemoryStorage>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct handle to a database created by this connector
    pub fn storage(&self, name: &str) -> Option<Arc<MemoryStorage>> {
        self.databases.lock().ok()?.get(name).cloned()
    }

    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .databases
            .lock()
            .map(|dbs| dbs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, database_name: &str) -> Result<Arc<dyn Storage>, DatabaseError> {
        let mut databases = self
            .databases
            .lock()
            .map_err(|_| DatabaseError::Unavailable(database_name.to_string()))?;
        let storage = databases
            .entry(database_name.to_string())
            .or_insert_with(|| Arc::new(MemoryStorage::dedicated(database_name)))
            .clone();
        Ok(storage)
    }

    async fn drop_database(&self, database_name: &str) -> Result<(), DatabaseError> {
        let mut databases = self
            .databases
            .lock()
            .map_err(|_| DatabaseError::Unavailable(database_name.to_string()))?;
        databases.remove(database_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn composite_unique_index_is_scoped() {
        let db = MemoryStorage::central("hrms_central");
        db.insert("users", row(json!({"id": "1", "tenant_id": "a", "email": "x@y.z"}))).await.unwrap();
        // Same email, other tenant
        db.insert("users", row(json!({"id": "2", "tenant_id": "b", "email": "x@y.z"}))).await.unwrap();

        let err = db
            .insert("users", row(json!({"id": "3", "tenant_id": "a", "email": "x@y.z"})))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(db.count("users", &FilterData::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_all_is_atomic() {
        let db = MemoryStorage::central("hrms_central");
        db.insert("domains", row(json!({"id": "d0", "domain": "taken.localhost"}))).await.unwrap();

        let result = db
            .insert_all(vec![
                ("tenants".to_string(), row(json!({"id": "t1", "slug": "acme"}))),
                ("domains".to_string(), row(json!({"id": "d1", "domain": "taken.localhost"}))),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(db.count("tenants", &FilterData::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_merges_matching_rows() {
        let db = MemoryStorage::dedicated("tenant_x");
        db.insert("departments", row(json!({"id": "1", "name": "Eng", "is_active": true}))).await.unwrap();
        db.insert("departments", row(json!({"id": "2", "name": "Ops", "is_active": true}))).await.unwrap();

        let updated = db
            .update("departments", &FilterData::matching(json!({"id": "2"})), row(json!({"is_active": false})))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["name"], json!("Ops"));

        let active = db.count("departments", &FilterData::matching(json!({"is_active": true}))).await.unwrap();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn offline_storage_refuses_work() {
        let db = MemoryStorage::dedicated("tenant_x");
        db.set_online(false);
        assert!(matches!(db.ping().await, Err(DatabaseError::Unavailable(_))));
        assert!(db.select("departments", &FilterData::default()).await.is_err());
    }

    #[tokio::test]
    async fn unknown_table_is_rejected() {
        let db = MemoryStorage::dedicated("tenant_x");
        assert!(matches!(
            db.select("tenants", &FilterData::default()).await,
            Err(DatabaseError::UnknownTable(_))
        ));
    }
}
