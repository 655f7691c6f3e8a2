use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::database::models::Tenant;
use crate::database::storage::Storage;
use crate::filter::FilterError;
use crate::types::IsolationMode;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid tenant database name: {0}")]
    InvalidTenantName(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unique constraint violated on {table} ({columns})")]
    UniqueViolation { table: String, columns: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation { .. })
    }
}

/// Opens and destroys dedicated tenant databases for one backend
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open (creating and migrating if needed) the named database
    async fn connect(&self, database_name: &str) -> Result<Arc<dyn Storage>, DatabaseError>;

    async fn drop_database(&self, database_name: &str) -> Result<(), DatabaseError>;
}

/// Owns the central storage and a lazily populated cache of dedicated tenant storages
pub struct DatabaseManager {
    central: Arc<dyn Storage>,
    connector: Arc<dyn Connector>,
    targets: RwLock<HashMap<String, Arc<dyn Storage>>>,
    retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("central", &self.central.name())
            .field("retries", &self.retries)
            .finish()
    }
}

impl DatabaseManager {
    pub fn new(central: Arc<dyn Storage>, connector: Arc<dyn Connector>, config: &DatabaseConfig) -> Self {
        Self {
            central,
            connector,
            targets: RwLock::new(HashMap::new()),
            retries: config.activation_retries,
            backoff: Duration::from_millis(config.activation_backoff_ms),
        }
    }

    /// Central database: tenant registry plus all shared-mode tenant rows
    pub fn central(&self) -> Arc<dyn Storage> {
        self.central.clone()
    }

    /// Storage target holding `tenant`'s rows: central for shared tenants, the
    /// tenant's own database for dedicated ones
    pub async fn target_for(&self, tenant: &Tenant) -> Result<Arc<dyn Storage>, DatabaseError> {
        match tenant.isolation_mode {
            IsolationMode::Shared => Ok(self.central()),
            IsolationMode::Dedicated => {
                let name = tenant
                    .database_name
                    .as_deref()
                    .ok_or(DatabaseError::ConfigMissing("database_name"))?;
                self.dedicated(name).await
            }
        }
    }

    /// Dedicated storage for `database_name`, connecting on first use.
    ///
    /// A cached handle is pinged before it is handed out. One that fails the
    /// ping is evicted and the connection is re-established.
    pub async fn dedicated(&self, database_name: &str) -> Result<Arc<dyn Storage>, DatabaseError> {
        if !Self::is_valid_db_name(database_name) {
            return Err(DatabaseError::InvalidTenantName(database_name.to_string()));
        }

        // Fast path: try read lock
        let cached = {
            let targets = self.targets.read().await;
            targets.get(database_name).cloned()
        };
        if let Some(storage) = cached {
            match storage.ping().await {
                Ok(()) => return Ok(storage),
                Err(e) => {
                    warn!("Evicting stale connection to {}: {}", database_name, e);
                    self.targets.write().await.remove(database_name);
                }
            }
        }

        let storage = self.connect_with_retry(database_name).await?;

        let mut targets = self.targets.write().await;
        // Another task may have connected while we were waiting
        let storage = targets
            .entry(database_name.to_string())
            .or_insert(storage)
            .clone();
        Ok(storage)
    }

    async fn connect_with_retry(&self, database_name: &str) -> Result<Arc<dyn Storage>, DatabaseError> {
        let mut attempt = 0;
        loop {
            let result = match self.connector.connect(database_name).await {
                Ok(storage) => storage.ping().await.map(|_| storage),
                Err(e) => Err(e),
            };
            match result {
                Ok(storage) => {
                    info!("Connected dedicated database: {}", database_name);
                    return Ok(storage);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "Connecting {} failed (attempt {}/{}): {}",
                        database_name,
                        attempt,
                        self.retries + 1,
                        e
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close and destroy a dedicated database
    pub async fn drop_dedicated(&self, database_name: &str) -> Result<(), DatabaseError> {
        if !Self::is_valid_db_name(database_name) {
            return Err(DatabaseError::InvalidTenantName(database_name.to_string()));
        }
        if let Some(storage) = self.targets.write().await.remove(database_name) {
            storage.close().await;
        }
        self.connector.drop_database(database_name).await?;
        info!("Dropped dedicated database: {}", database_name);
        Ok(())
    }

    /// Pings the central storage to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        self.central.ping().await
    }

    /// Close every cached dedicated handle and the central storage (e.g., on shutdown)
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.targets.write().await.drain().collect();
        for (name, storage) in drained {
            storage.close().await;
            info!("Closed database connection: {}", name);
        }
        self.central.close().await;
    }

    pub async fn cached_targets(&self) -> Vec<String> {
        let mut names: Vec<_> = self.targets.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Deterministic dedicated database name for a tenant id
    pub fn dedicated_name_for(tenant_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        format!("tenant_{}", &hash[..16])
    }

    /// Swap the database path of a base Postgres URL
    pub fn build_connection_string(base: &str, database_name: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Dedicated databases must be `tenant_` followed by [a-zA-Z0-9_]+
    pub fn is_valid_db_name(name: &str) -> bool {
        match name.strip_prefix("tenant_") {
            Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        }
    }
}
