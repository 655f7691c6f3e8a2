use chrono::Utc;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::config;
use crate::database::models::{tenant, Tenant, TenantScoped};
use crate::database::storage::{from_row, to_row, Row, Storage};
use crate::database::DatabaseManager;
use crate::filter::FilterData;
use crate::tenancy::{TenancyError, TenantContext};

/// Data access for one tenant-owned row type, confined to the tenant active in `ctx`.
///
/// Every read, update and delete is AND-combined with `tenant_id = <active tenant>`
/// whatever filter the caller passes, so caller filters can narrow results but
/// never widen them to another tenant.
pub struct TenantRepository<'c, T> {
    ctx: &'c TenantContext,
    db: Arc<DatabaseManager>,
    _phantom: PhantomData<T>,
}

impl<'c, T: TenantScoped> TenantRepository<'c, T> {
    pub fn new(ctx: &'c TenantContext, db: Arc<DatabaseManager>) -> Self {
        Self { ctx, db, _phantom: PhantomData }
    }

    /// Bypass tenant filtering entirely. `call_site` names the caller in the audit log.
    pub fn without_tenancy(storage: Arc<dyn Storage>, call_site: &'static str) -> Unscoped<T> {
        Unscoped { storage, call_site, _phantom: PhantomData }
    }

    fn scope(&self) -> Result<(Arc<dyn Storage>, Uuid), TenancyError> {
        match self.ctx.current() {
            Ok(active) => Ok((active.storage.clone(), active.tenant.id)),
            Err(e) => {
                error!("Tenant-scoped access to {} without an active tenant", T::TABLE);
                Err(e)
            }
        }
    }

    fn scoped_filter(filter: FilterData, tenant_id: Uuid) -> FilterData {
        filter.and_where(json!({ "tenant_id": tenant_id }))
    }

    /// Registered tenant `id`, read from central storage
    async fn owner(&self, id: Uuid) -> Result<Tenant, TenancyError> {
        let filter = FilterData { limit: Some(1), ..FilterData::matching(json!({ "id": id })) };
        match self.db.central().select(tenant::TABLE, &filter).await?.into_iter().next() {
            Some(row) => Ok(from_row(row)?),
            None => Err(TenancyError::TenantNotFound(id.to_string())),
        }
    }

    /// Store a new row. A missing `tenant_id` is taken from the active tenant.
    ///
    /// With no active tenant an explicit `tenant_id` is accepted and the row is
    /// written to that tenant's own storage target.
    pub async fn create(&self, mut entity: T) -> Result<T, TenancyError> {
        let storage = match (self.ctx.current(), entity.tenant_id()) {
            (Ok(active), None) => {
                entity.set_tenant_id(active.tenant.id);
                active.storage.clone()
            }
            (Ok(active), Some(found)) if found != active.tenant.id => {
                error!("Refusing to create {} row for tenant {} inside tenant {}", T::TABLE, found, active.tenant.id);
                return Err(TenancyError::TenantMismatch { active: active.tenant.id, found });
            }
            (Ok(active), Some(_)) => active.storage.clone(),
            (Err(_), Some(found)) => {
                let owner = self.owner(found).await?;
                debug!(
                    "Creating {} row for tenant {} ({}) without an active context",
                    T::TABLE, owner.slug, owner.isolation_mode
                );
                self.db
                    .target_for(&owner)
                    .await
                    .map_err(|source| TenancyError::ContextActivation { tenant_id: found, source })?
            }
            (Err(e), None) => {
                error!("Tenant-scoped create on {} without an active tenant", T::TABLE);
                return Err(e);
            }
        };

        let row = storage.insert(T::TABLE, to_row(&entity)?).await?;
        Ok(from_row(row)?)
    }

    pub async fn find(&self, id: Uuid) -> Result<T, TenancyError> {
        self.select_one(FilterData::matching(json!({ "id": id })))
            .await?
            .ok_or_else(|| TenancyError::NotFound { entity: T::TABLE, id: id.to_string() })
    }

    pub async fn select_one(&self, filter: FilterData) -> Result<Option<T>, TenancyError> {
        let mut filter = filter;
        filter.limit = Some(1);
        Ok(self.list(filter).await?.into_iter().next())
    }

    pub async fn list(&self, filter: FilterData) -> Result<Vec<T>, TenancyError> {
        let (storage, tenant_id) = self.scope()?;
        let rows = storage.select(T::TABLE, &Self::scoped_filter(filter, tenant_id)).await?;
        rows.into_iter().map(|r| from_row(r).map_err(TenancyError::from)).collect()
    }

    pub async fn count(&self, filter: FilterData) -> Result<i64, TenancyError> {
        let (storage, tenant_id) = self.scope()?;
        Ok(storage.count(T::TABLE, &Self::scoped_filter(filter, tenant_id)).await?)
    }

    /// Apply `changes` to the row with `id`. `id` and `tenant_id` cannot be changed.
    ///
    /// The merged row must still read back as `T` before anything is written.
    pub async fn update(&self, id: Uuid, mut changes: Row) -> Result<T, TenancyError> {
        let (storage, tenant_id) = self.scope()?;

        if changes.contains_key("id") {
            return Err(TenancyError::Validation("id cannot be changed".to_string()));
        }
        if let Some(value) = changes.remove("tenant_id") {
            if value != json!(tenant_id) {
                error!("Refusing to move {} row {} out of tenant {}", T::TABLE, id, tenant_id);
                let found = value
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .unwrap_or_default();
                return Err(TenancyError::TenantMismatch { active: tenant_id, found });
            }
        }
        changes.insert("updated_at".to_string(), json!(Utc::now()));

        let filter = Self::scoped_filter(FilterData::matching(json!({ "id": id })), tenant_id);
        let current = FilterData { limit: Some(1), ..filter.clone() };
        let mut merged = match storage.select(T::TABLE, &current).await?.into_iter().next() {
            Some(row) => row,
            None => return Err(TenancyError::NotFound { entity: T::TABLE, id: id.to_string() }),
        };
        merged.extend(changes.clone());
        if let Err(e) = from_row::<T>(merged) {
            return Err(TenancyError::Validation(format!("Invalid change to {} {}: {}", T::TABLE, id, e)));
        }

        let updated = storage.update(T::TABLE, &filter, changes).await?;
        match updated.into_iter().next() {
            Some(row) => Ok(from_row(row)?),
            None => Err(TenancyError::NotFound { entity: T::TABLE, id: id.to_string() }),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), TenancyError> {
        let (storage, tenant_id) = self.scope()?;
        let filter = Self::scoped_filter(FilterData::matching(json!({ "id": id })), tenant_id);
        match storage.delete(T::TABLE, &filter).await? {
            0 => Err(TenancyError::NotFound { entity: T::TABLE, id: id.to_string() }),
            _ => Ok(()),
        }
    }
}

/// Unfiltered access to a tenant-owned table. Only obtainable through
/// [`TenantRepository::without_tenancy`]; every call is audit-logged.
pub struct Unscoped<T> {
    storage: Arc<dyn Storage>,
    call_site: &'static str,
    _phantom: PhantomData<T>,
}

impl<T: TenantScoped> Unscoped<T> {
    fn audit(&self, operation: &str, detail: &Value) {
        if config().security.enable_audit_logging {
            warn!(
                call_site = self.call_site,
                table = T::TABLE,
                storage = self.storage.name(),
                "Tenancy bypass: {} {}",
                operation,
                detail
            );
        } else {
            debug!(call_site = self.call_site, table = T::TABLE, "Tenancy bypass: {} {}", operation, detail);
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<T, TenancyError> {
        self.audit("find", &json!(id));
        let filter = FilterData { limit: Some(1), ..FilterData::matching(json!({ "id": id })) };
        match self.storage.select(T::TABLE, &filter).await?.into_iter().next() {
            Some(row) => Ok(from_row(row)?),
            None => Err(TenancyError::NotFound { entity: T::TABLE, id: id.to_string() }),
        }
    }

    pub async fn list(&self, filter: FilterData) -> Result<Vec<T>, TenancyError> {
        self.audit("list", filter.where_clause.as_ref().unwrap_or(&Value::Null));
        let rows = self.storage.select(T::TABLE, &filter).await?;
        rows.into_iter().map(|r| from_row(r).map_err(TenancyError::from)).collect()
    }
}
