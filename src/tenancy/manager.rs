use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::context::{ActiveTenant, TenantContext, TenantScope};
use super::error::TenancyError;
use crate::database::models::{Tenant, TenantScoped};
use crate::database::{DatabaseManager, Storage, TenantRepository};

/// Binds tenants to [`TenantContext`] values, resolving each tenant's storage target first.
#[derive(Debug, Clone)]
pub struct ContextManager {
    db: Arc<DatabaseManager>,
    tenant_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl ContextManager {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db, tenant_locks: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn database(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    /// Push `tenant` onto `ctx`. On failure the context is left exactly as it was.
    pub async fn activate(&self, ctx: &mut TenantContext, tenant: impl Into<Arc<Tenant>>) -> Result<(), TenancyError> {
        let tenant = tenant.into();
        let storage = self.resolve_storage(&tenant).await?;
        debug!(
            "Activating tenant {} ({}) on {} at depth {}",
            tenant.slug,
            tenant.isolation_mode,
            storage.name(),
            ctx.depth() + 1
        );
        ctx.push(ActiveTenant { tenant, storage });
        Ok(())
    }

    /// Activate `tenant` for as long as the returned guard lives
    pub async fn scoped<'c>(
        &self,
        ctx: &'c mut TenantContext,
        tenant: impl Into<Arc<Tenant>>,
    ) -> Result<TenantScope<'c>, TenancyError> {
        let restore_to = ctx.depth();
        self.activate(ctx, tenant).await?;
        Ok(TenantScope::new(ctx, restore_to))
    }

    /// Run `f` with a fresh context bound to `tenant`
    pub async fn run_as<F, Fut, R, E>(&self, tenant: impl Into<Arc<Tenant>>, f: F) -> Result<R, E>
    where
        F: FnOnce(TenantContext) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<TenancyError>,
    {
        let mut ctx = TenantContext::new();
        self.activate(&mut ctx, tenant).await?;
        f(ctx).await
    }

    /// Storage for calls that are not tenant-scoped: the dedicated target of the
    /// active tenant, or central storage
    pub fn storage_for(&self, ctx: &TenantContext) -> Arc<dyn Storage> {
        match ctx.current() {
            Ok(active) => active.storage.clone(),
            Err(_) => self.db.central(),
        }
    }

    /// Per-tenant lock for check-then-write sequences such as plan limits.
    /// Holds within this process only.
    pub async fn tenant_lock(&self, tenant_id: Uuid) -> Arc<Mutex<()>> {
        self.tenant_locks.lock().await.entry(tenant_id).or_default().clone()
    }

    /// Tenant-scoped repository over `ctx`
    pub fn repository<'c, T: TenantScoped>(&self, ctx: &'c TenantContext) -> TenantRepository<'c, T> {
        TenantRepository::new(ctx, self.db.clone())
    }

    async fn resolve_storage(&self, tenant: &Tenant) -> Result<Arc<dyn Storage>, TenancyError> {
        self.db.target_for(tenant).await.map_err(|source| {
            warn!("Activation of tenant {} failed: {}", tenant.slug, source);
            TenancyError::ContextActivation { tenant_id: tenant.id, source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{Connector, MemoryConnector, MemoryStorage};
    use crate::types::{IsolationMode, SubscriptionStatus};
    use chrono::Utc;

    fn setup() -> (ContextManager, Arc<MemoryConnector>) {
        let connector = Arc::new(MemoryConnector::new());
        let central: Arc<dyn Storage> = Arc::new(MemoryStorage::central("hrms_central"));
        let db = DatabaseManager::new(central, connector.clone(), &AppConfig::development().database);
        (ContextManager::new(Arc::new(db)), connector)
    }

    fn tenant(slug: &str, mode: IsolationMode) -> Tenant {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Tenant {
            id,
            company_name: slug.to_string(),
            slug: slug.to_string(),
            plan_id: "pro".to_string(),
            subscription_status: SubscriptionStatus::Active,
            isolation_mode: mode,
            database_name: (mode == IsolationMode::Dedicated)
                .then(|| DatabaseManager::dedicated_name_for(&id.to_string())),
            trial_ends_at: None,
            subscription_ends_at: None,
            subscription_type: None,
            onboarding_completed: true,
            is_demo: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn dedicated_tenant_routes_to_its_own_storage() {
        let (manager, _) = setup();
        let t = tenant("acme", IsolationMode::Dedicated);
        let expected = t.database_name.clone().unwrap();

        let mut ctx = TenantContext::new();
        manager.activate(&mut ctx, t).await.unwrap();
        assert_eq!(manager.storage_for(&ctx).name(), expected);

        ctx.end();
        assert_eq!(manager.storage_for(&ctx).name(), "hrms_central");
    }

    #[tokio::test]
    async fn failed_activation_leaves_context_unchanged() {
        let (manager, connector) = setup();
        let outer = tenant("outer", IsolationMode::Shared);
        let broken = tenant("broken", IsolationMode::Dedicated);

        // Create the target, then take it offline
        let name = broken.database_name.clone().unwrap();
        connector.connect(&name).await.unwrap();
        connector.storage(&name).unwrap().set_online(false);

        let mut ctx = TenantContext::new();
        manager.activate(&mut ctx, outer).await.unwrap();
        let err = manager.activate(&mut ctx, broken).await.unwrap_err();
        assert!(matches!(err, TenancyError::ContextActivation { .. }));
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.tenant().unwrap().slug, "outer");
    }

    #[tokio::test]
    async fn scoped_guard_pops_on_error_path() {
        let (manager, _) = setup();
        let mut ctx = TenantContext::new();

        async fn failing(manager: &ContextManager, ctx: &mut TenantContext) -> Result<(), TenancyError> {
            let scope = manager.scoped(ctx, tenant("inner", IsolationMode::Shared)).await?;
            assert!(scope.is_active());
            Err(TenancyError::Validation("boom".into()))
        }

        assert!(failing(&manager, &mut ctx).await.is_err());
        assert!(!ctx.is_active());
    }

    #[tokio::test]
    async fn run_as_uses_fresh_context() {
        let (manager, _) = setup();
        let slug = manager
            .run_as(tenant("acme", IsolationMode::Shared), |ctx| async move {
                Ok::<_, TenancyError>(ctx.current()?.tenant.slug.clone())
            })
            .await
            .unwrap();
        assert_eq!(slug, "acme");
    }
}
