use serde_json::json;
use tracing::warn;

use super::plans::find_plan;
use crate::database::models::User;
use crate::database::TenantRepository;
use crate::filter::FilterData;
use crate::tenancy::{ContextManager, TenancyError, TenantContext};

/// Tenant user management that honours the plan's user limit
pub struct UserDirectory<'c> {
    ctx: &'c TenantContext,
    contexts: ContextManager,
    users: TenantRepository<'c, User>,
}

impl<'c> UserDirectory<'c> {
    pub fn new(contexts: &ContextManager, ctx: &'c TenantContext) -> Self {
        Self { ctx, contexts: contexts.clone(), users: contexts.repository(ctx) }
    }

    /// Count and insert run under the tenant's lock so concurrent creates
    /// cannot overshoot the plan limit
    pub async fn create(&self, user: User) -> Result<User, TenancyError> {
        let tenant = &self.ctx.current()?.tenant;
        let lock = self.contexts.tenant_lock(tenant.id).await;
        let _guard = lock.lock().await;
        let plan = find_plan(&tenant.plan_id)
            .ok_or_else(|| TenancyError::Internal(format!("unknown plan {}", tenant.plan_id)))?;
        let count = self.users.count(FilterData::default()).await?;
        if !plan.allows_users(count) {
            warn!("Tenant {} reached the {} plan user limit", tenant.slug, plan.slug);
            return Err(TenancyError::Validation(format!(
                "The {} plan allows at most {} users",
                plan.name, plan.max_users
            )));
        }
        self.users.create(user).await
    }

    pub async fn find(&self, id: uuid::Uuid) -> Result<User, TenancyError> {
        self.users.find(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, TenancyError> {
        self.users
            .select_one(FilterData::matching(json!({ "email": email.to_ascii_lowercase() })))
            .await
    }

    pub async fn list(&self) -> Result<Vec<User>, TenancyError> {
        self.users.list(FilterData::default().order_by("created_at asc")).await
    }
}
