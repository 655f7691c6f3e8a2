use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::error::TenancyError;
use crate::database::models::Tenant;
use crate::database::Storage;

/// A tenant bound to a context together with the storage its rows live in
#[derive(Debug, Clone)]
pub struct ActiveTenant {
    pub tenant: Arc<Tenant>,
    pub storage: Arc<dyn Storage>,
}

/// Per-request tenant binding.
///
/// Activations nest: each one pushes onto a stack and [`TenantContext::end`]
/// pops back to the previous tenant (or to no tenant). Entries are only pushed
/// by [`super::ContextManager`], after the tenant's storage has been reached.
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    stack: Vec<ActiveTenant>,
}

impl TenantContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        self.stack.last().map(|a| a.tenant.as_ref())
    }

    pub fn current(&self) -> Result<&ActiveTenant, TenancyError> {
        self.stack.last().ok_or(TenancyError::NoActiveTenant)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Leave the innermost activation. Calling this with nothing active is a no-op.
    pub fn end(&mut self) -> Option<Arc<Tenant>> {
        self.stack.pop().map(|a| a.tenant)
    }

    pub(crate) fn push(&mut self, active: ActiveTenant) {
        self.stack.push(active);
    }

    pub(crate) fn truncate(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }
}

/// Activation that is undone when the guard goes out of scope, including on
/// early return, error propagation and task cancellation.
#[derive(Debug)]
pub struct TenantScope<'c> {
    ctx: &'c mut TenantContext,
    restore_to: usize,
}

impl<'c> TenantScope<'c> {
    pub(crate) fn new(ctx: &'c mut TenantContext, restore_to: usize) -> Self {
        Self { ctx, restore_to }
    }
}

impl Deref for TenantScope<'_> {
    type Target = TenantContext;

    fn deref(&self) -> &TenantContext {
        self.ctx
    }
}

impl DerefMut for TenantScope<'_> {
    fn deref_mut(&mut self) -> &mut TenantContext {
        self.ctx
    }
}

impl Drop for TenantScope<'_> {
    fn drop(&mut self) {
        self.ctx.truncate(self.restore_to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStorage;
    use crate::types::{IsolationMode, SubscriptionStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn active(slug: &str) -> ActiveTenant {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            company_name: slug.to_uppercase(),
            slug: slug.to_string(),
            plan_id: "free".to_string(),
            subscription_status: SubscriptionStatus::Trial,
            isolation_mode: IsolationMode::Shared,
            database_name: None,
            trial_ends_at: None,
            subscription_ends_at: None,
            subscription_type: None,
            onboarding_completed: false,
            is_demo: false,
            created_at: now,
            updated_at: now,
        };
        ActiveTenant {
            tenant: Arc::new(tenant),
            storage: Arc::new(MemoryStorage::central("hrms_central")),
        }
    }

    #[test]
    fn end_on_inactive_is_noop() {
        let mut ctx = TenantContext::new();
        assert!(ctx.end().is_none());
        assert!(ctx.end().is_none());
        assert!(matches!(ctx.current(), Err(TenancyError::NoActiveTenant)));
    }

    #[test]
    fn nested_end_restores_outer_tenant() {
        let mut ctx = TenantContext::new();
        ctx.push(active("a"));
        ctx.push(active("b"));
        assert_eq!(ctx.tenant().map(|t| t.slug.as_str()), Some("b"));

        ctx.end();
        assert_eq!(ctx.tenant().map(|t| t.slug.as_str()), Some("a"));
        ctx.end();
        assert!(!ctx.is_active());
    }

    #[test]
    fn scope_guard_restores_on_drop() {
        let mut ctx = TenantContext::new();
        ctx.push(active("a"));
        {
            let depth = ctx.depth();
            let mut scope = TenantScope::new(&mut ctx, depth);
            scope.push(active("b"));
            scope.push(active("c"));
            assert_eq!(scope.depth(), 3);
        }
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.tenant().map(|t| t.slug.as_str()), Some("a"));
    }

    #[test]
    fn clones_are_independent() {
        let mut ctx = TenantContext::new();
        ctx.push(active("a"));
        let mut other = ctx.clone();
        other.end();
        assert!(ctx.is_active());
        assert!(!other.is_active());
    }
}
