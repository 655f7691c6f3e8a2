// handlers/tenant/mod.rs - Tenant zone handlers
//
// Every handler here runs with the host's tenant bound in a TenantContext.
// Routes other than `/` and the login link also require a session for that
// tenant, and all but onboarding sit behind the onboarding gate.

use serde_json::{json, Value};

use super::tenant_summary;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, AuthUser};
use crate::tenancy::TenantContext;
use crate::types::UserRole;

pub mod dashboard;
pub mod departments;
pub mod login;
pub mod onboarding;
pub mod profile;
pub mod users;

pub(crate) fn home(ctx: &TenantContext) -> Result<ApiResponse<Value>, ApiError> {
    let tenant = &ctx.current()?.tenant;
    Ok(ApiResponse::success(json!({
        "tenant": tenant_summary(tenant),
        "login": "GET /auth/login/:user_id?token=",
    })))
}

/// Admins and HR managers may change workspace data
pub(crate) fn require_manager(user: &AuthUser) -> Result<(), ApiError> {
    match user.role {
        UserRole::Admin | UserRole::HrManager => Ok(()),
        _ => Err(ApiError::forbidden("Insufficient role for this action")),
    }
}
