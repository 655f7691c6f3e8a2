// handlers/mod.rs - HTTP handlers for both zones
//
// Central-zone handlers answer on the platform's own hosts (sign-up, plans,
// diagnostics). Tenant-zone handlers answer on a tenant's domain aliases with
// the tenant already bound by the dispatch middleware.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::middleware::TenantZone;
use crate::state::AppState;

pub mod central;
pub mod tenant;

pub use central::LinkQuery;

/// GET / - service info on central hosts, workspace summary on tenant hosts
pub async fn home(State(state): State<AppState>, Extension(zone): Extension<TenantZone>) -> Result<Response, ApiError> {
    match zone {
        TenantZone::Tenant(ctx) => Ok(tenant::home(&ctx)?.into_response()),
        TenantZone::Central => Ok(central::home(&state).into_response()),
    }
}

/// GET /auth/login/:user_id?token= - signed login link, handled per zone
pub async fn login_link(
    State(state): State<AppState>,
    Extension(zone): Extension<TenantZone>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<LinkQuery>,
) -> Result<Response, ApiError> {
    match zone {
        TenantZone::Tenant(ctx) => Ok(tenant::login::login_link(&state, &ctx, user_id, &query.token)
            .await?
            .into_response()),
        TenantZone::Central => Ok(central::login::login_link(&state, user_id, &query.token)
            .await?
            .into_response()),
    }
}

/// Public view of a tenant
pub(crate) fn tenant_summary(tenant: &Tenant) -> Value {
    json!({
        "id": tenant.id,
        "company_name": tenant.company_name,
        "slug": tenant.slug,
        "plan_id": tenant.plan_id,
        "subscription_status": tenant.subscription_status,
        "isolation_mode": tenant.isolation_mode,
        "on_trial": tenant.is_on_trial(),
        "expired": tenant.is_expired(),
        "trial_ends_at": tenant.trial_ends_at,
        "subscription_ends_at": tenant.subscription_ends_at,
        "days_remaining": tenant.days_remaining(),
        "onboarding_completed": tenant.onboarding_completed,
        "is_demo": tenant.is_demo,
    })
}
