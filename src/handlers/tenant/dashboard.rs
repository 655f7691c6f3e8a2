// handlers/tenant/dashboard.rs - GET /dashboard

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::database::models::{CompanyProfile, Department, User};
use crate::filter::FilterData;
use crate::handlers::tenant_summary;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, CurrentTenant};
use crate::services::plans::find_plan;
use crate::state::AppState;

pub async fn dashboard(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let tenant = ctx.current()?.tenant.clone();
    let users = state.contexts.repository::<User>(&ctx).count(FilterData::default()).await?;
    let departments = state
        .contexts
        .repository::<Department>(&ctx)
        .count(FilterData::default())
        .await?;
    let profile = state
        .contexts
        .repository::<CompanyProfile>(&ctx)
        .select_one(FilterData::default())
        .await?;
    let plan = find_plan(&tenant.plan_id);

    Ok(ApiResponse::success(json!({
        "tenant": tenant_summary(&tenant),
        "profile": profile,
        "me": user.user.to_public_json(),
        "stats": {
            "users": users,
            "departments": departments,
            "max_users": plan.map(|p| p.max_users),
        },
    })))
}
