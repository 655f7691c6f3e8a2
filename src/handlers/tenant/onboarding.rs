// handlers/tenant/onboarding.rs - first-run wizard
// GET /onboarding, POST /onboarding/complete

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::database::models::CompanyProfile;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::handlers::tenant_summary;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, CurrentTenant};
use crate::services::OnboardingInput;
use crate::state::AppState;
use crate::types::UserRole;

pub async fn onboarding_get(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let tenant = ctx.current()?.tenant.clone();
    let profile = state
        .contexts
        .repository::<CompanyProfile>(&ctx)
        .select_one(FilterData::default())
        .await?;

    Ok(ApiResponse::success(json!({
        "tenant": tenant_summary(&tenant),
        "completed": tenant.onboarding_completed,
        "profile": profile,
        "user": user.user.to_public_json(),
    })))
}

pub async fn onboarding_complete(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<OnboardingInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    if user.role != UserRole::Admin {
        return Err(ApiError::forbidden("Only the workspace admin can complete onboarding"));
    }

    let tenant = state.onboarding.complete(&ctx, user.user_id, input).await?;

    Ok(ApiResponse::success(json!({
        "tenant": tenant_summary(&tenant),
        "redirect": "/dashboard",
    })))
}
