// handlers/tenant/profile.rs - GET /api/company-profile

use axum::extract::State;

use crate::database::models::CompanyProfile;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, CurrentTenant};
use crate::state::AppState;

pub async fn company_profile(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
) -> ApiResult<CompanyProfile> {
    state
        .contexts
        .repository::<CompanyProfile>(&ctx)
        .select_one(FilterData::default())
        .await?
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Company profile has not been set up"))
}
