// handlers/tenant/users.rs - /api/users

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::require_manager;
use crate::auth::hash_password;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, CurrentTenant};
use crate::services::onboarding::MIN_PASSWORD_LEN;
use crate::services::{is_valid_email, UserDirectory};
use crate::state::AppState;
use crate::types::UserRole;

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
}

/// GET /api/users
pub async fn list(State(state): State<AppState>, CurrentTenant(ctx): CurrentTenant) -> ApiResult<Vec<Value>> {
    let users = UserDirectory::new(&state.contexts, &ctx).list().await?;
    Ok(ApiResponse::success(users.iter().map(User::to_public_json).collect()))
}

/// POST /api/users - limited by the tenant's plan
pub async fn create(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<Value> {
    require_manager(&user)?;
    let Json(input) = payload?;
    if input.name.trim().is_empty() {
        return Err(ApiError::validation_error("Name is required", None));
    }
    if !is_valid_email(input.email.trim()) {
        return Err(ApiError::validation_error("Email is not a valid address", None));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation_error(
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            None,
        ));
    }

    let password_hash = hash_password(&input.password)?;
    let mut new_user = User::new(
        input.name.trim(),
        input.email.trim(),
        password_hash,
        input.role.unwrap_or(UserRole::Employee),
    );
    new_user.employee_id = input.employee_id;
    new_user.department_id = input.department_id;

    let directory = UserDirectory::new(&state.contexts, &ctx);
    let created = directory.create(new_user).await?;
    Ok(ApiResponse::created(created.to_public_json()))
}
