// handlers/tenant/login.rs - sign-in on tenant hosts
// GET /auth/login/:user_id?token=, POST /auth/login

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{verify_password, AuthError};
use crate::database::models::{Tenant, User};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentTenant, ONBOARDING_PATH};
use crate::services::UserDirectory;
use crate::state::AppState;
use crate::tenancy::{TenancyError, TenantContext};

/// Exchange a signed login link for a session on this workspace.
///
/// The link must have been issued for the tenant the host resolved to.
pub async fn login_link(state: &AppState, ctx: &TenantContext, user_id: Uuid, token: &str) -> ApiResult<Value> {
    let tenant = ctx.current()?.tenant.clone();
    let claims = state.links.verify(token, user_id)?;
    if claims.tenant_id != Some(tenant.id) {
        warn!("Login link for {:?} presented on tenant {}", claims.tenant_id, tenant.slug);
        return Err(AuthError::WrongTenant.into());
    }

    let user = match state.contexts.repository::<User>(ctx).find(user_id).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(TenancyError::NotFound { .. }) => return Err(ApiError::unauthorized("Invalid login link")),
        Err(e) => return Err(e.into()),
    };

    let session = state.sessions.issue(&user, &tenant)?;

    info!("User {} signed in to {} with a login link", user.email, tenant.slug);
    Ok(ApiResponse::success(json!({
        "token": session,
        "user": user.to_public_json(),
        "redirect": landing_path(&tenant),
    })))
}

#[derive(Debug, Deserialize)]
pub struct PasswordLogin {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - email and password sign-in on this workspace
pub async fn password_login(
    State(state): State<AppState>,
    CurrentTenant(ctx): CurrentTenant,
    payload: Result<Json<PasswordLogin>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;
    let tenant = ctx.current()?.tenant.clone();

    let user = UserDirectory::new(&state.contexts, &ctx)
        .find_by_email(input.email.trim())
        .await?
        .filter(|user| user.is_active);
    let user = match user {
        Some(user) if verify_password(&input.password, &user.password_hash)? => user,
        _ => {
            warn!("Failed sign-in for {} on {}", input.email.trim(), tenant.slug);
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
    };

    let session = state.sessions.issue(&user, &tenant)?;
    info!("User {} signed in to {}", user.email, tenant.slug);
    Ok(ApiResponse::success(json!({
        "token": session,
        "user": user.to_public_json(),
        "redirect": landing_path(&tenant),
    })))
}

fn landing_path(tenant: &Tenant) -> &'static str {
    if tenant.onboarding_completed || tenant.is_demo {
        "/dashboard"
    } else {
        ONBOARDING_PATH
    }
}
