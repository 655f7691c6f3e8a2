use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::tenant::TenantZone;
use crate::auth::{AuthError, Claims};
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::TenancyError;
use crate::types::UserRole;

/// Authenticated user of the tenant bound to the request
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub user: User,
}

/// Bearer session authentication for tenant-zone routes.
///
/// The token must have been issued for the tenant the host resolved to, and
/// its user must still exist and be active in that tenant.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = match request.extensions().get::<TenantZone>() {
        Some(TenantZone::Tenant(ctx)) => ctx.clone(),
        _ => return Err(ApiError::not_found("Not found")),
    };
    let tenant_id = ctx.current()?.tenant.id;

    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let claims: Claims = state.sessions.verify(&token)?;
    if claims.tenant_id != tenant_id {
        warn!("Session for tenant {} presented to tenant {}", claims.tenant_id, tenant_id);
        return Err(AuthError::WrongTenant.into());
    }

    let user = match state.contexts.repository::<User>(&ctx).find(claims.sub).await {
        Ok(user) if user.is_active => user,
        Ok(_) | Err(TenancyError::NotFound { .. }) => {
            return Err(ApiError::unauthorized("User is no longer active"));
        }
        Err(e) => return Err(e.into()),
    };

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        tenant_id,
        email: user.email.clone(),
        role: user.role,
        user,
    });

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}
