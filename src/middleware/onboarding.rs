use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use super::tenant::TenantZone;
use crate::error::ApiError;

pub const ONBOARDING_PATH: &str = "/onboarding";

/// Sends tenants that have not finished onboarding to the wizard. Demo tenants skip it.
pub async fn onboarding_gate_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let tenant = match request.extensions().get::<TenantZone>() {
        Some(TenantZone::Tenant(ctx)) => ctx.current()?.tenant.clone(),
        _ => return Err(ApiError::not_found("Not found")),
    };

    if tenant.onboarding_completed || tenant.is_demo {
        return Ok(next.run(request).await);
    }

    debug!("Tenant {} has not completed onboarding, redirecting", tenant.slug);
    Ok(Redirect::to(ONBOARDING_PATH).into_response())
}
