use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};
use url::Url;

use crate::config::TenancyConfig;
use crate::error::ApiError;
use crate::state::AppState;
use crate::tenancy::host::{extract_subdomain, host_port, normalize_host};
use crate::tenancy::{TenancyError, TenantContext};

/// Which side of the platform a request was addressed to, decided from its host
#[derive(Debug, Clone)]
pub enum TenantZone {
    Central,
    Tenant(TenantContext),
}

/// Resolves the request host to a tenant and binds it for the rest of the request.
///
/// Central hosts pass through untouched. Unknown hosts are redirected to the
/// tenant-not-found page on the central domain without activating anything.
pub async fn tenant_dispatch_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw_host = request_host(request.headers()).ok_or_else(|| ApiError::bad_request("Missing Host header"))?;
    let host = normalize_host(&raw_host).ok_or_else(|| ApiError::bad_request("Invalid Host header"))?;
    let tenancy = &state.config.tenancy;

    if tenancy.is_central(&host) {
        request.extensions_mut().insert(TenantZone::Central);
        return Ok(next.run(request).await);
    }

    let tenant = match state.registry.resolve_by_domain(&host).await {
        Ok(tenant) => tenant,
        Err(TenancyError::TenantNotFound(_)) => {
            warn!("No tenant registered for host {}", host);
            return Ok(not_found_redirect(tenancy, &raw_host, &host)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    if !tenant.subscription_status.allows_access() {
        warn!("Refusing request for {} tenant {}", tenant.subscription_status, tenant.slug);
        return Err(ApiError::forbidden(format!(
            "This workspace is {}. Contact support to restore access.",
            tenant.subscription_status
        )));
    }

    let mut ctx = TenantContext::new();
    state.contexts.activate(&mut ctx, tenant).await?;
    request.extensions_mut().insert(TenantZone::Tenant(ctx.clone()));

    let response = next.run(request).await;

    if let Some(tenant) = ctx.end() {
        debug!("Released tenant {} after request", tenant.slug);
    }
    Ok(response)
}

pub(crate) fn request_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn not_found_redirect(tenancy: &TenancyConfig, raw_host: &str, host: &str) -> Result<Redirect, ApiError> {
    let authority = match host_port(raw_host) {
        Some(port) => format!("{}:{}", tenancy.primary_central_domain(), port),
        None => tenancy.primary_central_domain().to_string(),
    };
    let mut url = Url::parse(&format!("http://{}{}", authority, tenancy.not_found_path))
        .map_err(|e| ApiError::internal_server_error(format!("Invalid not-found URL: {}", e)))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("host", host);
        if let Some(subdomain) = extract_subdomain(host) {
            query.append_pair("subdomain", &subdomain);
        }
    }
    Ok(Redirect::temporary(url.as_str()))
}

/// The tenant bound to this request. Rejects central-zone requests with 404.
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub TenantContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<TenantZone>() {
            Some(TenantZone::Tenant(ctx)) => Ok(CurrentTenant(ctx.clone())),
            _ => Err(ApiError::not_found("Not found")),
        }
    }
}

/// Marker for handlers only served on central hosts. Rejects tenant-zone requests with 404.
#[derive(Debug, Clone, Copy)]
pub struct CentralZone;

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CentralZone {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<TenantZone>() {
            Some(TenantZone::Central) => Ok(CentralZone),
            _ => Err(ApiError::not_found("Not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn redirect_carries_host_and_subdomain() {
        let tenancy = AppConfig::development().tenancy;
        let redirect = not_found_redirect(&tenancy, "ghost.localhost:3000", "ghost.localhost").unwrap();
        let response = redirect.into_response();
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert_eq!(
            location,
            "http://localhost:3000/tenant-not-found?host=ghost.localhost&subdomain=ghost"
        );
    }
}
