// handlers/central/subscribe.rs - POST /subscribe handler
// Sign-up: provisions a tenant with its domain, admin user and company profile

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::handlers::tenant_summary;
use crate::middleware::tenant::request_host;
use crate::middleware::{ApiResponse, ApiResult, CentralZone};
use crate::services::ProvisionRequest;
use crate::state::AppState;
use crate::tenancy::host::host_port;

/**
 * POST /subscribe - Create a workspace
 *
 * Expected Input:
 * ```json
 * {
 *   "company_name": "Acme Ltd",
 *   "domain": "acme",
 *   "plan_id": "free",
 *   "admin_email": "a@acme.com",
 *   "admin_name": "Ann Admin",
 *   "payment_type": "monthly"
 * }
 * ```
 *
 * Responds 201 with the tenant, its domain and a signed login link that hands
 * the admin over to the new workspace. A taken domain is a 409.
 */
pub async fn subscribe(
    _zone: CentralZone,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ProvisionRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;

    // Provisioning runs to completion (or rollback) even if the client goes away
    let service = state.provisioning.clone();
    let provisioned = tokio::spawn(async move { service.provision(request).await })
        .await
        .map_err(|e| {
            error!("Provisioning task failed: {}", e);
            ApiError::internal_server_error("Provisioning did not complete")
        })??;

    let authority = match request_host(&headers).as_deref().and_then(host_port) {
        Some(port) => format!("{}:{}", provisioned.domain.domain, port),
        None => provisioned.domain.domain.clone(),
    };
    let login_url = state
        .links
        .url("http", &authority, provisioned.admin.id, Some(provisioned.tenant.id))?;

    info!("Workspace {} created for {}", provisioned.domain.domain, provisioned.admin.email);

    Ok(ApiResponse::created(json!({
        "tenant": tenant_summary(&provisioned.tenant),
        "domain": provisioned.domain.domain,
        "admin": provisioned.admin.to_public_json(),
        "login_url": login_url,
    })))
}
