// handlers/central/login.rs - GET /auth/login/:user_id on central hosts

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::User;
use crate::database::TenantRepository;
use crate::error::ApiError;
use crate::handlers::tenant_summary;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// Exchange a signed login link for a session on the workspace it names.
///
/// No tenant is bound on central hosts, so the user is read through the
/// audited bypass accessor on the tenant's storage.
pub async fn login_link(state: &AppState, user_id: Uuid, token: &str) -> ApiResult<Value> {
    let claims = state.links.verify(token, user_id)?;
    let tenant_id = claims
        .tenant_id
        .ok_or_else(|| ApiError::bad_request("Login link does not name a workspace"))?;

    let tenant = state.registry.find_by_id(tenant_id).await?;
    if !tenant.subscription_status.allows_access() {
        warn!("Login link used for {} tenant {}", tenant.subscription_status, tenant.slug);
        return Err(ApiError::forbidden(format!("This workspace is {}", tenant.subscription_status)));
    }

    let storage = match tenant.database_name.as_deref().filter(|_| tenant.is_dedicated()) {
        Some(name) => state.database().dedicated(name).await?,
        None => state.database().central(),
    };
    let user = TenantRepository::<User>::without_tenancy(storage, "central::login_link")
        .find(user_id)
        .await?;
    if user.tenant_id != Some(tenant.id) || !user.is_active {
        warn!("Login link for user {} does not match tenant {}", user_id, tenant.slug);
        return Err(ApiError::unauthorized("Invalid login link"));
    }

    let session = state.sessions.issue(&user, &tenant)?;
    let workspace = state
        .registry
        .domains_for(tenant.id)
        .await?
        .into_iter()
        .next()
        .map(|d| format!("http://{}/", d.domain));

    info!("User {} signed in to {} from the central domain", user.email, tenant.slug);
    Ok(ApiResponse::success(json!({
        "token": session,
        "user": user.to_public_json(),
        "tenant": tenant_summary(&tenant),
        "workspace_url": workspace,
    })))
}
