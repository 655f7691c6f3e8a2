// handlers/central/mod.rs - Central zone handlers
//
// Served only on the configured central domains. No tenant is bound.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, CentralZone};
use crate::services::plans::active_plans;
use crate::state::AppState;

pub mod login;
pub mod subscribe;

pub use subscribe::subscribe;

#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct NotFoundQuery {
    pub host: Option<String>,
    pub subdomain: Option<String>,
}

pub(crate) fn home(state: &AppState) -> ApiResponse<Value> {
    let tenancy = &state.config.tenancy;
    ApiResponse::success(json!({
        "name": "HRMS",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-tenant HR management platform",
        "tenant_domains": format!("<workspace>.{}", tenancy.base_domain),
        "endpoints": {
            "plans": "GET /plans",
            "subscribe": "POST /subscribe",
            "health": "GET /health",
            "login_link": "GET /auth/login/:user_id?token=",
        }
    }))
}

/// GET /health - central storage ping
pub async fn health(_zone: CentralZone, State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.database().health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "dedicated_targets": state.database().cached_targets().await.len(),
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

/// GET /plans - active plan catalogue
pub async fn plans(_zone: CentralZone) -> ApiResponse<Value> {
    let plans: Vec<Value> = active_plans()
        .into_iter()
        .map(|plan| {
            json!({
                "slug": plan.slug,
                "name": plan.name,
                "description": plan.description,
                "price_monthly": plan.price_monthly,
                "price_yearly": plan.price_yearly,
                "yearly_savings": plan.yearly_savings(),
                "max_users": plan.max_users,
                "unlimited_users": plan.is_unlimited(),
                "isolation_mode": plan.isolation_mode,
                "features": plan.features,
            })
        })
        .collect();
    ApiResponse::success(json!(plans))
}

/// GET /tenant-not-found?host=&subdomain= - landing page for unresolved hosts
pub async fn tenant_not_found(_zone: CentralZone, Query(query): Query<NotFoundQuery>) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "TENANT_NOT_FOUND",
            "message": "No workspace is registered for this address",
            "host": query.host,
            "subdomain": query.subdomain,
        })),
    )
}
