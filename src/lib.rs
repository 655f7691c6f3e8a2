pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod tenancy;
pub mod types;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use state::AppState;

/// Full HTTP surface: central and tenant zones behind domain dispatch
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Either zone
        .route("/", get(handlers::home))
        .route("/auth/login/:user_id", get(handlers::login_link))
        // Central zone
        .route("/health", get(handlers::central::health))
        .route("/plans", get(handlers::central::plans))
        .route("/subscribe", post(handlers::central::subscribe))
        .route(&state.config.tenancy.not_found_path, get(handlers::central::tenant_not_found))
        // Tenant zone
        .route("/auth/login", post(handlers::tenant::login::password_login))
        .merge(session_routes(state.clone()))
        .layer(from_fn_with_state(state.clone(), middleware::tenant_dispatch_middleware));

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if state.config.security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

fn session_routes(state: AppState) -> Router<AppState> {
    use handlers::tenant::{dashboard, departments, onboarding, profile, users};

    let gated = Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/api/departments", get(departments::list).post(departments::create))
        .route(
            "/api/departments/:id",
            get(departments::get)
                .patch(departments::update)
                .delete(departments::delete),
        )
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/company-profile", get(profile::company_profile))
        .route_layer(from_fn(middleware::onboarding_gate_middleware));

    Router::new()
        .route("/onboarding", get(onboarding::onboarding_get))
        .route("/onboarding/complete", post(onboarding::onboarding_complete))
        .merge(gated)
        .route_layer(from_fn_with_state(state, middleware::session_auth_middleware))
}
