mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{get, send, Harness};
use hrms_tenancy::types::SubscriptionStatus;

fn signup(label: &str, plan: &str, email: &str) -> Value {
    json!({
        "company_name": format!("{} Ltd", label),
        "domain": label,
        "plan_id": plan,
        "admin_email": email,
        "admin_name": "Ann Admin",
        "payment_type": "monthly",
        "card_number": "4242424242424242"
    })
}

/// Path and query of a login URL, e.g. `/auth/login/<id>?token=...`
fn link_path(login_url: &str) -> String {
    let after_scheme = login_url.trim_start_matches("http://");
    let slash = after_scheme.find('/').unwrap();
    after_scheme[slash..].to_string()
}

/// Sign up `label` over HTTP and exchange the returned login link for a session
async fn signed_in(h: &Harness, label: &str) -> String {
    let app = h.app();
    let created = send(&app, Method::POST, "localhost", "/subscribe", None, Some(signup(label, "free", "a@acme.com"))).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let link = link_path(created.body["data"]["login_url"].as_str().unwrap());
    let host = format!("{}.localhost", label);
    let login = get(&app, &host, &link, None).await;
    assert_eq!(login.status, StatusCode::OK, "{}", login.body);
    login.body["data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn central_zone_serves_info_and_plans() {
    let h = Harness::new();
    let app = h.app();

    let home = get(&app, "localhost:3000", "/", None).await;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.body["success"], true);
    assert_eq!(home.body["data"]["name"], "HRMS");

    let plans = get(&app, "localhost", "/plans", None).await;
    assert_eq!(plans.status, StatusCode::OK);
    let slugs: Vec<&str> = plans.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["free", "plus", "pro", "enterprise"]);

    let health = get(&app, "127.0.0.1", "/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_host_redirects_to_not_found_page() {
    let h = Harness::new();
    let app = h.app();

    let reply = get(&app, "ghost.localhost:3000", "/dashboard", None).await;
    assert_eq!(reply.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        reply.location(),
        Some("http://localhost:3000/tenant-not-found?host=ghost.localhost&subdomain=ghost")
    );

    let page = get(&app, "localhost:3000", "/tenant-not-found?host=ghost.localhost&subdomain=ghost", None).await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert_eq!(page.body["host"], "ghost.localhost");
    assert_eq!(page.body["subdomain"], "ghost");
}

#[tokio::test]
async fn subscribe_creates_workspace_and_rejects_taken_domain() {
    let h = Harness::new();
    let app = h.app();

    let created = send(&app, Method::POST, "localhost", "/subscribe", None, Some(signup("acme", "free", "a@acme.com"))).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["domain"], "acme.localhost");
    assert_eq!(created.body["data"]["tenant"]["subscription_status"], "trial");
    assert_eq!(created.body["data"]["tenant"]["isolation_mode"], "shared");
    assert!(created.body["data"]["admin"].get("password_hash").is_none());
    assert!(created.body["data"]["login_url"]
        .as_str()
        .unwrap()
        .starts_with("http://acme.localhost/auth/login/"));

    let again = send(&app, Method::POST, "localhost", "/subscribe", None, Some(signup("acme", "plus", "b@acme.com"))).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.body["code"], "CONFLICT");

    let invalid = send(&app, Method::POST, "localhost", "/subscribe", None, Some(signup("ac me", "free", "a@acme.com"))).await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn central_routes_are_hidden_on_tenant_hosts() {
    let h = Harness::new();
    h.provision("acme", "free", "a@acme.com").await;
    let app = h.app();

    let reply = send(&app, Method::POST, "acme.localhost", "/subscribe", None, Some(signup("beta", "free", "b@beta.com"))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "acme.localhost", "/plans", None).await.status, StatusCode::NOT_FOUND);

    // Tenant routes are hidden on the central host
    assert_eq!(get(&app, "localhost", "/dashboard", None).await.status, StatusCode::NOT_FOUND);

    let home = get(&app, "ACME.localhost:8080", "/", None).await;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.body["data"]["tenant"]["slug"], "acme");
}

#[tokio::test]
async fn login_link_only_works_on_its_own_tenant() {
    let h = Harness::new();
    h.provision("beta", "free", "b@beta.com").await;
    let app = h.app();

    let created = send(&app, Method::POST, "localhost", "/subscribe", None, Some(signup("acme", "free", "a@acme.com"))).await;
    let link = link_path(created.body["data"]["login_url"].as_str().unwrap());

    let wrong = get(&app, "beta.localhost", &link, None).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let tampered = get(&app, "acme.localhost", &format!("{}x", link), None).await;
    assert_eq!(tampered.status, StatusCode::UNAUTHORIZED);

    let ok = get(&app, "acme.localhost", &link, None).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["data"]["redirect"], "/onboarding");

    // The same link also works from the central domain, via the bypass accessor
    let central = get(&app, "localhost", &link, None).await;
    assert_eq!(central.status, StatusCode::OK);
    assert_eq!(central.body["data"]["workspace_url"], "http://acme.localhost/");
}

#[tokio::test]
async fn onboarding_gate_then_dashboard() {
    let h = Harness::new();
    let token = signed_in(&h, "acme").await;
    let app = h.app();

    assert_eq!(get(&app, "acme.localhost", "/dashboard", None).await.status, StatusCode::UNAUTHORIZED);

    let gated = get(&app, "acme.localhost", "/dashboard", Some(&token)).await;
    assert_eq!(gated.status, StatusCode::SEE_OTHER);
    assert_eq!(gated.location(), Some("/onboarding"));

    let wizard = get(&app, "acme.localhost", "/onboarding", Some(&token)).await;
    assert_eq!(wizard.status, StatusCode::OK);
    assert_eq!(wizard.body["data"]["completed"], false);

    let short_password = send(
        &app,
        Method::POST,
        "acme.localhost",
        "/onboarding/complete",
        Some(&token),
        Some(json!({
            "company_name": "Acme Holdings",
            "first_name": "Ann",
            "last_name": "Smith",
            "personal_email": "ann@acme.com",
            "password": "short"
        })),
    )
    .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);

    let done = send(
        &app,
        Method::POST,
        "acme.localhost",
        "/onboarding/complete",
        Some(&token),
        Some(json!({
            "company_name": "Acme Holdings",
            "first_name": "Ann",
            "last_name": "Smith",
            "personal_email": "ann@acme.com",
            "password": "correct-horse",
            "department_name": "Engineering"
        })),
    )
    .await;
    assert_eq!(done.status, StatusCode::OK, "{}", done.body);
    assert_eq!(done.body["data"]["tenant"]["onboarding_completed"], true);

    let dashboard = get(&app, "acme.localhost", "/dashboard", Some(&token)).await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert_eq!(dashboard.body["data"]["stats"]["users"], 1);
    assert_eq!(dashboard.body["data"]["stats"]["departments"], 1);
    assert_eq!(dashboard.body["data"]["profile"]["company_name"], "Acme Holdings");

    // New password works for sign-in
    let login = send(
        &app,
        Method::POST,
        "acme.localhost",
        "/auth/login",
        None,
        Some(json!({ "email": "ann@acme.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["data"]["redirect"], "/dashboard");
}

#[tokio::test]
async fn session_is_bound_to_its_tenant() {
    let h = Harness::new();
    let acme_token = signed_in(&h, "acme").await;
    h.provision("beta", "free", "b@beta.com").await;
    let app = h.app();

    let reply = get(&app, "beta.localhost", "/onboarding", Some(&acme_token)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let garbage = get(&app, "acme.localhost", "/onboarding", Some("not-a-token")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn department_api_is_tenant_scoped() {
    let h = Harness::new();
    let acme = h.provision("acme", "free", "a@acme.com").await;
    let beta = h.provision("beta", "free", "b@beta.com").await;
    for tenant in [&acme.tenant, &beta.tenant] {
        h.state.registry.mark_onboarding_completed(tenant.id, None).await.unwrap();
    }
    let acme_token = h.state.sessions.issue(&acme.admin, &acme.tenant).unwrap();
    let beta_token = h.state.sessions.issue(&beta.admin, &beta.tenant).unwrap();
    let app = h.app();

    let created = send(
        &app,
        Method::POST,
        "acme.localhost",
        "/api/departments",
        Some(&acme_token),
        Some(json!({ "name": "Engineering", "branch_name": "HQ" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created.body["data"]["tenant_id"], json!(acme.tenant.id));

    let same_name = send(
        &app,
        Method::POST,
        "beta.localhost",
        "/api/departments",
        Some(&beta_token),
        Some(json!({ "name": "Engineering" })),
    )
    .await;
    assert_eq!(same_name.status, StatusCode::CREATED);

    let path = format!("/api/departments/{}", id);
    assert_eq!(get(&app, "beta.localhost", &path, Some(&beta_token)).await.status, StatusCode::NOT_FOUND);
    let stolen_delete = send(&app, Method::DELETE, "beta.localhost", &path, Some(&beta_token), None).await;
    assert_eq!(stolen_delete.status, StatusCode::NOT_FOUND);

    let moved = send(
        &app,
        Method::PATCH,
        "acme.localhost",
        &path,
        Some(&acme_token),
        Some(json!({ "tenant_id": beta.tenant.id })),
    )
    .await;
    assert_eq!(moved.status, StatusCode::BAD_REQUEST);

    let renamed = send(
        &app,
        Method::PATCH,
        "acme.localhost",
        &path,
        Some(&acme_token),
        Some(json!({ "name": "Platform" })),
    )
    .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["data"]["name"], "Platform");

    // A wrongly typed field is refused and leaves the listing readable
    let mistyped = send(
        &app,
        Method::PATCH,
        "acme.localhost",
        &path,
        Some(&acme_token),
        Some(json!({ "is_active": "yes" })),
    )
    .await;
    assert_eq!(mistyped.status, StatusCode::BAD_REQUEST);
    let still_listed = get(&app, "acme.localhost", "/api/departments", Some(&acme_token)).await;
    assert_eq!(still_listed.status, StatusCode::OK);
    assert_eq!(still_listed.body["data"][0]["is_active"], true);

    // Managers come from the same tenant only
    let foreign_manager = send(
        &app,
        Method::PATCH,
        "acme.localhost",
        &path,
        Some(&acme_token),
        Some(json!({ "manager_id": beta.admin.id })),
    )
    .await;
    assert_eq!(foreign_manager.status, StatusCode::BAD_REQUEST);
    assert_eq!(foreign_manager.body["code"], "VALIDATION_ERROR");
    let foreign_create = send(
        &app,
        Method::POST,
        "acme.localhost",
        "/api/departments",
        Some(&acme_token),
        Some(json!({ "name": "Sales", "manager_id": beta.admin.id })),
    )
    .await;
    assert_eq!(foreign_create.status, StatusCode::BAD_REQUEST);
    let own_manager = send(
        &app,
        Method::PATCH,
        "acme.localhost",
        &path,
        Some(&acme_token),
        Some(json!({ "manager_id": acme.admin.id, "branch_name": null })),
    )
    .await;
    assert_eq!(own_manager.status, StatusCode::OK);
    assert_eq!(own_manager.body["data"]["manager_id"], json!(acme.admin.id));
    assert_eq!(own_manager.body["data"]["branch_name"], Value::Null);

    let listed = get(&app, "acme.localhost", "/api/departments", Some(&acme_token)).await;
    assert_eq!(listed.body["data"].as_array().unwrap().len(), 1);

    let deleted = send(&app, Method::DELETE, "acme.localhost", &path, Some(&acme_token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(get(&app, "acme.localhost", &path, Some(&acme_token)).await.status, StatusCode::NOT_FOUND);

    let users = get(&app, "beta.localhost", "/api/users", Some(&beta_token)).await;
    assert_eq!(users.body["data"].as_array().unwrap().len(), 1);
    assert_eq!(users.body["data"][0]["email"], "b@beta.com");

    let profile = get(&app, "beta.localhost", "/api/company-profile", Some(&beta_token)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["data"]["tenant_id"], json!(beta.tenant.id));
}

#[tokio::test]
async fn suspended_tenant_is_refused() {
    let h = Harness::new();
    let acme = h.provision("acme", "free", "a@acme.com").await;
    h.state.registry.set_status(acme.tenant.id, SubscriptionStatus::Suspended).await.unwrap();

    let reply = get(&h.app(), "acme.localhost", "/", None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn unreachable_dedicated_storage_is_503() {
    let h = Harness::new();
    let globex = h.provision("globex", "pro", "g@globex.com").await;
    let db_name = globex.tenant.database_name.clone().unwrap();
    h.connector.storage(&db_name).unwrap().set_online(false);

    let reply = get(&h.app(), "globex.localhost", "/", None).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);

    h.connector.storage(&db_name).unwrap().set_online(true);
    let reply = get(&h.app(), "globex.localhost", "/", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(h.state.database().cached_targets().await.contains(&db_name));
}
