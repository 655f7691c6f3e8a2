use chrono::{Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::is_valid_email;
use super::notification::{WelcomeMessage, WelcomeNotifier};
use super::plans::find_plan;
use crate::auth::{generate_password, hash_password, LoginLinkSigner};
use crate::config::TenancyConfig;
use crate::database::models::{CompanyProfile, Domain, SubscriptionPlan, Tenant, User};
use crate::database::schema::TENANT_TABLES;
use crate::database::DatabaseManager;
use crate::filter::FilterData;
use crate::tenancy::{ContextManager, ProvisioningError, TenancyError, TenantContext, TenantRegistry};
use crate::types::{IsolationMode, SubscriptionStatus, UserRole};

pub const INITIAL_PASSWORD_LEN: usize = 12;
pub const ADMIN_EMPLOYEE_ID: &str = "EMP001";

/// Sign-up form. Card details may be posted alongside; they are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub company_name: String,
    /// Subdomain label, e.g. `acme` for `acme.<base domain>`
    pub domain: String,
    pub plan_id: String,
    pub admin_email: String,
    pub admin_name: String,
    #[serde(default)]
    pub payment_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Provisioned {
    pub tenant: Tenant,
    pub domain: Domain,
    pub admin: User,
    pub profile: CompanyProfile,
}

/// Creates a tenant with its domain, admin user and company profile as one unit
#[derive(Clone)]
pub struct ProvisioningService {
    registry: TenantRegistry,
    contexts: ContextManager,
    notifier: Arc<dyn WelcomeNotifier>,
    links: LoginLinkSigner,
    tenancy: TenancyConfig,
}

impl ProvisioningService {
    pub fn new(
        registry: TenantRegistry,
        contexts: ContextManager,
        notifier: Arc<dyn WelcomeNotifier>,
        links: LoginLinkSigner,
        tenancy: TenancyConfig,
    ) -> Self {
        Self { registry, contexts, notifier, links, tenancy }
    }

    pub async fn provision(&self, request: ProvisionRequest) -> Result<Provisioned, ProvisioningError> {
        let company = request.company_name.trim().to_string();
        let fail = |e: TenancyError| ProvisioningError::new(company.clone(), e);

        let (label, plan) = validate(&request).map_err(fail)?;
        let host = self.tenancy.tenant_domain(&label);

        // Fail fast before anything is written
        if self.registry.domain_exists(&host).await.map_err(fail)? {
            return Err(fail(TenancyError::DuplicateDomain(host)));
        }

        let password = generate_password(INITIAL_PASSWORD_LEN);
        let password_hash = hash_password(&password).map_err(|e| fail(TenancyError::Internal(e.to_string())))?;

        let tenant = self.build_tenant(&company, &label, plan, request.payment_type.clone());
        let (tenant, mut domains) = self.registry.create(tenant, &[host]).await.map_err(fail)?;

        let (admin, profile) = match self.seed(&tenant, &request, &company, password_hash).await {
            Ok(seeded) => seeded,
            Err(e) => {
                error!("Provisioning {} failed after registration, rolling back: {}", tenant.slug, e);
                self.rollback(&tenant).await;
                return Err(fail(e));
            }
        };

        let domain = domains.remove(0);
        info!(
            "Provisioned tenant {} ({}) on {} with plan {}",
            tenant.slug, tenant.isolation_mode, domain.domain, tenant.plan_id
        );

        self.send_welcome(&tenant, &domain, &admin, password).await;

        Ok(Provisioned { tenant, domain, admin, profile })
    }

    fn build_tenant(&self, company: &str, label: &str, plan: &SubscriptionPlan, payment_type: Option<String>) -> Tenant {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let (status, trial_ends_at, subscription_ends_at) = if plan.is_free() {
            (SubscriptionStatus::Trial, Some(now + Duration::days(self.tenancy.trial_days)), None)
        } else {
            (SubscriptionStatus::Active, None, now.checked_add_months(Months::new(1)))
        };
        Tenant {
            id,
            company_name: company.to_string(),
            slug: label.to_string(),
            plan_id: plan.slug.clone(),
            subscription_status: status,
            isolation_mode: plan.isolation_mode,
            database_name: (plan.isolation_mode == IsolationMode::Dedicated)
                .then(|| DatabaseManager::dedicated_name_for(&id.to_string())),
            trial_ends_at,
            subscription_ends_at,
            subscription_type: payment_type,
            onboarding_completed: false,
            is_demo: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Admin user and company profile, written inside the new tenant's context
    async fn seed(
        &self,
        tenant: &Tenant,
        request: &ProvisionRequest,
        company: &str,
        password_hash: String,
    ) -> Result<(User, CompanyProfile), TenancyError> {
        let mut ctx = TenantContext::new();
        let scope = self.contexts.scoped(&mut ctx, tenant.clone()).await?;

        let mut admin = User::new(request.admin_name.trim(), request.admin_email.trim(), password_hash, UserRole::Admin);
        admin.employee_id = Some(ADMIN_EMPLOYEE_ID.to_string());
        let admin = self.contexts.repository::<User>(&scope).create(admin).await?;

        let mut profile = CompanyProfile::new(company);
        profile.email = Some(admin.email.clone());
        let profile = self.contexts.repository::<CompanyProfile>(&scope).create(profile).await?;

        Ok((admin, profile))
    }

    /// Undo everything `provision` persisted for `tenant`. Failures are logged, not returned.
    async fn rollback(&self, tenant: &Tenant) {
        match (&tenant.isolation_mode, tenant.database_name.as_deref()) {
            (IsolationMode::Dedicated, Some(name)) => {
                if let Err(e) = self.contexts.database().drop_dedicated(name).await {
                    error!("Rollback of {}: dropping {} failed: {}", tenant.slug, name, e);
                }
            }
            _ => {
                let central = self.contexts.database().central();
                let filter = FilterData::matching(json!({ "tenant_id": tenant.id }));
                for table in TENANT_TABLES {
                    if let Err(e) = central.delete(table.name, &filter).await {
                        error!("Rollback of {}: purging {} failed: {}", tenant.slug, table.name, e);
                    }
                }
            }
        }
        if let Err(e) = self.registry.remove(tenant.id).await {
            error!("Rollback of {}: removing registry rows failed: {}", tenant.slug, e);
        }
    }

    async fn send_welcome(&self, tenant: &Tenant, domain: &Domain, admin: &User, password: String) {
        let login_url = match self.links.url("http", &domain.domain, admin.id, Some(tenant.id)) {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not sign login link for {}: {}", tenant.slug, e);
                format!("http://{}/", domain.domain)
            }
        };
        let message = WelcomeMessage {
            tenant_id: tenant.id,
            company_name: tenant.company_name.clone(),
            admin_name: admin.name.clone(),
            admin_email: admin.email.clone(),
            login_url,
            initial_password: password,
        };
        if let Err(e) = self.notifier.send_welcome(&message).await {
            warn!("Welcome notification for {} failed: {}", tenant.slug, e);
        }
    }
}

/// Returns the normalised domain label and the chosen plan
pub fn validate(request: &ProvisionRequest) -> Result<(String, &'static SubscriptionPlan), TenancyError> {
    let company = request.company_name.trim();
    if company.is_empty() || company.chars().count() > 255 {
        return Err(TenancyError::Validation("company name must be 1-255 characters".to_string()));
    }

    let label = normalize_label(&request.domain)?;

    let plan = find_plan(&request.plan_id)
        .filter(|p| p.is_active)
        .ok_or_else(|| TenancyError::Validation(format!("unknown plan: {}", request.plan_id)))?;

    if !is_valid_email(request.admin_email.trim()) {
        return Err(TenancyError::Validation("admin email is not a valid address".to_string()));
    }
    if request.admin_name.trim().is_empty() {
        return Err(TenancyError::Validation("admin name is required".to_string()));
    }

    Ok((label, plan))
}

/// Lower-cased subdomain label: 1-63 of `[a-z0-9-]`, no leading or trailing hyphen
pub fn normalize_label(raw: &str) -> Result<String, TenancyError> {
    let label = raw.trim().to_ascii_lowercase();
    let valid = !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(label)
    } else {
        Err(TenancyError::Validation(format!(
            "domain '{}' may only contain letters, numbers and inner hyphens (max 63)",
            raw.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(domain: &str) -> ProvisionRequest {
        ProvisionRequest {
            company_name: "Acme Ltd".to_string(),
            domain: domain.to_string(),
            plan_id: "free".to_string(),
            admin_email: "a@acme.com".to_string(),
            admin_name: "Ann Admin".to_string(),
            payment_type: None,
        }
    }

    #[test]
    fn labels_are_lowercased_and_checked() {
        assert_eq!(normalize_label(" Acme-HR ").unwrap(), "acme-hr");
        assert!(normalize_label("-acme").is_err());
        assert!(normalize_label("acme-").is_err());
        assert!(normalize_label("acme.evil").is_err());
        assert!(normalize_label("ac me").is_err());
        assert!(normalize_label("").is_err());
        assert!(normalize_label(&"a".repeat(64)).is_err());
        assert!(normalize_label(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn validate_checks_plan_and_admin() {
        assert!(validate(&request("acme")).is_ok());

        let mut bad_plan = request("acme");
        bad_plan.plan_id = "gold".into();
        assert!(matches!(validate(&bad_plan), Err(TenancyError::Validation(_))));

        let mut bad_email = request("acme");
        bad_email.admin_email = "nope".into();
        assert!(validate(&bad_email).is_err());

        let mut no_name = request("acme");
        no_name.admin_name = "  ".into();
        assert!(validate(&no_name).is_err());
    }

    #[test]
    fn card_fields_are_accepted_and_ignored() {
        let body = json!({
            "company_name": "Acme",
            "domain": "acme",
            "plan_id": "plus",
            "admin_email": "a@acme.com",
            "admin_name": "Ann",
            "payment_type": "monthly",
            "card_number": "4242424242424242",
            "card_cvc": "123"
        });
        let parsed: ProvisionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.payment_type.as_deref(), Some("monthly"));
    }
}
