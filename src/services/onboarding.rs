use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::is_valid_email;
use super::users::UserDirectory;
use crate::auth::hash_password;
use crate::database::models::{CompanyProfile, Department, Tenant, User};
use crate::database::Row;
use crate::filter::FilterData;
use crate::tenancy::{ContextManager, TenancyError, TenantContext, TenantRegistry};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Answers collected by the onboarding wizard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardingInput {
    pub company_name: String,
    #[serde(default)]
    pub address_line: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub company_phone: Option<String>,
    #[serde(default)]
    pub company_email: Option<String>,
    #[serde(default)]
    pub fiscal_year_start: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub work_hours: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub personal_email: String,
    pub password: String,
    #[serde(default)]
    pub department_name: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
}

impl OnboardingInput {
    fn validate(&self) -> Result<(), TenancyError> {
        if self.company_name.trim().is_empty() {
            return Err(TenancyError::Validation("company name is required".to_string()));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(TenancyError::Validation("first and last name are required".to_string()));
        }
        if !is_valid_email(self.personal_email.trim()) {
            return Err(TenancyError::Validation("email is not a valid address".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TenancyError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if let Some(email) = self.company_email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !is_valid_email(email.trim()) {
                return Err(TenancyError::Validation("company email is not a valid address".to_string()));
            }
        }
        Ok(())
    }
}

/// Finishes the first-run wizard inside the active tenant
#[derive(Debug, Clone)]
pub struct OnboardingService {
    registry: TenantRegistry,
    contexts: ContextManager,
}

impl OnboardingService {
    pub fn new(registry: TenantRegistry, contexts: ContextManager) -> Self {
        Self { registry, contexts }
    }

    /// All-or-nothing: checks that can fail run before the first write, and the
    /// company profile and admin are put back if a later write fails.
    pub async fn complete(&self, ctx: &TenantContext, user_id: Uuid, input: OnboardingInput) -> Result<Tenant, TenancyError> {
        input.validate()?;
        let tenant = ctx.current()?.tenant.clone();

        let directory = UserDirectory::new(&self.contexts, ctx);
        let admin = directory.find(user_id).await?;
        let email = input.personal_email.trim().to_ascii_lowercase();
        if let Some(other) = directory.find_by_email(&email).await? {
            if other.id != user_id {
                return Err(TenancyError::Validation(format!("{} is already used by another user", email)));
            }
        }
        let password_hash = hash_password(&input.password).map_err(|e| TenancyError::Internal(e.to_string()))?;

        let (profile, previous) = self.upsert_profile(ctx, &input).await?;
        let rest = async {
            self.update_admin(ctx, user_id, &input, &email, password_hash).await?;
            if let Some(name) = input.department_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                self.ensure_department(ctx, name, input.branch_name.clone()).await?;
            }
            self.registry
                .mark_onboarding_completed(tenant.id, Some(input.company_name.trim()))
                .await
        };
        match rest.await {
            Ok(tenant) => {
                info!("Tenant {} completed onboarding", tenant.slug);
                Ok(tenant)
            }
            Err(e) => {
                warn!("Onboarding of {} failed, restoring previous state: {}", tenant.slug, e);
                self.restore_profile(ctx, profile, previous).await;
                self.restore_admin(ctx, admin).await;
                Err(e)
            }
        }
    }

    /// Write the wizard's answers to the profile. Returns the stored profile and
    /// the one it replaced.
    async fn upsert_profile(
        &self,
        ctx: &TenantContext,
        input: &OnboardingInput,
    ) -> Result<(CompanyProfile, Option<CompanyProfile>), TenancyError> {
        let profiles = self.contexts.repository::<CompanyProfile>(ctx);
        let mut changes = object(json!({
            "company_name": input.company_name.trim(),
            "address_line": input.address_line,
            "city": input.city,
            "state": input.state,
            "postal_code": input.postal_code,
            "country": input.country,
            "phone": input.company_phone,
            "email": input.company_email,
            "fiscal_year_start": input.fiscal_year_start.as_deref().unwrap_or("01-01"),
            "currency": input.currency.as_deref().unwrap_or("USD"),
        }));
        if let Some(hours) = &input.work_hours {
            changes.insert("work_hours".to_string(), json!(hours));
        }
        // Unanswered questions keep what provisioning stored
        changes.retain(|_, v| !v.is_null());

        match profiles.select_one(FilterData::default()).await? {
            Some(existing) => {
                let stored = profiles.update(existing.id, changes).await?;
                Ok((stored, Some(existing)))
            }
            None => {
                let mut merged = object(json!(CompanyProfile::new(input.company_name.trim())));
                merged.extend(changes);
                let profile: CompanyProfile = serde_json::from_value(Value::Object(merged))?;
                Ok((profiles.create(profile).await?, None))
            }
        }
    }

    async fn restore_profile(&self, ctx: &TenantContext, stored: CompanyProfile, previous: Option<CompanyProfile>) {
        let profiles = self.contexts.repository::<CompanyProfile>(ctx);
        let result = match previous {
            Some(previous) => {
                let mut row = object(json!(previous));
                row.remove("id");
                row.remove("tenant_id");
                profiles.update(stored.id, row).await.map(|_| ())
            }
            None => profiles.delete(stored.id).await,
        };
        if let Err(e) = result {
            error!("Restoring company profile {} failed: {}", stored.id, e);
        }
    }

    async fn restore_admin(&self, ctx: &TenantContext, admin: User) {
        let changes = object(json!({
            "name": admin.name,
            "email": admin.email,
            "password_hash": admin.password_hash,
        }));
        if let Err(e) = self.contexts.repository::<User>(ctx).update(admin.id, changes).await {
            error!("Restoring admin {} failed: {}", admin.id, e);
        }
    }

    async fn update_admin(
        &self,
        ctx: &TenantContext,
        user_id: Uuid,
        input: &OnboardingInput,
        email: &str,
        password_hash: String,
    ) -> Result<User, TenancyError> {
        let changes = object(json!({
            "name": format!("{} {}", input.first_name.trim(), input.last_name.trim()),
            "email": email,
            "password_hash": password_hash,
        }));
        self.contexts.repository::<User>(ctx).update(user_id, changes).await
    }

    async fn ensure_department(&self, ctx: &TenantContext, name: &str, branch_name: Option<String>) -> Result<Department, TenancyError> {
        let departments = self.contexts.repository::<Department>(ctx);
        match departments.select_one(FilterData::matching(json!({ "name": name }))).await? {
            Some(existing) => {
                let changes = object(json!({ "branch_name": branch_name, "is_active": true }));
                departments.update(existing.id, changes).await
            }
            None => {
                let mut department = Department::new(name);
                department.branch_name = branch_name;
                departments.create(department).await
            }
        }
    }
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
