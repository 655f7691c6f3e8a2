use chrono::{Months, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::TenancyError;
use crate::database::models::{domain, tenant, Domain, Tenant};
use crate::database::storage::{from_row, to_row, Row};
use crate::database::{DatabaseError, Storage};
use crate::filter::FilterData;
use crate::types::SubscriptionStatus;

/// Durable store of tenants and their domain aliases, kept in central storage
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    central: Arc<dyn Storage>,
}

impl TenantRegistry {
    pub fn new(central: Arc<dyn Storage>) -> Self {
        Self { central }
    }

    /// Persist `tenant` together with its domain aliases as one unit.
    ///
    /// Fails with [`TenancyError::DuplicateDomain`] before writing anything if any
    /// alias is already taken.
    pub async fn create(&self, tenant: Tenant, domains: &[String]) -> Result<(Tenant, Vec<Domain>), TenancyError> {
        if domains.is_empty() {
            return Err(TenancyError::Validation("a tenant needs at least one domain".to_string()));
        }
        let domains: Vec<Domain> = domains.iter().map(|d| Domain::new(d.as_str(), tenant.id)).collect();
        for d in &domains {
            if self.domain_exists(&d.domain).await? {
                return Err(TenancyError::DuplicateDomain(d.domain.clone()));
            }
        }
        if self.find_by_slug(&tenant.slug).await?.is_some() {
            return Err(Self::slug_taken(&tenant.slug));
        }

        let mut batch = vec![(tenant::TABLE.to_string(), to_row(&tenant)?)];
        for d in &domains {
            batch.push((domain::TABLE.to_string(), to_row(d)?));
        }

        // The unique indexes still catch a concurrent create of the same slug or alias
        let mut rows = self.central.insert_all(batch).await.map_err(|e| match e {
            DatabaseError::UniqueViolation { ref table, .. } if table == tenant::TABLE => Self::slug_taken(&tenant.slug),
            DatabaseError::UniqueViolation { .. } => TenancyError::DuplicateDomain(
                domains.iter().map(|d| d.domain.as_str()).collect::<Vec<_>>().join(", "),
            ),
            other => TenancyError::Database(other),
        })?;

        let tenant: Tenant = from_row(rows.remove(0))?;
        let domains = rows.into_iter().map(from_row).collect::<Result<Vec<Domain>, _>>()?;
        info!("Registered tenant {} ({}) with {} domain(s)", tenant.slug, tenant.id, domains.len());
        Ok((tenant, domains))
    }

    fn slug_taken(slug: &str) -> TenancyError {
        TenancyError::Validation(format!("A company with the identifier '{}' is already registered", slug))
    }

    /// Exact-match lookup. Callers normalise the host first.
    pub async fn resolve_by_domain(&self, host: &str) -> Result<Tenant, TenancyError> {
        let filter = FilterData { limit: Some(1), ..FilterData::matching(json!({ "domain": host })) };
        let alias: Domain = match self.central.select(domain::TABLE, &filter).await?.into_iter().next() {
            Some(row) => from_row(row)?,
            None => return Err(TenancyError::TenantNotFound(host.to_string())),
        };
        self.find_by_id(alias.tenant_id).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Tenant, TenancyError> {
        let filter = FilterData { limit: Some(1), ..FilterData::matching(json!({ "id": id })) };
        match self.central.select(tenant::TABLE, &filter).await?.into_iter().next() {
            Some(row) => Ok(from_row(row)?),
            None => Err(TenancyError::TenantNotFound(id.to_string())),
        }
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, TenancyError> {
        let filter = FilterData { limit: Some(1), ..FilterData::matching(json!({ "slug": slug })) };
        match self.central.select(tenant::TABLE, &filter).await?.into_iter().next() {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn domains_for(&self, tenant_id: Uuid) -> Result<Vec<Domain>, TenancyError> {
        let filter = FilterData::matching(json!({ "tenant_id": tenant_id })).order_by("created_at asc");
        let rows = self.central.select(domain::TABLE, &filter).await?;
        Ok(rows.into_iter().map(from_row).collect::<Result<Vec<Domain>, _>>()?)
    }

    pub async fn domain_exists(&self, host: &str) -> Result<bool, TenancyError> {
        let filter = FilterData::matching(json!({ "domain": host.to_ascii_lowercase() }));
        Ok(self.central.count(domain::TABLE, &filter).await? > 0)
    }

    pub async fn add_domain(&self, tenant_id: Uuid, host: &str) -> Result<Domain, TenancyError> {
        self.find_by_id(tenant_id).await?;
        let alias = Domain::new(host, tenant_id);
        if self.domain_exists(&alias.domain).await? {
            return Err(TenancyError::DuplicateDomain(alias.domain));
        }
        let row = self.central.insert(domain::TABLE, to_row(&alias)?).await.map_err(|e| match e {
            DatabaseError::UniqueViolation { .. } => TenancyError::DuplicateDomain(alias.domain.clone()),
            other => TenancyError::Database(other),
        })?;
        Ok(from_row(row)?)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, TenancyError> {
        let filter = FilterData::default().order_by("created_at asc");
        let rows = self.central.select(tenant::TABLE, &filter).await?;
        Ok(rows.into_iter().map(from_row).collect::<Result<Vec<Tenant>, _>>()?)
    }

    pub async fn set_status(&self, id: Uuid, status: SubscriptionStatus) -> Result<Tenant, TenancyError> {
        info!("Setting tenant {} status to {}", id, status);
        self.update(id, json!({ "subscription_status": status })).await
    }

    /// Extend the subscription by one month from now and mark it active
    pub async fn renew_subscription(&self, id: Uuid) -> Result<Tenant, TenancyError> {
        let ends_at = Utc::now()
            .checked_add_months(Months::new(1))
            .ok_or_else(|| TenancyError::Internal("subscription end date out of range".to_string()))?;
        self.update(
            id,
            json!({ "subscription_status": SubscriptionStatus::Active, "subscription_ends_at": ends_at }),
        )
        .await
    }

    /// Flag onboarding as done, optionally taking the company name confirmed during onboarding
    pub async fn mark_onboarding_completed(&self, id: Uuid, company_name: Option<&str>) -> Result<Tenant, TenancyError> {
        let mut changes = json!({ "onboarding_completed": true });
        if let Some(name) = company_name {
            changes["company_name"] = json!(name);
        }
        self.update(id, changes).await
    }

    /// Delete the tenant and its domain aliases. Tenant-owned rows are not touched.
    pub async fn remove(&self, id: Uuid) -> Result<(), TenancyError> {
        self.central
            .delete(domain::TABLE, &FilterData::matching(json!({ "tenant_id": id })))
            .await?;
        self.central
            .delete(tenant::TABLE, &FilterData::matching(json!({ "id": id })))
            .await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, changes: Value) -> Result<Tenant, TenancyError> {
        let mut changes: Row = match changes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        changes.insert("updated_at".to_string(), json!(Utc::now()));
        let rows = self
            .central
            .update(tenant::TABLE, &FilterData::matching(json!({ "id": id })), changes)
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(from_row(row)?),
            None => Err(TenancyError::TenantNotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStorage;
    use crate::types::IsolationMode;

    fn new_tenant(slug: &str) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            company_name: slug.to_string(),
            slug: slug.to_string(),
            plan_id: "free".to_string(),
            subscription_status: SubscriptionStatus::Trial,
            isolation_mode: IsolationMode::Shared,
            database_name: None,
            trial_ends_at: None,
            subscription_ends_at: None,
            subscription_type: None,
            onboarding_completed: false,
            is_demo: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn registry() -> TenantRegistry {
        TenantRegistry::new(Arc::new(MemoryStorage::central("hrms_central")))
    }

    #[tokio::test]
    async fn resolves_exact_domain_only() {
        let registry = registry();
        let (tenant, _) = registry.create(new_tenant("acme"), &["acme.localhost".to_string()]).await.unwrap();

        assert_eq!(registry.resolve_by_domain("acme.localhost").await.unwrap().id, tenant.id);
        assert!(matches!(
            registry.resolve_by_domain("www.acme.localhost").await,
            Err(TenancyError::TenantNotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_alias_across_tenants_is_rejected() {
        let registry = registry();
        registry.create(new_tenant("acme"), &["acme.localhost".to_string()]).await.unwrap();
        let err = registry
            .create(new_tenant("beta"), &["beta.localhost".to_string(), "ACME.localhost".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::DuplicateDomain(ref d) if d == "acme.localhost"));
        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert!(!registry.domain_exists("beta.localhost").await.unwrap());
    }

    #[tokio::test]
    async fn taken_slug_is_not_reported_as_a_domain() {
        let registry = registry();
        registry.create(new_tenant("acme"), &["acme.localhost".to_string()]).await.unwrap();
        let err = registry
            .create(new_tenant("acme"), &["acme.example.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::Validation(ref msg) if msg.contains("'acme'")));
        assert!(!registry.domain_exists("acme.example.com").await.unwrap());
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lifecycle_updates() {
        let registry = registry();
        let (tenant, _) = registry.create(new_tenant("acme"), &["acme.localhost".to_string()]).await.unwrap();
        assert_eq!(registry.find_by_slug("acme").await.unwrap().map(|t| t.id), Some(tenant.id));
        assert!(registry.find_by_slug("beta").await.unwrap().is_none());

        let suspended = registry.set_status(tenant.id, SubscriptionStatus::Suspended).await.unwrap();
        assert!(!suspended.subscription_status.allows_access());

        let renewed = registry.renew_subscription(tenant.id).await.unwrap();
        assert!(renewed.is_active());
        assert!(renewed.days_remaining() >= 27);

        let onboarded = registry.mark_onboarding_completed(tenant.id, Some("Acme Holdings")).await.unwrap();
        assert!(onboarded.onboarding_completed);
        assert_eq!(onboarded.company_name, "Acme Holdings");

        registry.add_domain(tenant.id, "hr.acme.test").await.unwrap();
        assert_eq!(registry.domains_for(tenant.id).await.unwrap().len(), 2);

        registry.remove(tenant.id).await.unwrap();
        assert!(registry.find_by_id(tenant.id).await.is_err());
        assert!(!registry.domain_exists("hr.acme.test").await.unwrap());
    }
}
