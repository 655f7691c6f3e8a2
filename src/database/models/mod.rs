use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

pub mod company_profile;
pub mod department;
pub mod domain;
pub mod plan;
pub mod tenant;
pub mod user;

pub use company_profile::CompanyProfile;
pub use department::Department;
pub use domain::Domain;
pub use plan::SubscriptionPlan;
pub use tenant::Tenant;
pub use user::User;

/// A row type owned by exactly one tenant.
///
/// `tenant_id` is `None` only on values that have not been stored yet; the
/// repository fills it from the active context on create and never changes it after.
pub trait TenantScoped: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> Uuid;
    fn tenant_id(&self) -> Option<Uuid>;
    fn set_tenant_id(&mut self, tenant_id: Uuid);
}
