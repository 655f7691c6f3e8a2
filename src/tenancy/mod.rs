//! Tenant resolution and per-request tenant scoping.
//!
//! The active tenant is carried in an explicit [`TenantContext`] value owned by
//! the request (or task) handling it. There is no process-wide "current tenant".

pub mod context;
pub mod error;
pub mod host;
pub mod manager;
pub mod registry;

pub use context::{ActiveTenant, TenantContext, TenantScope};
pub use error::{ProvisioningError, TenancyError};
pub use manager::ContextManager;
pub use registry::TenantRegistry;
