pub mod auth;
pub mod onboarding;
pub mod response;
pub mod tenant;

pub use auth::{session_auth_middleware, AuthUser};
pub use onboarding::{onboarding_gate_middleware, ONBOARDING_PATH};
pub use response::{ApiResponse, ApiResult};
pub use tenant::{tenant_dispatch_middleware, CentralZone, CurrentTenant, TenantZone};
