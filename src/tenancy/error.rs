use thiserror::Error;
use uuid::Uuid;

use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("No active tenant context")]
    NoActiveTenant,

    #[error("Domain already in use: {0}")]
    DuplicateDomain(String),

    #[error("Could not activate tenant {tenant_id}: {source}")]
    ContextActivation {
        tenant_id: Uuid,
        #[source]
        source: DatabaseError,
    },

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Row for tenant {found} written while tenant {active} is active")]
    TenantMismatch { active: Uuid, found: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl TenancyError {
    /// Errors that mean tenant isolation was about to be violated
    pub fn is_isolation_violation(&self) -> bool {
        matches!(self, TenancyError::NoActiveTenant | TenancyError::TenantMismatch { .. })
    }
}

/// Failure of the all-or-nothing tenant creation sequence. Persisted state has
/// been rolled back by the time this is returned.
#[derive(Debug, Error)]
#[error("Provisioning {company} failed: {source}")]
pub struct ProvisioningError {
    pub company: String,
    #[source]
    pub source: TenancyError,
}

impl ProvisioningError {
    pub fn new(company: impl Into<String>, source: TenancyError) -> Self {
        Self { company: company.into(), source }
    }

    pub fn root_cause(&self) -> &TenancyError {
        &self.source
    }

    pub fn is_duplicate_domain(&self) -> bool {
        matches!(self.source, TenancyError::DuplicateDomain(_))
    }
}
