use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TABLE: &str = "domains";

/// Fully qualified hostname owned by one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    pub domain: String,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(domain: impl Into<String>, tenant_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into().to_ascii_lowercase(),
            tenant_id,
            created_at: Utc::now(),
        }
    }
}
