use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TenantScoped;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub branch_name: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: None,
            name: name.into(),
            branch_name: None,
            description: None,
            manager_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TenantScoped for Department {
    const TABLE: &'static str = "departments";

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: Uuid) {
        self.tenant_id = Some(tenant_id);
    }
}
