use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::TenantScoped;
use crate::types::UserRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub employee_id: Option<String>,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: None,
            name: name.into(),
            email: email.into().to_ascii_lowercase(),
            password_hash,
            role,
            employee_id: None,
            department_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Representation safe to return over HTTP
    pub fn to_public_json(&self) -> Value {
        json!({
            "id": self.id,
            "tenant_id": self.tenant_id,
            "name": self.name,
            "email": self.email,
            "role": self.role,
            "employee_id": self.employee_id,
            "department_id": self.department_id,
            "is_active": self.is_active,
            "created_at": self.created_at,
        })
    }
}

impl TenantScoped for User {
    const TABLE: &'static str = "users";

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
