use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TenantScoped;

pub const DEFAULT_WORK_DAYS: [&str; 5] = ["monday", "tuesday", "wednesday", "thursday", "friday"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: Uuid,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
    pub company_name: String,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub timezone: String,
    pub currency: String,
    pub fiscal_year_start: String,
    pub work_hours: String,
    pub work_days: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyProfile {
    pub fn new(company_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: None,
            company_name: company_name.into(),
            address_line: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            phone: None,
            email: None,
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
            fiscal_year_start: "01-01".to_string(),
            work_hours: "08:00-17:00".to_string(),
            work_days: DEFAULT_WORK_DAYS.iter().map(|d| d.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl TenantScoped for CompanyProfile {
    const TABLE: &'static str = "company_profiles";

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
