/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a tenant's rows are physically separated from other tenants.
/// Fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Rows live in the central schema, tagged with `tenant_id`
    Shared,
    /// Tenant owns a separate physical database
    Dedicated,
}

/// Subscription lifecycle of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Suspended,
    Cancelled,
}

impl SubscriptionStatus {
    /// Suspended and cancelled tenants are refused at the HTTP boundary
    pub fn allows_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

/// Role carried by a tenant user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    HrManager,
    Manager,
    Employee,
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::Shared => write!(f, "shared"),
            IsolationMode::Dedicated => write!(f, "dedicated"),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserRole::Admin => "admin",
            UserRole::HrManager => "hr_manager",
            UserRole::Manager => "manager",
            UserRole::Employee => "employee",
        };
        f.write_str(s)
    }
}
