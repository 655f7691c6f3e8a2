use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{IsolationMode, SubscriptionStatus};

pub const TABLE: &str = "tenants";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub company_name: String,
    pub slug: String,
    pub plan_id: String,
    pub subscription_status: SubscriptionStatus,
    pub isolation_mode: IsolationMode,
    /// Set for dedicated tenants only
    pub database_name: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub subscription_type: Option<String>,
    pub onboarding_completed: bool,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_dedicated(&self) -> bool {
        self.isolation_mode == IsolationMode::Dedicated
    }

    pub fn is_on_trial(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Trial
            && self.trial_ends_at.map(|t| t > Utc::now()).unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
            && self.subscription_ends_at.map(|t| t > Utc::now()).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now();
        match self.subscription_status {
            SubscriptionStatus::Trial => self.trial_ends_at.map(|t| t <= now).unwrap_or(false),
            SubscriptionStatus::Active => self.subscription_ends_at.map(|t| t <= now).unwrap_or(false),
            SubscriptionStatus::Suspended | SubscriptionStatus::Cancelled => false,
        }
    }

    /// Whole days left on the current trial or subscription period
    pub fn days_remaining(&self) -> i64 {
        let end = match self.subscription_status {
            SubscriptionStatus::Trial => self.trial_ends_at,
            _ => self.subscription_ends_at,
        };
        end.map(|t| (t - Utc::now()).num_days().max(0)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tenant(status: SubscriptionStatus) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            company_name: "Acme".into(),
            slug: "acme".into(),
            plan_id: "free".into(),
            subscription_status: status,
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

    #[test]
    fn trial_lifecycle() {
        let mut t = tenant(SubscriptionStatus::Trial);
        t.trial_ends_at = Some(Utc::now() + Duration::days(14) + Duration::minutes(1));
        assert!(t.is_on_trial());
        assert!(!t.is_expired());
        assert_eq!(t.days_remaining(), 14);

        t.trial_ends_at = Some(Utc::now() - Duration::days(1));
        assert!(!t.is_on_trial());
        assert!(t.is_expired());
        assert_eq!(t.days_remaining(), 0);
    }

    #[test]
    fn suspended_is_neither_active_nor_expired() {
        let mut t = tenant(SubscriptionStatus::Suspended);
        t.subscription_ends_at = Some(Utc::now() + Duration::days(3));
        assert!(!t.is_active());
        assert!(!t.is_expired());
    }
}
