use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::IsolationMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price_monthly: Decimal,
    pub price_yearly: Decimal,
    /// -1 means unlimited
    pub max_users: i32,
    pub isolation_mode: IsolationMode,
    pub features: Vec<String>,
    pub is_active: bool,
}

impl SubscriptionPlan {
    pub fn is_free(&self) -> bool {
        self.slug == "free"
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_users < 0
    }

    pub fn allows_users(&self, count: i64) -> bool {
        self.is_unlimited() || count < i64::from(self.max_users)
    }

    /// Saving from paying yearly instead of twelve monthly payments
    pub fn yearly_savings(&self) -> Decimal {
        (self.price_monthly * Decimal::from(12) - self.price_yearly).max(Decimal::ZERO)
    }
}
