//! Subscription plan catalogue. Plans are fixed product tiers, not stored rows.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::database::models::SubscriptionPlan;
use crate::types::IsolationMode;

fn plan(
    slug: &str,
    name: &str,
    description: &str,
    monthly_cents: i64,
    yearly_cents: i64,
    max_users: i32,
    isolation_mode: IsolationMode,
    features: &[&str],
) -> SubscriptionPlan {
    SubscriptionPlan {
        slug: slug.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        price_monthly: Decimal::new(monthly_cents, 2),
        price_yearly: Decimal::new(yearly_cents, 2),
        max_users,
        isolation_mode,
        features: features.iter().map(|f| f.to_string()).collect(),
        is_active: true,
    }
}

pub static PLANS: Lazy<Vec<SubscriptionPlan>> = Lazy::new(|| {
    vec![
        plan(
            "free",
            "Free",
            "Perfect for small businesses getting started with HR management",
            0,
            0,
            15,
            IsolationMode::Shared,
            &["Basic employee management", "Basic attendance tracking", "Standard reports", "Email support"],
        ),
        plan(
            "plus",
            "Plus",
            "Enhanced features for growing teams",
            4999,
            49999,
            50,
            IsolationMode::Shared,
            &["Full employee management", "Onboarding framework", "Custom reports", "Priority email support"],
        ),
        plan(
            "pro",
            "Pro",
            "Advanced features with dedicated infrastructure",
            14999,
            149999,
            250,
            IsolationMode::Dedicated,
            &["All Plus features", "Dedicated database", "Full API access", "Payroll processing"],
        ),
        // Custom pricing
        plan(
            "enterprise",
            "Enterprise",
            "Custom solutions for large organizations",
            0,
            0,
            -1,
            IsolationMode::Dedicated,
            &["All Pro features", "Custom domain support", "SLA guarantees", "Unlimited users"],
        ),
    ]
});

pub fn find_plan(slug: &str) -> Option<&'static SubscriptionPlan> {
    PLANS.iter().find(|p| p.slug == slug)
}

pub fn active_plans() -> Vec<&'static SubscriptionPlan> {
    PLANS.iter().filter(|p| p.is_active).collect()
}
