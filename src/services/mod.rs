pub mod notification;
pub mod onboarding;
pub mod plans;
pub mod provisioning;
pub mod users;

pub use notification::{LogNotifier, NotifyError, WelcomeMessage, WelcomeNotifier};
pub use onboarding::{OnboardingInput, OnboardingService};
pub use provisioning::{ProvisionRequest, Provisioned, ProvisioningService};
pub use users::UserDirectory;

/// Loose shape check: one `@`, non-empty local part, dotted domain
pub(crate) fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
