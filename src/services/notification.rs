use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Credentials handed to a new tenant's admin
#[derive(Debug, Clone, Serialize)]
pub struct WelcomeMessage {
    pub tenant_id: Uuid,
    pub company_name: String,
    pub admin_name: String,
    pub admin_email: String,
    pub login_url: String,
    #[serde(skip_serializing)]
    pub initial_password: String,
}

/// Delivery of the welcome notification after provisioning. Failures are
/// reported to the caller but never undo the provisioning.
#[async_trait]
pub trait WelcomeNotifier: Send + Sync {
    async fn send_welcome(&self, message: &WelcomeMessage) -> Result<(), NotifyError>;
}

/// Writes the notification to the log instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl WelcomeNotifier for LogNotifier {
    async fn send_welcome(&self, message: &WelcomeMessage) -> Result<(), NotifyError> {
        info!(
            tenant_id = %message.tenant_id,
            email = %message.admin_email,
            "Welcome credentials for {} issued, login at {}",
            message.company_name,
            message.login_url
        );
        Ok(())
    }
}
