use std::sync::Arc;

use crate::auth::{LoginLinkSigner, SessionKeys};
use crate::config::AppConfig;
use crate::database::{Connector, DatabaseManager, MemoryConnector, MemoryStorage, Storage};
use crate::services::{LogNotifier, OnboardingService, ProvisioningService, WelcomeNotifier};
use crate::tenancy::{ContextManager, TenantRegistry};

/// Shared services handed to every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub contexts: ContextManager,
    pub registry: TenantRegistry,
    pub provisioning: ProvisioningService,
    pub onboarding: OnboardingService,
    pub sessions: SessionKeys,
    pub links: LoginLinkSigner,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        central: Arc<dyn Storage>,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn WelcomeNotifier>,
    ) -> Self {
        let db = Arc::new(DatabaseManager::new(central.clone(), connector, &config.database));
        let contexts = ContextManager::new(db);
        let registry = TenantRegistry::new(central);
        let links = LoginLinkSigner::from_config(&config.security);
        let provisioning = ProvisioningService::new(
            registry.clone(),
            contexts.clone(),
            notifier,
            links.clone(),
            config.tenancy.clone(),
        );
        let onboarding = OnboardingService::new(registry.clone(), contexts.clone());
        let sessions = SessionKeys::from_config(&config.security);

        Self {
            config: Arc::new(config),
            contexts,
            registry,
            provisioning,
            onboarding,
            sessions,
            links,
        }
    }

    /// Everything in process memory, welcome notifications go to the log
    pub fn in_memory(config: AppConfig) -> Self {
        let central = Arc::new(MemoryStorage::central(config.database.central_database.clone()));
        Self::new(config, central, Arc::new(MemoryConnector::new()), Arc::new(LogNotifier))
    }

    pub fn database(&self) -> &Arc<DatabaseManager> {
        self.contexts.database()
    }
}
