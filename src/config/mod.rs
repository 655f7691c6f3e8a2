use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub central_database: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// Extra attempts made when a dedicated target cannot be reached
    pub activation_retries: u32,
    pub activation_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Tenant hosts are `<label>.<base_domain>`
    pub base_domain: String,
    /// Hosts served as the central (no tenant) zone
    pub central_domains: Vec<String>,
    pub trial_days: i64,
    pub not_found_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub enable_audit_logging: bool,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub login_link_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" | "pg" => StorageBackend::Postgres,
                "memory" | "mem" => StorageBackend::Memory,
                _ => self.database.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_CENTRAL_NAME") {
            self.database.central_database = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ACTIVATION_RETRIES") {
            self.database.activation_retries = v.parse().unwrap_or(self.database.activation_retries);
        }
        if let Ok(v) = env::var("DATABASE_ACTIVATION_BACKOFF_MS") {
            self.database.activation_backoff_ms = v.parse().unwrap_or(self.database.activation_backoff_ms);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANCY_BASE_DOMAIN") {
            self.tenancy.base_domain = v.trim().trim_start_matches('.').to_ascii_lowercase();
        }
        if let Ok(v) = env::var("TENANCY_CENTRAL_DOMAINS") {
            self.tenancy.central_domains = v
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("TENANCY_TRIAL_DAYS") {
            self.tenancy.trial_days = v.parse().unwrap_or(self.tenancy.trial_days);
        }

        // API overrides
        if let Ok(v) = env::var("HRMS_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_LOGIN_LINK_TTL_SECS") {
            self.security.login_link_ttl_secs = v.parse().unwrap_or(self.security.login_link_ttl_secs);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_limit: Some(1000),
                debug_logging: true,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: None,
                central_database: "hrms_central".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                activation_retries: 1,
                activation_backoff_ms: 50,
            },
            tenancy: TenancyConfig {
                base_domain: "localhost".to_string(),
                central_domains: vec!["localhost".to_string(), "127.0.0.1".to_string()],
                trial_days: 14,
                not_found_path: "/tenant-not-found".to_string(),
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                enable_audit_logging: false,
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                login_link_ttl_secs: 30 * 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_limit: Some(500),
                debug_logging: false,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: None,
                central_database: "hrms_central".to_string(),
                max_connections: 20,
                connection_timeout: 10,
                activation_retries: 2,
                activation_backoff_ms: 100,
            },
            tenancy: TenancyConfig {
                base_domain: "staging.example.com".to_string(),
                central_domains: vec!["staging.example.com".to_string()],
                trial_days: 14,
                not_found_path: "/tenant-not-found".to_string(),
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                login_link_ttl_secs: 15 * 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(100),
                debug_logging: false,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: None,
                central_database: "hrms_central".to_string(),
                max_connections: 50,
                connection_timeout: 5,
                activation_retries: 3,
                activation_backoff_ms: 200,
            },
            tenancy: TenancyConfig {
                base_domain: "app.example.com".to_string(),
                central_domains: vec!["app.example.com".to_string()],
                trial_days: 14,
                not_found_path: "/tenant-not-found".to_string(),
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                enable_cors: false,
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                login_link_ttl_secs: 5 * 60,
            },
        }
    }
}

impl TenancyConfig {
    /// Canonical host for a tenant label
    pub fn tenant_domain(&self, label: &str) -> String {
        format!("{}.{}", label.to_ascii_lowercase(), self.base_domain)
    }

    pub fn is_central(&self, host: &str) -> bool {
        self.central_domains.iter().any(|d| d == host)
    }

    pub fn primary_central_domain(&self) -> &str {
        self.central_domains
            .first()
            .map(String::as_str)
            .unwrap_or("localhost")
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
