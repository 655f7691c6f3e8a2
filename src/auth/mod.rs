use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::{Tenant, User};
use crate::types::UserRole;

pub mod link;
pub mod password;

pub use link::{LinkClaims, LoginLinkSigner};
pub use password::{generate_password, hash_password, verify_password};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,

    #[error("Token issued for a different tenant")]
    WrongTenant,

    #[error("Password hashing error: {0}")]
    Crypto(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(err.to_string()),
        }
    }
}

/// Session token claims. A session is only valid on the tenant it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub tenant: String,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user: &User, tenant: &Tenant, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();
        Self {
            sub: user.id,
            tenant_id: tenant.id,
            tenant: tenant.slug.clone(),
            email: user.email.clone(),
            role: user.role,
            exp,
            iat: now.timestamp(),
        }
    }
}

/// Issues and checks session JWTs
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    expiry_hours: u64,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").field("expiry_hours", &self.expiry_hours).finish()
    }
}

impl SessionKeys {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self { secret: config.jwt_secret.clone(), expiry_hours: config.jwt_expiry_hours }
    }

    pub fn issue(&self, user: &User, tenant: &Tenant) -> Result<String, AuthError> {
        generate_jwt(&Claims::new(user, tenant, self.expiry_hours), &self.secret)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)?;
        Ok(data.claims)
    }
}

pub fn generate_jwt<T: Serialize>(claims: &T, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::{IsolationMode, SubscriptionStatus};

    fn fixtures() -> (User, Tenant) {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            company_name: "Acme".into(),
            slug: "acme".into(),
            plan_id: "free".into(),
            subscription_status: SubscriptionStatus::Trial,
            isolation_mode: IsolationMode::Shared,
            database_name: None,
            trial_ends_at: None,
            subscription_ends_at: None,
            subscription_type: None,
            onboarding_completed: false,
            is_demo: false,
            created_at: now,
            updated_at: now,
        };
        let user = User::new("Ann", "a@acme.com", String::new(), UserRole::Admin);
        (user, tenant)
    }

    #[test]
    fn session_round_trip_keeps_tenant() {
        let keys = SessionKeys::from_config(&AppConfig::development().security);
        let (user, tenant) = fixtures();
        let token = keys.issue(&user, &tenant).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant_id, tenant.id);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let mut security = AppConfig::development().security;
        let (user, tenant) = fixtures();
        let token = SessionKeys::from_config(&security).issue(&user, &tenant).unwrap();
        security.jwt_secret = "another-secret".into();
        assert!(matches!(
            SessionKeys::from_config(&security).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(generate_jwt(&serde_json::json!({}), ""), Err(AuthError::InvalidSecret)));
    }
}
