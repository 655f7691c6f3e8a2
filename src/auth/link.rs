use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{generate_jwt, AuthError};
use crate::config::SecurityConfig;

const PURPOSE: &str = "login_link";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkClaims {
    pub sub: Uuid,
    /// Tenant the link hands the session to; `None` for the central zone
    pub tenant_id: Option<Uuid>,
    pub purpose: String,
    pub exp: i64,
    pub iat: i64,
}

/// Signs short-lived links that carry a user from one domain to another
#[derive(Clone)]
pub struct LoginLinkSigner {
    secret: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for LoginLinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginLinkSigner").field("ttl_secs", &self.ttl_secs).finish()
    }
}

impl LoginLinkSigner {
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self { secret: secret.into(), ttl_secs }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.login_link_ttl_secs)
    }

    pub fn sign(&self, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<String, AuthError> {
        self.sign_at(user_id, tenant_id, Utc::now().timestamp())
    }

    fn sign_at(&self, user_id: Uuid, tenant_id: Option<Uuid>, iat: i64) -> Result<String, AuthError> {
        let claims = LinkClaims {
            sub: user_id,
            tenant_id,
            purpose: PURPOSE.to_string(),
            exp: iat + self.ttl_secs as i64,
            iat,
        };
        generate_jwt(&claims, &self.secret)
    }

    /// Full URL on `host` for the login endpoint
    pub fn url(&self, scheme: &str, host: &str, user_id: Uuid, tenant_id: Option<Uuid>) -> Result<String, AuthError> {
        let token = self.sign(user_id, tenant_id)?;
        Ok(format!("{}://{}/auth/login/{}?token={}", scheme, host, user_id, token))
    }

    /// Check signature, expiry, purpose and that the link was issued for `user_id`
    pub fn verify(&self, token: &str, user_id: Uuid) -> Result<LinkClaims, AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }
        let mut validation = Validation::default();
        validation.leeway = 0;
        let claims = decode::<LinkClaims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)?.claims;
        if claims.purpose != PURPOSE {
            return Err(AuthError::InvalidToken("not a login link".to_string()));
        }
        if claims.sub != user_id {
            return Err(AuthError::InvalidToken("link issued for another user".to_string()));
        }
        Ok(claims)
    }
}
