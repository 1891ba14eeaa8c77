//! Bearer token verification and the authenticated caller.
//!
//! Tokens are HS256 JWTs minted by the identity service. This service only
//! verifies them; `issue_token` exists for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{domain::roles::Role, infra::app_error::AppError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: i32,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(
    user_id: i32,
    role: Role,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Caller identity, inserted into request extensions by the authorization middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins pass every ownership check.
    pub fn owns(&self, owner_id: i32) -> bool {
        self.is_admin() || self.user_id == owner_id
    }

    pub fn ensure_owner(&self, owner_id: i32, resource: &str) -> Result<(), AppError> {
        if self.owns(owner_id) {
            Ok(())
        } else {
            Err(AppError::ForbiddenResource(format!(
                "You do not have access to this {resource}"
            )))
        }
    }

    pub fn ensure_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if self.is_admin() || allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::ForbiddenResource(format!(
                "This action requires one of the roles: {}",
                allowed
                    .iter()
                    .map(|role| role.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    pub fn ensure_admin(&self) -> Result<(), AppError> {
        self.ensure_role(&[Role::Admin])
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

    #[test]
    fn issued_tokens_verify() {
        let token = issue_token(7, Role::Vet, SECRET, Duration::minutes(5)).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, "vet");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(7, Role::Vet, SECRET, Duration::minutes(5)).unwrap();
        assert!(verify_token(&token, "another-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Well past the default 60 second leeway.
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            role: "customer".into(),
            iat: now - 600,
            exp: now - 300,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn ownership_and_roles() {
        let customer = AuthUser {
            user_id: 3,
            role: Role::Customer,
        };
        let admin = AuthUser {
            user_id: 1,
            role: Role::Admin,
        };

        assert!(customer.owns(3));
        assert!(!customer.owns(4));
        assert!(admin.owns(4));

        assert!(customer.ensure_role(&[Role::Vet]).is_err());
        assert!(customer.ensure_role(&[Role::Vet, Role::Customer]).is_ok());
        assert!(admin.ensure_role(&[Role::ServiceProvider]).is_ok());
        assert!(customer.ensure_admin().is_err());
    }
}
