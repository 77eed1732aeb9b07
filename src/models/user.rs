//! User model and JWT claims
//!
//! Token issuance lives in an external identity service; this server only
//! decodes and checks claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;

/// User model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    /// Opaque credential; hashing and verification happen in the identity
    /// service, never here.
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, message = "Full name must not be empty"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Already-hashed credential from the identity service
    pub hashed_password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// User search query
#[derive(Debug, Deserialize, IntoParams)]
pub struct UserQuery {
    /// Search by name
    pub name: Option<String>,
    /// Search by email
    pub email: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token (used by operator tooling and tests; normal
    /// issuance happens in the identity service)
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Administrator privileges required".to_string(),
            ))
        }
    }

    /// Require the caller to be `user_id` themselves, or an admin
    pub fn require_self_or_admin(&self, user_id: i32) -> Result<(), AppError> {
        if self.is_admin || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Access restricted to the account owner".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(user_id: i32, is_admin: bool) -> UserClaims {
        UserClaims {
            sub: format!("user-{user_id}"),
            user_id,
            is_admin,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn admin_passes_all_checks() {
        let c = claims(1, true);
        assert!(c.require_admin().is_ok());
        assert!(c.require_self_or_admin(42).is_ok());
    }

    #[test]
    fn non_admin_is_self_scoped() {
        let c = claims(7, false);
        assert!(c.require_admin().is_err());
        assert!(c.require_self_or_admin(7).is_ok());
        assert!(c.require_self_or_admin(8).is_err());
    }
}
