//! Authentication and authorization utilities
//!
//! Provides:
//! - The `Actor` performing every core operation, passed explicitly
//! - Role capability checks (`has_any_role` / `require_any_role`)
//! - JWT validation for the bearer tokens issued by the identity provider

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Role held by an authenticated identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Author,
    Reviewer,
    Editor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Author, Role::Reviewer, Role::Editor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Reviewer => "reviewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "author" => Ok(Role::Author),
            "reviewer" => Ok(Role::Reviewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::Validation {
                message: format!("Unknown role: {}", other),
                field: Some("role".to_string()),
            }),
        }
    }
}

/// Roles allowed to drive editorial decisions
pub const EDITORIAL_ROLES: &[Role] = &[Role::Editor, Role::Admin];

/// Roles a user must hold to be assigned a review
pub const REVIEWING_ROLES: &[Role] = &[Role::Reviewer, Role::Editor, Role::Admin];

/// The authenticated identity performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Check if the actor holds any of the given roles
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }

    /// Require one of the given roles, returning Forbidden if absent
    pub fn require_any_role(&self, allowed: &[Role], operation: &str) -> Result<()> {
        if self.has_any_role(allowed) {
            Ok(())
        } else {
            let allowed = allowed
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Err(AppError::forbidden(format!(
                "role '{}' may not {}; requires one of: {}",
                self.role, operation, allowed
            )))
        }
    }

    /// Require the actor to be the given identity
    pub fn require_identity(&self, owner: Uuid, operation: &str) -> Result<()> {
        if self.id == owner {
            Ok(())
        } else {
            Err(AppError::not_owner(format!(
                "only the owning user may {}",
                operation
            )))
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Role granted by the identity provider
    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token for an actor
    pub fn generate_token(&self, actor: &Actor) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: actor.id.to_string(),
            role: actor.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate a JWT token and turn its claims into an actor
    pub fn validate_token(&self, token: &str) -> Result<Actor> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid bearer token".to_string(),
                },
            })?;

        let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Token subject is not a user id".to_string(),
        })?;

        Ok(Actor::new(id, claims.role))
    }
}

/// Extract the bearer token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for Actor
impl<S> FromRequestParts<S> for Actor
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must carry a bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        jwt.validate_token(token)
    }
}
