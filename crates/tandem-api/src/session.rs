//! Request identity carried in JWT bearer tokens.
//!
//! Tokens are issued by the platform's login flow (or `--issue-token` during
//! development) and name the requesting user and their organization.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tandem_domain::{OrganizationId, User, UserId};
use thiserror::Error;

/// Session management error
#[derive(Debug, Error)]
pub enum SessionError {
    /// JWT encoding failed
    #[error("Failed to encode JWT: {0}")]
    JwtEncode(#[from] jsonwebtoken::errors::Error),

    /// Token expired
    #[error("Session token expired")]
    TokenExpired,

    /// Invalid token
    #[error("Invalid session token")]
    InvalidToken,
}

/// JWT claims for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User identifier
    pub user_id: String,

    /// Organization the user belongs to
    pub organization_id: String,

    /// Token expiration timestamp (Unix epoch)
    pub exp: u64,

    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
}

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestUser {
    /// Requesting user
    pub user_id: UserId,

    /// Organization used to resolve candidate emails
    pub organization_id: OrganizationId,
}

/// Session manager handles JWT token generation and validation
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_secs: u64,
}

impl SessionManager {
    /// Create a new session manager with the given JWT secret and expiry
    pub fn new(jwt_secret: &str, token_expiry_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_expiry_secs,
        }
    }

    /// Generate a new session token for the given user
    pub fn generate_token(&self, user: &User) -> Result<String, SessionError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let claims = SessionClaims {
            user_id: user.id.to_string(),
            organization_id: user.organization_id.to_string(),
            exp: now + self.token_expiry_secs,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a session token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let validation = Validation::default();
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::TokenExpired,
                _ => SessionError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Validate a token and turn its claims into typed identifiers
    pub fn authenticate(&self, token: &str) -> Result<RequestUser, SessionError> {
        let claims = self.validate_token(token)?;

        let user_id =
            UserId::from_string(&claims.user_id).map_err(|_| SessionError::InvalidToken)?;
        let organization_id = OrganizationId::from_string(&claims.organization_id)
            .map_err(|_| SessionError::InvalidToken)?;

        Ok(RequestUser {
            user_id,
            organization_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::from_value(7),
            organization_id: OrganizationId::from_value(70),
            email: "seven@example.com".to_string(),
        }
    }

    #[test]
    fn test_generate_and_authenticate() {
        let manager = SessionManager::new("test-secret", 3600);
        let token = manager.generate_token(&user()).unwrap();

        let requester = manager.authenticate(&token).unwrap();
        assert_eq!(requester.user_id, UserId::from_value(7));
        assert_eq!(requester.organization_id, OrganizationId::from_value(70));
    }

    #[test]
    fn test_expired_token() {
        let manager = SessionManager::new("test-secret", 3600);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = SessionClaims {
            user_id: UserId::from_value(7).to_string(),
            organization_id: OrganizationId::from_value(70).to_string(),
            exp: now - 100, // Expired 100 seconds ago
            iat: now - 200,
        };

        let token = encode(&Header::default(), &claims, &manager.encoding_key).unwrap();

        let result = manager.validate_token(&token);
        assert!(matches!(result, Err(SessionError::TokenExpired)));
    }

    #[test]
    fn test_invalid_token() {
        let manager = SessionManager::new("test-secret", 3600);
        let result = manager.validate_token("invalid-token");
        assert!(matches!(result, Err(SessionError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let manager1 = SessionManager::new("secret1", 3600);
        let manager2 = SessionManager::new("secret2", 3600);

        let token = manager1.generate_token(&user()).unwrap();
        let result = manager2.authenticate(&token);
        assert!(matches!(result, Err(SessionError::InvalidToken)));
    }

    #[test]
    fn test_malformed_user_id_rejected() {
        let manager = SessionManager::new("test-secret", 3600);
        let claims = SessionClaims {
            user_id: "not-a-uuid".to_string(),
            organization_id: OrganizationId::from_value(70).to_string(),
            exp: u64::MAX / 2,
            iat: 0,
        };
        let token = encode(&Header::default(), &claims, &manager.encoding_key).unwrap();

        assert!(matches!(
            manager.authenticate(&token),
            Err(SessionError::InvalidToken)
        ));
    }
}
