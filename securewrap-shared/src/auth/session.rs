/// Session issuance
///
/// Glues password verification to token minting. [`SessionIssuer::authenticate`]
/// is the only path that leads to [`SessionIssuer::issue`] in the sign-in
/// handler, and every failure it reports is the same opaque
/// `InvalidCredentials`, whether the email is unknown or the password wrong.

use chrono::Duration;
use uuid::Uuid;

use super::jwt::{self, Claims, JwtError};
use super::password::{self, PasswordError};
use crate::models::user::User;

/// Error type for credential checks
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The stored hash could not be processed
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Mints and validates session tokens
#[derive(Debug, Clone)]
pub struct SessionIssuer {
    secret: String,
    ttl: Duration,
}

impl SessionIssuer {
    /// Creates an issuer signing with `secret`, minting tokens valid for `ttl`
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Lifetime of the tokens this issuer mints
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Checks a submitted password against the looked-up account
    ///
    /// `user` is `None` when no account has the submitted email. A dummy
    /// comparison is not performed in that case; callers that care about
    /// enumeration by timing should rely on the attempt limiter.
    pub fn authenticate<'a>(
        &self,
        user: Option<&'a User>,
        password: &str,
    ) -> Result<&'a User, CredentialError> {
        let user = user.ok_or(CredentialError::InvalidCredentials)?;

        if password::verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }

    /// Mints a session token for `user`
    pub fn issue(&self, user: &User) -> Result<String, JwtError> {
        self.issue_for(user.id, &user.name)
    }

    /// Mints a session token for a user id and display name
    pub fn issue_for(&self, user_id: Uuid, name: &str) -> Result<String, JwtError> {
        let claims = Claims::with_expiration(user_id, name.to_string(), self.ttl);
        jwt::create_token(&claims, &self.secret)
    }

    /// Validates a session token minted by this issuer
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        jwt::validate_token(token, &self.secret)
    }
}
