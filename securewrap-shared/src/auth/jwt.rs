/// JWT generation and validation
///
/// Two kinds of signed tokens are issued, both HS256 with the service secret:
///
/// - **Session tokens** prove a prior successful sign-in. They carry the user
///   id (`sub`) and display name and live 2 hours by default.
/// - **Email verification tokens** are embedded in the link of the signup
///   email. They carry the email address and live 1 hour by default.
///
/// Every token records its [`TokenType`]; validators refuse a token of the
/// wrong type so a verification link can never be replayed as a session.
///
/// # Example
///
/// ```
/// use securewrap_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "an-example-secret-that-is-32-bytes!";
/// let user_id = Uuid::new_v4();
///
/// let token = create_token(&Claims::new(user_id, "Ada".to_string()), secret)?;
/// let claims = validate_token(&token, secret)?;
/// assert_eq!(claims.sub, user_id);
/// assert_eq!(claims.name, "Ada");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim written into and required on every token
pub const ISSUER: &str = "securewrap";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid token format
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },

    /// Token is valid but of a different kind than required
    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Session token (2 hours)
    Session,

    /// Email verification token (1 hour)
    EmailVerification,
}

impl TokenType {
    /// Gets default expiration duration for token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Session => Duration::hours(2),
            TokenType::EmailVerification => Duration::hours(1),
        }
    }

    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Session => "session",
            TokenType::EmailVerification => "email_verification",
        }
    }
}

/// Session token claims
///
/// - `sub`: user id
/// - `name`: display name at sign-in time
/// - `iss`, `iat`, `nbf`, `exp`: standard claims
/// - `token_type`: always [`TokenType::Session`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Display name
    pub name: String,

    /// Issuer - Always "securewrap"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token type
    pub token_type: TokenType,
}

impl Claims {
    /// Creates session claims with the default 2 hour lifetime
    pub fn new(user_id: Uuid, name: String) -> Self {
        Self::with_expiration(user_id, name, TokenType::Session.default_expiration())
    }

    /// Creates session claims with a custom lifetime
    ///
    /// A negative duration produces claims that are already expired, which is
    /// how the tests exercise expiry.
    pub fn with_expiration(user_id: Uuid, name: String, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            name,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type: TokenType::Session,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Email verification token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaims {
    /// Email address being verified
    pub email: String,

    /// Issuer - Always "securewrap"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token type
    pub token_type: TokenType,
}

impl VerificationClaims {
    /// Creates verification claims with the default 1 hour lifetime
    pub fn new(email: String) -> Self {
        Self::with_expiration(email, TokenType::EmailVerification.default_expiration())
    }

    /// Creates verification claims with a custom lifetime
    pub fn with_expiration(email: String, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            email,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type: TokenType::EmailVerification,
        }
    }
}

/// Signs any claims set with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token<C: Serialize>(claims: &C, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Decodes and verifies signature, issuer, `exp` and `nbf`
///
/// No clock leeway is granted: a token is rejected as soon as its lifetime
/// has elapsed.
fn decode_claims<C: DeserializeOwned>(token: &str, secret: &str) -> Result<C, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<C>(token, &key, &validation).map_err(|e| {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: ISSUER.to_string(),
            },
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                JwtError::InvalidFormat(e.to_string())
            }
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        }
    })?;

    Ok(token_data.claims)
}

fn ensure_type(actual: TokenType, expected: TokenType) -> Result<(), JwtError> {
    if actual != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
            actual: actual.as_str(),
        });
    }
    Ok(())
}

/// Validates a session token and extracts its claims
///
/// # Errors
///
/// - `JwtError::Expired` once the lifetime has elapsed
/// - `JwtError::InvalidIssuer` for tokens minted by someone else
/// - `JwtError::WrongTokenType` for non-session tokens
/// - `JwtError::InvalidFormat` / `JwtError::ValidationError` otherwise
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims: Claims = decode_claims(token, secret)?;
    ensure_type(claims.token_type, TokenType::Session)?;
    Ok(claims)
}

/// Creates an email verification token for `email` with the given lifetime
pub fn create_verification_token(
    email: &str,
    secret: &str,
    expires_in: Duration,
) -> Result<String, JwtError> {
    let claims = VerificationClaims::with_expiration(email.to_string(), expires_in);
    create_token(&claims, secret)
}

/// Validates an email verification token and extracts its claims
pub fn validate_verification_token(
    token: &str,
    secret: &str,
) -> Result<VerificationClaims, JwtError> {
    let claims: VerificationClaims = decode_claims(token, secret)?;
    ensure_type(claims.token_type, TokenType::EmailVerification)?;
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Session.default_expiration(), Duration::hours(2));
        assert_eq!(
            TokenType::EmailVerification.default_expiration(),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "Grace".to_string());

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.name, "Grace");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.token_type, TokenType::Session);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_claims_with_custom_expiration() {
        let claims = Claims::with_expiration(Uuid::new_v4(), "x".to_string(), Duration::hours(1));

        let time_left = claims.time_until_expiration().unwrap();
        assert!(time_left.num_seconds() > 3500);
        assert!(time_left.num_seconds() <= 3600);
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, "Linus".to_string()), SECRET)
            .expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.name, "Linus");
        assert_eq!(validated.token_type, TokenType::Session);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4(), "a".to_string()), SECRET).unwrap();
        assert!(validate_token(&token, "some-other-secret-of-enough-length").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            "late".to_string(),
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_just_expired_token_without_leeway() {
        let claims =
            Claims::with_expiration(Uuid::new_v4(), "late".to_string(), Duration::seconds(-5));
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_garbage_token() {
        assert!(validate_token("not-a-jwt", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), "x".to_string());
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::InvalidIssuer { .. })
        ));
    }

    #[test]
    fn test_verification_token_roundtrip() {
        let token =
            create_verification_token("ada@example.com", SECRET, Duration::hours(1)).unwrap();
        let claims = validate_verification_token(&token, SECRET).unwrap();

        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.token_type, TokenType::EmailVerification);
    }

    #[test]
    fn test_expired_verification_token() {
        let token =
            create_verification_token("ada@example.com", SECRET, Duration::seconds(-10)).unwrap();
        assert!(matches!(
            validate_verification_token(&token, SECRET),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_verification_token_is_not_a_session() {
        let token =
            create_verification_token("ada@example.com", SECRET, Duration::hours(1)).unwrap();
        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_session_token_is_not_a_verification_token() {
        let token = create_token(&Claims::new(Uuid::new_v4(), "a".to_string()), SECRET).unwrap();
        assert!(validate_verification_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_wrong_token_type_detected() {
        let mut claims = Claims::new(Uuid::new_v4(), "a".to_string());
        claims.token_type = TokenType::EmailVerification;
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::WrongTokenType { expected: "session", .. })
        ));
    }
}
