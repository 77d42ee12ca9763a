/// Credential primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and strength rules
/// - [`verification`]: six-digit email verification codes
/// - [`jwt`]: session and verification-link tokens
/// - [`session`]: password check plus session minting
/// - [`attempts`]: failed-attempt lockout
/// - [`middleware`]: Axum bearer-token guard
///
/// # Example
///
/// ```
/// use securewrap_shared::auth::jwt::{create_token, validate_token, Claims};
/// use securewrap_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse 1")?;
/// assert!(verify_password("correct horse 1", &hash)?);
///
/// let secret = "an-example-secret-that-is-32-bytes";
/// let token = create_token(&Claims::new(Uuid::new_v4(), "Ada".to_string()), secret)?;
/// assert_eq!(validate_token(&token, secret)?.name, "Ada");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```

pub mod attempts;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;
pub mod verification;
