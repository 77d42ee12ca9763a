/// User model and database operations
///
/// The `users` table is the credential store: one row per account holding the
/// display name, login email, Argon2id password hash, account type, and the
/// email verification state.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_type AS ENUM ('admin', 'user');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     user_type user_type NOT NULL DEFAULT 'user',
///     verified BOOLEAN NOT NULL DEFAULT FALSE,
///     verification_code_hash CHAR(64),
///     verification_expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
///
/// CREATE UNIQUE INDEX users_email_key ON users (LOWER(email));
/// ```
///
/// # Lifecycle
///
/// A row is inserted at signup with `verified = false` and a pending code.
/// A matching code (or a signed verification link) flips `verified` to true
/// and clears the pending code. Nothing else mutates the row apart from
/// `last_login_at`.
///
/// # Example
///
/// ```no_run
/// use securewrap_shared::models::user::{CreateUser, User, UserType};
/// use chrono::{Duration, Utc};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         name: "Ada".to_string(),
///         email: "ada@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         user_type: UserType::User,
///         verification_code_hash: "9f86d0...".to_string(),
///         verification_expires_at: Utc::now() + Duration::hours(1),
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "ADA@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Columns selected for every `User` query
const USER_COLUMNS: &str = "id, name, email, password_hash, user_type, verified, \
     verification_code_hash, verification_expires_at, created_at, updated_at, last_login_at";

/// Account type chosen at signup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Can list all users and all audit entries
    Admin,

    /// Regular account
    User,
}

impl UserType {
    /// Gets user type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::User => "user",
        }
    }

    /// Whether this account may use the admin listing endpoints
    pub fn is_admin(&self) -> bool {
        matches!(self, UserType::Admin)
    }
}

impl Default for UserType {
    fn default() -> Self {
        UserType::User
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserType::Admin),
            "user" => Ok(UserType::User),
            other => Err(format!("Unknown user type: {}", other)),
        }
    }
}

/// User model representing an account row
///
/// Deliberately not `Serialize`: it carries the password hash and the pending
/// verification code hash. Use [`UserProfile`] for anything leaving the
/// service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login email, stored lowercased
    pub email: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    /// Account type
    pub user_type: UserType,

    /// Whether the email address has been verified
    pub verified: bool,

    /// SHA-256 hex digest of the pending verification code
    pub verification_code_hash: Option<String>,

    /// When the pending verification code stops being accepted
    pub verification_expires_at: Option<DateTime<Utc>>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the row was last updated
    pub updated_at: DateTime<Utc>,

    /// When the user last signed in
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Display name
    pub name: String,

    /// Email address (lowercased before insert)
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    /// Account type
    pub user_type: UserType,

    /// Hash of the verification code sent at signup
    pub verification_code_hash: String,

    /// Expiry of that code
    pub verification_expires_at: DateTime<Utc>,
}

/// Public projection of a user, safe to return from the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            user_type: user.user_type,
            verified: user.verified,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile::from(&user)
    }
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Whether a verification code is pending and still accepted at `now`
    pub fn has_pending_code(&self, now: DateTime<Utc>) -> bool {
        match (&self.verification_code_hash, self.verification_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }

    /// Creates a new, unverified user
    ///
    /// # Errors
    ///
    /// Returns a database error if the email is already registered (unique
    /// index `users_email_key`) or the connection fails.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, user_type,
                               verification_code_hash, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(data.name.trim())
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.user_type)
            .bind(data.verification_code_hash)
            .bind(data.verification_expires_at)
            .fetch_one(pool)
            .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Lists every user, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");

        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    /// Replaces the pending verification code of an unverified user
    ///
    /// # Returns
    ///
    /// False if the user doesn't exist or is already verified
    pub async fn set_verification_code(
        pool: &PgPool,
        id: Uuid,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_code_hash = $2,
                verification_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND verified = FALSE
            "#,
        )
        .bind(id)
        .bind(code_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a user as verified and clears the pending code
    ///
    /// # Returns
    ///
    /// True if this call flipped the flag, false if the user was already
    /// verified or doesn't exist
    pub async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE,
                verification_code_hash = NULL,
                verification_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND verified = FALSE
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a user
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_user(password_hash: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: password_hash.to_string(),
            user_type: UserType::User,
            verified: true,
            verification_code_hash: None,
            verification_expires_at: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_user_type_parse() {
        assert_eq!("admin".parse::<UserType>().unwrap(), UserType::Admin);
        assert_eq!(" User ".parse::<UserType>().unwrap(), UserType::User);
        assert!("root".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_serde() {
        assert_eq!(serde_json::to_string(&UserType::Admin).unwrap(), "\"admin\"");
        let parsed: UserType = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, UserType::User);
        assert!(UserType::Admin.is_admin());
        assert!(!UserType::default().is_admin());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_profile_omits_secrets() {
        let mut user = sample_user("$argon2id$v=19$secret");
        user.verification_code_hash = Some("deadbeef".to_string());

        let json = serde_json::to_string(&UserProfile::from(&user)).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("deadbeef"));
        assert!(json.contains("\"user_type\":\"user\""));
    }

    #[test]
    fn test_has_pending_code() {
        let now = Utc::now();
        let mut user = sample_user("hash");
        assert!(!user.has_pending_code(now));

        user.verification_code_hash = Some("abc".to_string());
        user.verification_expires_at = Some(now + Duration::minutes(5));
        assert!(user.has_pending_code(now));

        user.verification_expires_at = Some(now - Duration::seconds(1));
        assert!(!user.has_pending_code(now));
    }
}
