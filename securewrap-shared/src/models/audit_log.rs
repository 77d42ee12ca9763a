/// Audit log model
///
/// An append-only record of what users did. Rows are inserted best-effort:
/// request handlers call [`AuditLog::record_detached`], which spawns the
/// insert and only logs a warning if it fails, so auditing can never fail or
/// slow down the request that triggered it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id BIGSERIAL PRIMARY KEY,
///     user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     action VARCHAR(100) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Actions written by the service
pub struct AuditAction;

impl AuditAction {
    pub const SIGNUP: &'static str = "signup";
    pub const VERIFY: &'static str = "verify";
    pub const RESEND_VERIFICATION: &'static str = "resend_verification";
    pub const SIGNIN: &'static str = "signin";
    pub const SIGNIN_FAILED: &'static str = "signin_failed";
    pub const LOGOUT: &'static str = "logout";
}

/// One audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    /// Monotonic entry ID
    pub id: i64,

    /// Acting user, if known
    pub user_id: Option<Uuid>,

    /// Free-text action name
    pub action: String,

    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// Inserts an audit entry and returns it
    pub async fn record(
        pool: &PgPool,
        user_id: Option<Uuid>,
        action: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (user_id, action)
            VALUES ($1, $2)
            RETURNING id, user_id, action, created_at
            "#,
        )
        .bind(user_id)
        .bind(action)
        .fetch_one(pool)
        .await
    }

    /// Fire-and-forget variant of [`AuditLog::record`]
    ///
    /// Must be called from within a tokio runtime.
    pub fn record_detached(pool: &PgPool, user_id: Option<Uuid>, action: &'static str) {
        let pool = pool.clone();
        tokio::spawn(async move {
            if let Err(e) = AuditLog::record(&pool, user_id, action).await {
                tracing::warn!(?user_id, action, error = %e, "Failed to write audit entry");
            }
        });
    }

    /// Lists all entries, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, created_at
            FROM audit_logs
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Lists one user's entries, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, created_at
            FROM audit_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_entry_serializes_null_user() {
        let entry = AuditLog {
            id: 7,
            user_id: None,
            action: AuditAction::SIGNIN_FAILED.to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json["user_id"].is_null());
        assert_eq!(json["action"], "signin_failed");
    }
}
