/// Audit log listing (admin only)
///
/// ```text
/// GET /userActivities
/// GET /userActivities?user_id=<uuid>
/// ```
///
/// Entries are returned newest first.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use securewrap_shared::models::audit_log::AuditLog;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// Restrict to one user's entries
    pub user_id: Option<Uuid>,
}

pub async fn user_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let entries = match query.user_id {
        Some(user_id) => AuditLog::list_by_user(&state.db, user_id).await?,
        None => AuditLog::list_all(&state.db).await?,
    };

    Ok(Json(entries))
}
