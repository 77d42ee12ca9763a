/// Route guards
///
/// [`require_session`] validates the bearer session token and inserts an
/// [`AuthContext`] into the request. [`require_admin`] must be layered inside
/// it: it reads that context and checks the account type in the database, so
/// a demoted or deleted account loses access immediately.
///
/// Rejections happen before the handler runs.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use securewrap_shared::{auth::middleware::{authenticate_request, AuthContext}, models::user::User};

/// Rejects requests without a valid session token
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let auth = authenticate_request(req.headers(), state.jwt_secret()).map_err(|e| {
        tracing::debug!(path = %req.uri().path(), reason = ?e, "Session rejected");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Rejects sessions whose account is not an admin
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    if !user.user_type.is_admin() {
        tracing::warn!(user_id = %auth.user_id, path = %req.uri().path(), "Admin route denied");
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}
