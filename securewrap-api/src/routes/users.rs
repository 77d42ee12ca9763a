/// User endpoints
///
/// ```text
/// GET /users         session          current user's profile
/// GET /getUserType   session          { "user_type": "admin" | "user" }
/// GET /viewUsers     session + admin  every profile, newest first
/// ```
///
/// Only [`UserProfile`] leaves the service; hashes never do.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use securewrap_shared::{
    auth::middleware::AuthContext,
    models::user::{User, UserProfile, UserType},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserTypeResponse {
    pub user_type: UserType,
}

async fn load_current(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Returns the signed-in user's profile
pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let user = load_current(&state, &auth).await?;
    Ok(Json(user.into()))
}

/// Returns the signed-in user's account type
pub async fn user_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserTypeResponse>> {
    let user = load_current(&state, &auth).await?;
    Ok(Json(UserTypeResponse {
        user_type: user.user_type,
    }))
}

/// Lists every account (admin only)
pub async fn view_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserProfile>>> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}
