/// Health and database probes
///
/// ```text
/// GET /health    always 200, reports database status
/// GET /test-db   200 when the database answers, 503 otherwise
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use securewrap_shared::db::pool::{get_pool_stats, health_check as db_health_check, PoolStats};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,
}

/// Database probe response
#[derive(Debug, Serialize)]
pub struct TestDbResponse {
    pub message: String,
    pub server_time: DateTime<Utc>,
    pub pool: PoolStats,
}

/// Reports service health, degrading rather than failing when the database
/// is down
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = db_health_check(&state.db).await.is_ok();

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
    })
}

/// Round-trips a query to the database
pub async fn test_db(State(state): State<AppState>) -> ApiResult<Json<TestDbResponse>> {
    let server_time: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()")
        .fetch_one(&state.db)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Database probe failed");
            ApiError::ServiceUnavailable("Database connection failed".to_string())
        })?;

    Ok(Json(TestDbResponse {
        message: "Database connected".to_string(),
        server_time,
        pool: get_pool_stats(&state.db),
    }))
}
