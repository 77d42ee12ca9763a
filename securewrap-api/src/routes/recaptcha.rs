/// reCAPTCHA verification endpoint
///
/// ```text
/// POST /verify-recaptcha
/// { "token": "<client token>" }
///
/// 200 { "success": true }
/// ```
///
/// Answers 503 when no `RECAPTCHA_SECRET` is configured.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RecaptchaRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecaptchaResponse {
    pub success: bool,
}

/// First hop of `X-Forwarded-For`, if any
fn client_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

pub async fn verify_recaptcha(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RecaptchaRequest>,
) -> ApiResult<Json<RecaptchaResponse>> {
    let verifier = state
        .captcha
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("reCAPTCHA is not configured".to_string()))?;

    let outcome = verifier.verify(&req.token, client_ip(&headers)).await?;

    Ok(Json(RecaptchaResponse {
        success: outcome.success,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.7"));
    }
}
