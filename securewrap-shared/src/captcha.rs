//! reCAPTCHA token verification
//!
//! The sign-in form obtains a reCAPTCHA token in the browser and submits it
//! to the service, which forwards it to Google's `siteverify` endpoint with
//! the server-side secret. Only the boolean outcome is returned to clients.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Google's verification endpoint
pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Error type for captcha verification
#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    /// Empty token submitted
    #[error("Captcha token is required")]
    MissingToken,

    /// Upstream could not be reached or answered with garbage
    #[error("Captcha verification failed: {0}")]
    Upstream(String),
}

/// Raw `siteverify` response
#[derive(Debug, Clone, Deserialize)]
pub struct RecaptchaOutcome {
    pub success: bool,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub challenge_ts: Option<String>,

    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

/// Verifies reCAPTCHA tokens against the siteverify API
#[derive(Clone)]
pub struct RecaptchaVerifier {
    secret: String,
    verify_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for RecaptchaVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecaptchaVerifier")
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

impl RecaptchaVerifier {
    /// Creates a verifier for Google's endpoint
    pub fn new(secret: impl Into<String>) -> Result<Self, CaptchaError> {
        Self::with_url(secret, DEFAULT_VERIFY_URL)
    }

    /// Creates a verifier for a custom endpoint
    pub fn with_url(
        secret: impl Into<String>,
        verify_url: impl Into<String>,
    ) -> Result<Self, CaptchaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CaptchaError::Upstream(e.to_string()))?;

        Ok(Self {
            secret: secret.into(),
            verify_url: verify_url.into(),
            http,
        })
    }

    /// Submits `token` for verification
    ///
    /// A rejected token is `Ok` with `success == false`; `Err` means the
    /// answer could not be obtained at all.
    pub async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<RecaptchaOutcome, CaptchaError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CaptchaError::MissingToken);
        }

        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .http
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CaptchaError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "reCAPTCHA endpoint returned an error status");
            return Err(CaptchaError::Upstream(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let outcome: RecaptchaOutcome = response
            .json()
            .await
            .map_err(|e| CaptchaError::Upstream(e.to_string()))?;

        debug!(
            success = outcome.success,
            error_codes = ?outcome.error_codes,
            "reCAPTCHA verification completed"
        );
        Ok(outcome)
    }
}
