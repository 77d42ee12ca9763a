/// Account lifecycle endpoints
///
/// - `POST /signup`: create an unverified account and send a verification email
/// - `POST /verify`: confirm the email with the emailed code or link token
/// - `POST /resend-verification`: issue a fresh code
/// - `POST /signin`: exchange email and password for a session token
/// - `POST /logout`: record the logout of the current session
///
/// Sign-in and code verification are attempt-limited per email. Field names
/// on the wire follow the web client (`userType`, `verificationToken`).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use securewrap_shared::{
    auth::{
        attempts::AttemptDecision,
        jwt,
        middleware::AuthContext,
        password,
        session::CredentialError,
        verification,
    },
    mail::VerificationEmail,
    models::{
        audit_log::{AuditAction, AuditLog},
        user::{normalize_email, CreateUser, User, UserType},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked for strength separately
    pub password: String,

    /// Must match `password` when sent
    #[serde(rename = "confirmPassword", default)]
    pub confirm_password: Option<String>,

    /// `user` (default) or `admin`
    #[serde(rename = "userType", default)]
    pub user_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// Verification request
///
/// Either `email` plus the six-digit `verificationToken`, or the signed
/// `token` from the emailed link.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(rename = "verificationToken", alias = "code", default)]
    pub verification_token: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SigninResponse {
    pub message: String,
    pub token: String,
    pub user_type: UserType,
}

/// Plain `{ "message": ... }` body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

const INVALID_CODE: &str = "Invalid or expired verification code";
const INVALID_LINK: &str = "Invalid or expired verification link";
const RESEND_ACCEPTED: &str =
    "If the account exists and is not yet verified, a new verification email has been sent";

/// Claims one attempt for `key`; the caller resets the key on success
fn acquire_attempt(state: &AppState, key: &str) -> ApiResult<()> {
    match state.attempts.try_acquire(key) {
        AttemptDecision::Allowed => Ok(()),
        AttemptDecision::Locked { retry_after } => {
            tracing::warn!(key, retry_after, "Attempt limit reached");
            Err(ApiError::RateLimitExceeded {
                retry_after,
                message: "Too many failed attempts, try again later".to_string(),
            })
        }
    }
}

/// Emails a fresh code and link; delivery failures are logged and reported
/// as `false`
async fn send_verification_email(state: &AppState, user: &User, code: String) -> bool {
    let ttl = state.config.verification_ttl();
    let link = match jwt::create_verification_token(&user.email, state.jwt_secret(), ttl) {
        Ok(token) => state.config.verification_link(&token),
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Failed to create verification link");
            return false;
        }
    };

    let email = VerificationEmail {
        to: user.email.clone(),
        name: user.name.clone(),
        code,
        link,
        expires_in_minutes: ttl.num_minutes(),
    };

    match state.mailer.send_verification(&email).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Verification email not delivered");
            false
        }
    }
}

/// Creates an unverified account
///
/// ```text
/// POST /signup
/// { "name": "Ada", "email": "ada@example.com", "password": "s3cret-pass",
///   "confirmPassword": "s3cret-pass", "userType": "user" }
///
/// 201 { "message": "...", "user_id": "uuid" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: validation failed
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(mut req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    req.name = req.name.trim().to_string();
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid_field("password", e))?;

    if req
        .confirm_password
        .as_deref()
        .is_some_and(|confirm| confirm != req.password)
    {
        return Err(ApiError::invalid_field("confirmPassword", "Passwords do not match"));
    }

    let user_type = match req.user_type.as_deref() {
        None => UserType::default(),
        Some(raw) => raw
            .parse::<UserType>()
            .map_err(|e| ApiError::invalid_field("userType", e))?,
    };
    if user_type.is_admin() && !state.config.api.allow_admin_signup {
        return Err(ApiError::invalid_field(
            "userType",
            "Admin accounts cannot be self-registered",
        ));
    }

    let password_hash = password::hash_password(&req.password)?;
    let (code, code_hash) = verification::generate_code();

    let user = User::create(
        &state.db,
        CreateUser {
            name: req.name,
            email: req.email,
            password_hash,
            user_type,
            verification_code_hash: code_hash,
            verification_expires_at: Utc::now() + state.config.verification_ttl(),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, user_type = %user.user_type, "User signed up");
    AuditLog::record_detached(&state.db, Some(user.id), AuditAction::SIGNUP);

    let message = if send_verification_email(&state, &user, code).await {
        "User registered. Please check your email for the verification code."
    } else {
        "User registered, but the verification email could not be sent. Request a new code."
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: message.to_string(),
            user_id: user.id,
        }),
    ))
}

/// Confirms an email address
///
/// ```text
/// POST /verify
/// { "email": "ada@example.com", "verificationToken": "123456" }
/// or
/// { "token": "<signed link token>" }
///
/// 200 { "message": "Email verified successfully" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: wrong, expired, or already used code, or a bad link
/// - `422 Unprocessable Entity`: neither form supplied
/// - `429 Too Many Requests`: too many wrong codes for this email
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(token) = req.token.as_deref().filter(|t| !t.trim().is_empty()) {
        return verify_link(&state, token.trim()).await;
    }

    let email = req
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::invalid_field("email", "Email is required"))?;
    let code = req
        .verification_token
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            ApiError::invalid_field("verificationToken", "Verification code is required")
        })?;

    verify_code(&state, &email, code).await
}

async fn verify_link(state: &AppState, token: &str) -> ApiResult<Json<MessageResponse>> {
    let claims = jwt::validate_verification_token(token, state.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, "Verification link rejected");
        ApiError::BadRequest(INVALID_LINK.to_string())
    })?;

    let user = User::find_by_email(&state.db, &claims.email)
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_LINK.to_string()))?;

    complete_verification(state, &user).await
}

async fn verify_code(state: &AppState, email: &str, code: &str) -> ApiResult<Json<MessageResponse>> {
    let key = format!("verify:{}", email);
    acquire_attempt(state, &key)?;

    // Unknown, already verified, and wrong-code cases answer alike
    let user = User::find_by_email(&state.db, email).await?.filter(|user| {
        !user.verified
            && verification::is_valid_code_format(code)
            && user.has_pending_code(Utc::now())
            && user
                .verification_code_hash
                .as_deref()
                .is_some_and(|hash| verification::verify_code(code, hash))
    });

    match user {
        Some(user) => {
            state.attempts.reset(&key);
            complete_verification(state, &user).await
        }
        None => {
            tracing::info!("Verification code rejected");
            Err(ApiError::BadRequest(INVALID_CODE.to_string()))
        }
    }
}

async fn complete_verification(state: &AppState, user: &User) -> ApiResult<Json<MessageResponse>> {
    if !User::mark_verified(&state.db, user.id).await? {
        return Ok(MessageResponse::new("Email already verified"));
    }

    tracing::info!(user_id = %user.id, "Email verified");
    AuditLog::record_detached(&state.db, Some(user.id), AuditAction::VERIFY);
    Ok(MessageResponse::new("Email verified successfully"))
}

/// Issues a new verification code
///
/// Always answers 202 so the response does not reveal whether the email is
/// registered.
///
/// ```text
/// POST /resend-verification
/// { "email": "ada@example.com" }
/// ```
pub async fn resend_verification(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResendRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    req.validate()?;

    if let Some(user) = User::find_by_email(&state.db, &req.email).await? {
        if !user.verified {
            let (code, code_hash) = verification::generate_code();
            let expires_at = Utc::now() + state.config.verification_ttl();

            if User::set_verification_code(&state.db, user.id, &code_hash, expires_at).await? {
                send_verification_email(&state, &user, code).await;
                AuditLog::record_detached(
                    &state.db,
                    Some(user.id),
                    AuditAction::RESEND_VERIFICATION,
                );
            }
        }
    }

    Ok((StatusCode::ACCEPTED, MessageResponse::new(RESEND_ACCEPTED)))
}

/// Exchanges credentials for a session token
///
/// ```text
/// POST /signin
/// { "email": "ada@example.com", "password": "s3cret-pass" }
///
/// 200 { "message": "Sign-in successful", "token": "eyJ...", "user_type": "user" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email or wrong password (indistinguishable)
/// - `403 Forbidden`: correct password but email not verified
/// - `429 Too Many Requests`: too many failures for this email
pub async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> ApiResult<Json<SigninResponse>> {
    req.validate()?;

    let key = format!("signin:{}", normalize_email(&req.email));
    acquire_attempt(&state, &key)?;

    let found = User::find_by_email(&state.db, &req.email).await?;

    let user = match state.sessions.authenticate(found.as_ref(), &req.password) {
        Ok(user) => user,
        Err(CredentialError::InvalidCredentials) => {
            let user_id = found.as_ref().map(|u| u.id);
            tracing::info!(?user_id, "Sign-in rejected");
            AuditLog::record_detached(&state.db, user_id, AuditAction::SIGNIN_FAILED);
            return Err(CredentialError::InvalidCredentials.into());
        }
        Err(e) => return Err(e.into()),
    };

    state.attempts.reset(&key);

    if !user.verified {
        return Err(ApiError::Forbidden(
            "Please verify your email before signing in".to_string(),
        ));
    }

    let token = state.sessions.issue(user)?;
    User::update_last_login(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, "User signed in");
    AuditLog::record_detached(&state.db, Some(user.id), AuditAction::SIGNIN);

    Ok(Json(SigninResponse {
        message: "Sign-in successful".to_string(),
        token,
        user_type: user.user_type,
    }))
}

/// Records a logout
///
/// Sessions are stateless; the client discards its token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<MessageResponse> {
    tracing::info!(user_id = %auth.user_id, "User logged out");
    AuditLog::record_detached(&state.db, Some(auth.user_id), AuditAction::LOGOUT);
    MessageResponse::new("Logged out successfully")
}
