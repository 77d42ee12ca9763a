/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use securewrap_api::{app::{build_router, AppState}, config::Config};
/// use securewrap_shared::mail::LogMailer;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, Arc::new(LogMailer));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8089").await?;
/// axum::serve(listener, build_router(state)).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{guard, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use securewrap_shared::{
    auth::{attempts::AttemptLimiter, session::SessionIssuer},
    captcha::RecaptchaVerifier,
    mail::Mailer,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into each handler via Axum's `State` extractor; every field is a
/// handle, so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Session token minting and validation
    pub sessions: SessionIssuer,

    /// Verification email delivery
    pub mailer: Arc<dyn Mailer>,

    /// reCAPTCHA client, absent when no secret is configured
    pub captcha: Option<RecaptchaVerifier>,

    /// Failed sign-in and verification attempts
    pub attempts: Arc<AttemptLimiter>,
}

impl AppState {
    /// Creates state without a reCAPTCHA client
    pub fn new(db: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let sessions = SessionIssuer::new(config.jwt.secret.clone(), config.session_ttl());
        let attempts = Arc::new(AttemptLimiter::new(
            config.limits.max_failures,
            config.attempt_window(),
        ));

        Self {
            db,
            config: Arc::new(config),
            sessions,
            mailer,
            captcha: None,
            attempts,
        }
    }

    /// Enables `/verify-recaptcha`
    pub fn with_captcha(mut self, verifier: RecaptchaVerifier) -> Self {
        self.captcha = Some(verifier);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /
/// ├── GET  /health, /test-db              public
/// ├── POST /signup, /verify, /resend-verification, /signin, /verify-recaptcha
/// │                                       public
/// ├── POST /logout, GET /users, /getUserType
/// │                                       session
/// └── GET  /viewUsers, /userActivities    session + admin
/// ```
///
/// Layers, outermost first: security headers, CORS, tracing, then the
/// per-group guards.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/test-db", get(routes::health::test_db))
        .route("/signup", post(routes::auth::signup))
        .route("/verify", post(routes::auth::verify))
        .route("/resend-verification", post(routes::auth::resend_verification))
        .route("/signin", post(routes::auth::signin))
        .route("/verify-recaptcha", post(routes::recaptcha::verify_recaptcha));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/users", get(routes::users::current_user))
        .route("/getUserType", get(routes::users::user_type))
        .route_layer(from_fn_with_state(state.clone(), guard::require_session));

    // Admin check runs after the session check
    let admin_routes = Router::new()
        .route("/viewUsers", get(routes::users::view_users))
        .route("/userActivities", get(routes::activities::user_activities))
        .route_layer(from_fn_with_state(state.clone(), guard::require_admin))
        .route_layer(from_fn_with_state(state.clone(), guard::require_session));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.api.cors_origins))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    if origins.iter().any(|origin| origin == "*") {
        // Bearer tokens, not cookies, so no credentials mode
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(origins)
}
