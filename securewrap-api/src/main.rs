//! # SecureWrap API Server
//!
//! Serves account signup, email verification, sign-in, and the admin audit
//! endpoints over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... JWT_SECRET=... cargo run -p securewrap-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines and `RUST_LOG` to override the
//! default filter.

use anyhow::Context;
use securewrap_api::{
    app::{build_router, AppState},
    config::Config,
};
use securewrap_shared::{
    captcha::RecaptchaVerifier,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    mail::{LogMailer, Mailer, SmtpMailer},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "securewrap_api=debug,securewrap_shared=info,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp).context("Invalid SMTP configuration")?;
            tracing::info!(host = %smtp.host, port = smtp.port, tls = ?smtp.tls, "Sending verification email via SMTP");
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::warn!("SMTP_HOST not set; verification emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "SecureWrap API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::new(config.database.url.clone())
    })
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mailer = build_mailer(&config)?;
    let captcha = match &config.recaptcha.secret {
        Some(secret) => Some(RecaptchaVerifier::new(secret.clone())?),
        None => {
            tracing::info!("RECAPTCHA_SECRET not set; /verify-recaptcha is disabled");
            None
        }
    };

    let bind_address = config.bind_address();
    let mut state = AppState::new(pool.clone(), config, mailer);
    if let Some(verifier) = captcha {
        state = state.with_captcha(verifier);
    }

    // Drop lockout entries whose window has passed
    let attempts = state.attempts.clone();
    let purge_every = attempts.window().max(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            let removed = attempts.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Purged expired attempt entries");
            }
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");
    Ok(())
}
