/// Configuration management for the API server
///
/// Settings come from environment variables (a `.env` file is loaded first
/// when present) and are parsed into a typed [`Config`].
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8089`)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default `*`)
/// - `PRODUCTION`: enables HSTS (default false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `JWT_SECRET`: signing secret, at least 32 characters (required)
/// - `SESSION_TTL_MINUTES`: session lifetime (default 120)
/// - `VERIFICATION_TTL_MINUTES`: code and link lifetime (default 60)
///
///   Both lifetimes must lie in `1..=MAX_TTL_MINUTES` (30 days).
/// - `ALLOW_ADMIN_SIGNUP`: accept `userType: "admin"` at signup (default false)
/// - `FRONTEND_URL`: base of the verification link (default `http://localhost:3000`)
/// - `SMTP_HOST`, `SMTP_PORT`, `EMAIL_USER`, `EMAIL_PASS`, `EMAIL_FROM`:
///   SMTP relay; emails are only logged when `SMTP_HOST` is unset
/// - `SMTP_TLS`: `starttls` or `wrapper` (default `wrapper` on port 465,
///   `starttls` otherwise)
/// - `RECAPTCHA_SECRET`: enables `/verify-recaptcha`
/// - `SIGNIN_MAX_FAILURES` / `SIGNIN_WINDOW_MINUTES`: lockout policy (default 5 per 15)
///
/// # Example
///
/// ```no_run
/// use securewrap_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use securewrap_shared::mail::{SmtpSettings, SmtpTls};
use std::env;
use std::str::FromStr;

/// Shortest accepted `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Longest accepted session or verification lifetime (30 days)
pub const MAX_TTL_MINUTES: i64 = 30 * 24 * 60;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub recaptcha: RecaptchaConfig,
    pub limits: LimitsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,

    /// Whether signup may create admin accounts
    pub allow_admin_signup: bool,
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub session_ttl_minutes: i64,
    pub verification_ttl_minutes: i64,
}

/// Verification email settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Base URL of the web client; links point at `{frontend_url}/verify-email`
    pub frontend_url: String,

    /// SMTP relay, if configured
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Default)]
pub struct RecaptchaConfig {
    pub secret: Option<String>,
}

/// Failed-attempt lockout policy
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_failures: u32,
    pub window_minutes: u64,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not
    /// parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = get("EMAIL_USER")
                    .context("EMAIL_USER is required when SMTP_HOST is set")?;
                let password = get("EMAIL_PASS")
                    .context("EMAIL_PASS is required when SMTP_HOST is set")?;
                let port = parse_or(&get, "SMTP_PORT", 587)?;
                Some(SmtpSettings {
                    host,
                    port,
                    tls: parse_or(&get, "SMTP_TLS", SmtpTls::for_port(port))?,
                    from: get("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                    username,
                    password,
                })
            }
            None => None,
        };

        let config = Self {
            api: ApiConfig {
                host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "API_PORT", 8089)?,
                cors_origins,
                production: parse_or(&get, "PRODUCTION", false)?,
                allow_admin_signup: parse_or(&get, "ALLOW_ADMIN_SIGNUP", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                session_ttl_minutes: parse_or(&get, "SESSION_TTL_MINUTES", 120)?,
                verification_ttl_minutes: parse_or(&get, "VERIFICATION_TTL_MINUTES", 60)?,
            },
            mail: MailConfig {
                frontend_url: get("FRONTEND_URL")
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
                smtp,
            },
            recaptcha: RecaptchaConfig {
                secret: get("RECAPTCHA_SECRET"),
            },
            limits: LimitsConfig {
                max_failures: parse_or(&get, "SIGNIN_MAX_FAILURES", 5)?,
                window_minutes: parse_or(&get, "SIGNIN_WINDOW_MINUTES", 15)?,
            },
        };

        for (name, minutes) in [
            ("SESSION_TTL_MINUTES", config.jwt.session_ttl_minutes),
            ("VERIFICATION_TTL_MINUTES", config.jwt.verification_ttl_minutes),
        ] {
            if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
                anyhow::bail!(
                    "{} must be between 1 and {} minutes",
                    name,
                    MAX_TTL_MINUTES
                );
            }
        }

        Ok(config)
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt.session_ttl_minutes)
    }

    pub fn verification_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt.verification_ttl_minutes)
    }

    /// Lockout window as a std duration
    pub fn attempt_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.limits.window_minutes.saturating_mul(60))
    }

    /// Link embedded in verification emails
    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.mail.frontend_url.trim_end_matches('/'),
            token
        )
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}
