//! Verification email composition and delivery.
//!
//! Signup and resend hand a [`VerificationEmail`] to a [`Mailer`]. Delivery is
//! an external concern, so the service only depends on the trait:
//!
//! - [`LogMailer`] logs the message instead of sending it. It is the default
//!   when no SMTP relay is configured and is what local development uses.
//! - [`SmtpMailer`] submits through an SMTP relay via `lettre`, upgrading
//!   with STARTTLS or speaking TLS from the first byte ([`SmtpTls`]).
//!
//! Callers treat delivery failures as non-fatal: the account already exists
//! and the user can ask for a new code.

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Socket timeout for relay conversations
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Sender or recipient address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Message could not be built
    #[error("Failed to build message: {0}")]
    Build(String),

    /// Relay rejected or failed the submission
    #[error("Failed to deliver message: {0}")]
    Transport(String),
}

/// Content of a verification email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEmail {
    /// Recipient address
    pub to: String,

    /// Recipient display name
    pub name: String,

    /// Six-digit code to type into the verification form
    pub code: String,

    /// One-click link carrying a signed verification token
    pub link: String,

    /// Minutes until the code and link expire
    pub expires_in_minutes: i64,
}

impl VerificationEmail {
    pub fn subject(&self) -> &'static str {
        "Please verify your email address"
    }

    /// Plain-text body
    pub fn text_body(&self) -> String {
        format!(
            "Hi {name},\n\n\
             Thank you for registering. Your verification code is: {code}\n\n\
             You can also verify by opening this link:\n{link}\n\n\
             The code and link expire in {minutes} minutes.\n\
             If you did not register, please ignore this email.\n",
            name = self.name,
            code = self.code,
            link = self.link,
            minutes = self.expires_in_minutes,
        )
    }

    /// HTML body, with user-supplied text escaped
    pub fn html_body(&self) -> String {
        format!(
            "<p>Hi {name},</p>\
             <p>Thank you for registering. Your verification code is:</p>\
             <p style=\"font-size:24px;letter-spacing:4px\"><strong>{code}</strong></p>\
             <p>Or verify by clicking the link below:</p>\
             <p><a href=\"{link}\">Verify Email</a></p>\
             <p>The code and link expire in {minutes} minutes.</p>\
             <p>If you did not register, please ignore this email.</p>",
            name = escape_html(&self.name),
            code = escape_html(&self.code),
            link = escape_html(&self.link),
            minutes = self.expires_in_minutes,
        )
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Delivery seam for verification emails
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers `email` or reports why it could not be delivered
    async fn send_verification(&self, email: &VerificationEmail) -> Result<(), MailError>;
}

/// Development mailer that logs instead of sending
///
/// The code is logged at debug level only.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &VerificationEmail) -> Result<(), MailError> {
        info!(to = %email.to, subject = email.subject(), "Verification email (log only)");
        debug!(to = %email.to, code = %email.code, link = %email.link, "Verification email contents");
        Ok(())
    }
}

/// How the relay connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain greeting, then `STARTTLS` before authenticating (port 587)
    StartTls,

    /// TLS from the first byte, also called SMTPS (port 465)
    Wrapper,
}

impl SmtpTls {
    /// Conventional mode for `port`
    pub fn for_port(port: u16) -> Self {
        if port == 465 {
            SmtpTls::Wrapper
        } else {
            SmtpTls::StartTls
        }
    }
}

impl FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "wrapper" | "tls" | "smtps" => Ok(SmtpTls::Wrapper),
            other => Err(format!("unknown SMTP TLS mode '{}' (starttls or wrapper)", other)),
        }
    }
}

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: String,
    pub password: String,
    /// `From:` header, e.g. `SecureWrap <no-reply@example.com>`
    pub from: String,
}

/// Mailer that submits through an SMTP relay
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from).finish()
    }
}

impl SmtpMailer {
    /// Builds a mailer from relay settings
    ///
    /// No connection is opened until the first message is sent.
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("{}: {}", settings.from, e)))?;

        let builder = match settings.tls {
            SmtpTls::StartTls => SmtpTransport::starttls_relay(&settings.host),
            SmtpTls::Wrapper => SmtpTransport::relay(&settings.host),
        }
        .map_err(|e| MailError::Transport(e.to_string()))?;

        let transport = builder
            .port(settings.port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &VerificationEmail) -> Result<Message, MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("{}: {}", email.to, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject())
            .multipart(MultiPart::alternative_plain_html(
                email.text_body(),
                email.html_body(),
            ))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, email: &VerificationEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        let transport = self.transport.clone();

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Transport(format!("Delivery task failed: {}", e)))?
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!(to = %email.to, "Verification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VerificationEmail {
        VerificationEmail {
            to: "ada@example.com".to_string(),
            name: "Ada <script>".to_string(),
            code: "123456".to_string(),
            link: "https://app.example.com/verify-email?token=abc&x=1".to_string(),
            expires_in_minutes: 60,
        }
    }

    #[test]
    fn test_bodies_contain_code_and_link() {
        let email = sample();
        let text = email.text_body();
        let html = email.html_body();

        assert!(text.contains("123456"));
        assert!(text.contains("https://app.example.com/verify-email?token=abc&x=1"));
        assert!(text.contains("60 minutes"));
        assert!(html.contains("<strong>123456</strong>"));
        assert!(html.contains("token=abc&amp;x=1"));
    }

    #[test]
    fn test_html_escapes_name() {
        let html = sample().html_body();
        assert!(html.contains("Ada &lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts() {
        assert!(LogMailer.send_verification(&sample()).await.is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            tls: SmtpTls::StartTls,
            username: "user".to_string(),
            password: "pass".to_string(),
            from: "not an address".to_string(),
        };

        assert!(matches!(
            SmtpMailer::new(&settings),
            Err(MailError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_smtp_message_builds() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            tls: SmtpTls::StartTls,
            username: "user".to_string(),
            password: "pass".to_string(),
            from: "SecureWrap <no-reply@example.com>".to_string(),
        };
        let mailer = SmtpMailer::new(&settings).unwrap();

        let mut email = sample();
        assert!(mailer.build_message(&email).is_ok());

        email.to = "nope".to_string();
        assert!(matches!(
            mailer.build_message(&email),
            Err(MailError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_tls_mode_parsing() {
        assert_eq!(SmtpTls::for_port(587), SmtpTls::StartTls);
        assert_eq!(SmtpTls::for_port(25), SmtpTls::StartTls);
        assert_eq!(SmtpTls::for_port(465), SmtpTls::Wrapper);
        assert_eq!("STARTTLS".parse::<SmtpTls>(), Ok(SmtpTls::StartTls));
        assert_eq!("smtps".parse::<SmtpTls>(), Ok(SmtpTls::Wrapper));
        assert!("none".parse::<SmtpTls>().is_err());
    }

    /// Accepts one connection, sends an SMTP greeting, and returns the first
    /// bytes the client writes
    fn greeting_relay() -> (u16, std::thread::JoinHandle<Vec<u8>>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            stream.write_all(b"220 relay.test ESMTP\r\n").unwrap();

            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).unwrap_or(0);
            let _ = stream.write_all(b"421 closing\r\n");
            buf[..n].to_vec()
        });

        (port, handle)
    }

    fn local_settings(port: u16, tls: SmtpTls) -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".to_string(),
            port,
            tls,
            username: "user".to_string(),
            password: "pass".to_string(),
            from: "SecureWrap <no-reply@example.com>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_starttls_waits_for_greeting() {
        let (port, relay) = greeting_relay();
        let mailer = SmtpMailer::new(&local_settings(port, SmtpTls::StartTls)).unwrap();

        // The relay hangs up after EHLO, so delivery itself fails
        let result = mailer.send_verification(&sample()).await;
        assert!(matches!(result, Err(MailError::Transport(_))));

        let first = relay.join().unwrap();
        assert!(
            first.starts_with(b"EHLO"),
            "client opened with {:02x?}",
            first
        );
    }

    #[tokio::test]
    async fn test_wrapper_opens_with_tls_handshake() {
        let (port, relay) = greeting_relay();
        let mailer = SmtpMailer::new(&local_settings(port, SmtpTls::Wrapper)).unwrap();

        assert!(mailer.send_verification(&sample()).await.is_err());

        // 0x16 is the TLS handshake record type
        let first = relay.join().unwrap();
        assert_eq!(first.first(), Some(&0x16));
    }
}
