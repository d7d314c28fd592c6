use std::fmt;

use async_trait::async_trait;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "studio@atelier.local";

/// A rendered message, ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug)]
pub enum MailError {
    /// The recipient or sender address does not have a valid shape.
    Address(String),
    /// The MIME message could not be assembled.
    Build(String),
    /// SMTP-level failure (connection, authentication, delivery).
    Transport(String),
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailError::Address(e) => write!(f, "invalid email address: {e}"),
            MailError::Build(e) => write!(f, "could not build email: {e}"),
            MailError::Transport(e) => write!(f, "email transport error: {e}"),
        }
    }
}

impl std::error::Error for MailError {}

/// Parse an address with the standard shape check used before any dispatch.
pub fn parse_address(raw: &str) -> Result<lettre::Address, MailError> {
    raw.trim()
        .parse::<lettre::Address>()
        .map_err(|e| MailError::Address(format!("{raw:?}: {e}")))
}

/// Delivery backend. The engine only ever talks to this trait so tests can
/// observe outgoing mail without a relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// SMTP relay configuration, loaded from the environment.
///
/// | Variable        | Required | Default                |
/// |-----------------|----------|------------------------|
/// | `SMTP_HOST`     | yes      | —                      |
/// | `SMTP_PORT`     | no       | `587`                  |
/// | `SMTP_FROM`     | no       | `studio@atelier.local` |
/// | `SMTP_USER`     | no       | —                      |
/// | `SMTP_PASSWORD` | no       | —                      |
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    /// Returns `None` when `SMTP_HOST` is unset, signalling that delivery is
    /// not configured.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            user: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

/// Sends mail through an SMTP relay over STARTTLS.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        use lettre::message::header::ContentType;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let from = parse_address(&self.config.from_address)?;
        let to = parse_address(&email.to)?;

        let message = Message::builder()
            .from(from.into())
            .to(to.into())
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(self.config.port);

        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let transport = builder.build();
        transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Logs and drops outgoing mail. Used when no relay is configured.
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "email delivery not configured, dropping message"
        );
        Ok(())
    }
}

/// Captures outgoing mail and optionally fails, for engine tests.
#[cfg(test)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<Email>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Transport("simulated relay outage".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_accepts_plain_addresses() {
        assert!(parse_address("jane@example.com").is_ok());
        assert!(parse_address("  jane@example.com  ").is_ok());
    }

    #[test]
    fn parse_address_rejects_malformed_input() {
        assert!(parse_address("not-an-email").is_err());
        assert!(parse_address("jane@").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn smtp_config_absent_without_host() {
        // SAFETY: test-only env mutation, no concurrent readers of this var.
        unsafe { std::env::remove_var("SMTP_HOST") };
        assert!(SmtpConfig::from_env().is_none());
    }

    #[tokio::test]
    async fn recording_mailer_captures_and_fails() {
        let mailer = RecordingMailer::new();
        let email = Email {
            to: "jane@example.com".into(),
            subject: "hello".into(),
            body: "world".into(),
        };
        mailer.send(&email).await.unwrap();
        assert_eq!(mailer.sent_count(), 1);

        mailer.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(mailer.send(&email).await.is_err());
        assert_eq!(mailer.sent_count(), 1);
    }
}
