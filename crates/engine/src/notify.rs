//! Outbound notifications for triggered alerts

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },
}

/// Delivery channel for a single message. One attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
    fn name(&self) -> &str;
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub address: String,
    pub password: Option<String>,
    pub tls: SmtpTls,
}

impl SmtpConfig {
    /// `SMTP_SERVER`, `SMTP_PORT` (587), `EMAIL_ADDRESS`, `EMAIL_PASSWORD`,
    /// `SMTP_TLS` (starttls | tls | none). `None` unless server and sender
    /// address are both set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tls = match get("SMTP_TLS").as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("tls") => SmtpTls::Tls,
            Some("none") => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Some(Self {
            server: get("SMTP_SERVER")?,
            port: get("SMTP_PORT").and_then(|p| p.parse().ok()).unwrap_or(587),
            address: get("EMAIL_ADDRESS")?,
            password: get("EMAIL_PASSWORD"),
            tls,
        })
    }
}

// ============================================================================
// SMTP
// ============================================================================

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config.address.parse().map_err(|e| NotifyError::Address {
            address: config.address.clone(),
            reason: format!("{e}"),
        })?;

        let mut builder = match config.tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server),
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            }
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.server,
            )),
        }
        .map_err(|e| NotifyError::Smtp(format!("SMTP transport error: {e}")))?;

        builder = builder.port(config.port);
        if let Some(password) = &config.password {
            builder = builder.credentials(Credentials::new(
                config.address.clone(),
                password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let recipient: Mailbox = to.parse().map_err(|e| NotifyError::Address {
            address: to.to_string(),
            reason: format!("{e}"),
        })?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Smtp(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(format!("Failed to send email: {e}")))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        info!(to, subject, "Notification (email disabled)");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// SMTP when configured and valid, otherwise the log notifier
pub fn notifier_from_config(config: Option<&SmtpConfig>) -> Arc<dyn Notifier> {
    let Some(config) = config else {
        info!("No SMTP configured (set SMTP_SERVER and EMAIL_ADDRESS); alerts will be logged");
        return Arc::new(LogNotifier);
    };

    match SmtpNotifier::new(config) {
        Ok(notifier) => {
            info!(server = %config.server, port = config.port, "Email notifications enabled");
            Arc::new(notifier)
        }
        Err(e) => {
            warn!(error = %e, "Failed to initialize SMTP notifier; alerts will be logged");
            Arc::new(LogNotifier)
        }
    }
}
