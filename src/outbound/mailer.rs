//! Outgoing mail over SMTP, or to the log when SMTP is not configured.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::auth::{MailTemplate, Mailer};
use crate::config::SmtpConfig;
use crate::errors::AppError;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Must be called inside a tokio runtime; the connection pool spawns its reaper.
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let sender = config
            .sender
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid SMTP sender: {}", e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::Internal(format!("Invalid SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, template: &MailTemplate) -> Result<(), AppError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient {}: {}", to, e)))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(template.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(template.body())
            .map_err(|e| AppError::Internal(format!("Failed to build mail: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send mail: {}", e)))?;
        Ok(())
    }
}

/// Writes mails to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, template: &MailTemplate) -> Result<(), AppError> {
        tracing::info!(to = %to, subject = template.subject(), "SMTP not configured, mail not sent");
        tracing::debug!("{}", template.body());
        Ok(())
    }
}
