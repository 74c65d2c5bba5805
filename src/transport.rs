use crate::config::{MailConfig, SmtpSecurity};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// One message ready for the transport. Sender and recipient always come
/// from configuration, never from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// What the transport said about a message it processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub response: String,
}

impl SendReport {
    pub fn is_accepted(&self) -> bool {
        !self.accepted.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid mailbox {address}: {reason}")]
    InvalidMailbox { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("SMTP transport error: {0}")]
    Smtp(String),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, attempt: &DeliveryAttempt) -> Result<SendReport, TransportError>;
}

/// SMTP relay built once at start-up and shared by every request.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, TransportError> {
        let from = parse_mailbox(&config.from)?;
        let to = parse_mailbox(&config.to)?;

        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host),
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            }
            SmtpSecurity::Plain => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.host,
            )),
        }
        .map_err(|e| TransportError::Smtp(e.to_string()))?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if config.security == SmtpSecurity::Plain && !config.username.is_empty() {
            log::warn!("SMTP credentials configured for a plaintext connection; not sending them");
        } else if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        log::info!(
            "SMTP transport: {}:{} ({:?})",
            config.host,
            config.port,
            config.security
        );

        Ok(SmtpMailer {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn build_message(&self, attempt: &DeliveryAttempt) -> Result<Message, TransportError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(attempt.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(attempt.body.clone())
            .map_err(|e| TransportError::Message(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, attempt: &DeliveryAttempt) -> Result<SendReport, TransportError> {
        let message = self.build_message(attempt)?;
        let recipient = self.to.email.to_string();

        match self.transport.send(message).await {
            Ok(response) => {
                let text = response
                    .message()
                    .map(|line| line.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                if response.is_positive() {
                    Ok(SendReport {
                        accepted: vec![recipient],
                        rejected: Vec::new(),
                        response: format!("{} {text}", response.code()),
                    })
                } else {
                    Ok(SendReport {
                        accepted: Vec::new(),
                        rejected: vec![recipient],
                        response: format!("{} {text}", response.code()),
                    })
                }
            }
            // The server answered with a negative reply: the message was refused, not lost
            Err(e) if e.is_permanent() || e.is_transient() => Ok(SendReport {
                accepted: Vec::new(),
                rejected: vec![recipient],
                response: e.to_string(),
            }),
            Err(e) => Err(TransportError::Smtp(e.to_string())),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| TransportError::InvalidMailbox {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
