use crate::config::Config;
use crate::honeypot::{Honeypot, SpamError};
use crate::outcome::Outcome;
use crate::redact::FormRedactor;
use crate::submission::{FormFields, ValidatedSubmission, ValidationError};
use crate::transport::{self, DeliveryAttempt, MailTransport, SendReport};
use std::sync::Arc;

/// Everything that can stop a submission short of delivery.
///
/// Only the server log ever sees these; the submitter gets an [`Outcome`].
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error(transparent)]
    SpamDetected(#[from] SpamError),
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
    #[error(transparent)]
    TransportError(#[from] transport::TransportError),
    #[error("transport rejected message: {}", .0.response)]
    TransportRejected(SendReport),
}

impl ContactError {
    pub fn to_outcome(&self) -> Outcome {
        match self {
            ContactError::SpamDetected(_) => Outcome::Spam,
            ContactError::ValidationFailed(reason) => Outcome::ValidationFailed(reason.to_string()),
            ContactError::TransportError(_) | ContactError::TransportRejected(_) => {
                Outcome::DeliveryFailed
            }
        }
    }
}

pub struct ContactProcessor {
    honeypot: Honeypot,
    transport: Arc<dyn MailTransport>,
    from: String,
    to: String,
    redactor: FormRedactor,
}

impl ContactProcessor {
    pub fn new(config: &Config, transport: Arc<dyn MailTransport>) -> Self {
        let honeypot = Honeypot::new(&config.honeypot);
        let redactor = FormRedactor::new(
            config.logging.form_data,
            honeypot.bait_field_name(),
            honeypot.token_field_name(),
        );
        ContactProcessor {
            honeypot,
            transport,
            from: config.mail.from.clone(),
            to: config.mail.to.clone(),
            redactor,
        }
    }

    pub fn honeypot(&self) -> &Honeypot {
        &self.honeypot
    }

    /// Classify one submission. Never fails: every error becomes an outcome.
    pub async fn process(&self, fields: &FormFields) -> Outcome {
        match self.try_process(fields).await {
            Ok(report) => {
                log::info!(
                    "Message sent successfully ({}): {}",
                    report.response,
                    self.redactor.describe(fields)
                );
                Outcome::Delivered
            }
            Err(error) => {
                self.log_failure(&error, fields);
                error.to_outcome()
            }
        }
    }

    /// Like [`process`](Self::process) but on its own task, so a panic while
    /// handling one submission is reported as a delivery failure instead of
    /// unwinding into the caller.
    pub async fn process_isolated(self: &Arc<Self>, fields: FormFields) -> Outcome {
        let processor = Arc::clone(self);
        match tokio::spawn(async move { processor.process(&fields).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Error: contact submission aborted: {e}");
                Outcome::DeliveryFailed
            }
        }
    }

    async fn try_process(&self, fields: &FormFields) -> Result<SendReport, ContactError> {
        self.honeypot.check(fields)?;
        let submission = ValidatedSubmission::validate(fields)?;
        let attempt = self.delivery_attempt(&submission);
        let report = self.transport.send(&attempt).await?;
        if !report.is_accepted() {
            return Err(ContactError::TransportRejected(report));
        }
        Ok(report)
    }

    fn delivery_attempt(&self, submission: &ValidatedSubmission<'_>) -> DeliveryAttempt {
        DeliveryAttempt {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: build_subject(submission.sender_name, submission.sender_email),
            body: submission.message_body.to_string(),
        }
    }

    fn log_failure(&self, error: &ContactError, fields: &FormFields) {
        let form = self.redactor.describe(fields);
        match error {
            ContactError::SpamDetected(e) => log::warn!("SPAM ALERT: {e}: {form}"),
            ContactError::ValidationFailed(e) => {
                log::info!("Rejected invalid submission ({e}): {form}")
            }
            ContactError::TransportError(e) => {
                log::error!("Error: failed to send email: {e}: {form}")
            }
            ContactError::TransportRejected(report) => log::error!(
                "Error: failed to send email, no recipient accepted \
                 (rejected: {:?}, response: {}): {form}",
                report.rejected,
                report.response
            ),
        }
    }
}

/// `Message from {name} <{email}>`, with control characters in the name
/// flattened to spaces so a form field can never start a new header line.
pub fn build_subject(sender_name: &str, sender_email: &str) -> String {
    let name: String = sender_name
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    format!("Message from {} <{sender_email}>", name.trim())
}
