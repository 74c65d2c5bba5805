pub mod config;
pub mod honeypot;
pub mod outcome;
pub mod processor;
pub mod redact;
pub mod server;
pub mod submission;
pub mod transport;

pub use config::Config;
pub use honeypot::{Honeypot, HoneypotInputs, SpamError};
pub use outcome::{ContactResponse, Outcome};
pub use processor::ContactProcessor;
pub use submission::FormFields;
pub use transport::{DeliveryAttempt, MailTransport, SendReport, SmtpMailer};
