use crate::redact::LogPrivacy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub mail: MailConfig,
    pub honeypot: HoneypotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub security: SmtpSecurity,
    /// Sender identity placed in the From header, e.g. `Contact Me <contact@example.com>`
    pub from: String,
    /// The single fixed inbox every message is relayed to
    pub to: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS from the first byte (smtps, usually port 465)
    #[default]
    Tls,
    Starttls,
    /// No encryption; only meant for local relays and test servers
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneypotConfig {
    pub seed: String,
    #[serde(default = "default_bait_field_name")]
    pub bait_field_name: String,
    #[serde(default = "default_token_field_name")]
    pub token_field_name: String,
    // None disables the expiry check; a token then stays valid forever
    #[serde(default = "default_max_token_age_seconds")]
    pub max_token_age_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub form_data: LogPrivacy,
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_bait_field_name() -> String {
    "name__confirm".to_string()
}

fn default_token_field_name() -> String {
    "form__confirm".to_string()
}

fn default_max_token_age_seconds() -> Option<u64> {
    Some(24 * 60 * 60)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind_address: "127.0.0.1:3000".to_string(),
                max_body_bytes: default_max_body_bytes(),
            },
            mail: MailConfig {
                host: "smtp.example.com".to_string(),
                port: 465,
                username: String::new(),
                password: String::new(),
                security: SmtpSecurity::Tls,
                from: "Contact Me <contact@example.com>".to_string(),
                to: "owner+contact@example.com".to_string(),
                timeout_seconds: default_timeout_seconds(),
            },
            honeypot: HoneypotConfig {
                seed: String::new(),
                bait_field_name: default_bait_field_name(),
                token_field_name: default_token_field_name(),
                max_token_age_seconds: default_max_token_age_seconds(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay the deployment environment on top of the file configuration.
    ///
    /// Secrets are usually injected this way rather than written to disk:
    /// `TRANSPORT_HOST`, `TRANSPORT_PORT`, `TRANSPORT_USER`, `TRANSPORT_PASS`
    /// and `HONEYPOT_ENCRYPTION_SEED`.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TRANSPORT_HOST") {
            self.mail.host = host;
        }
        if let Some(port) = lookup("TRANSPORT_PORT") {
            self.mail.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("TRANSPORT_PORT is not a valid port ({port}): {e}"))?;
        }
        if let Some(user) = lookup("TRANSPORT_USER") {
            self.mail.username = user;
        }
        if let Some(pass) = lookup("TRANSPORT_PASS") {
            self.mail.password = pass;
        }
        if let Some(seed) = lookup("HONEYPOT_ENCRYPTION_SEED") {
            self.honeypot.seed = seed;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.honeypot.seed.trim().is_empty() {
            anyhow::bail!("honeypot seed is empty (set honeypot.seed or HONEYPOT_ENCRYPTION_SEED)");
        }
        if self.honeypot.bait_field_name == self.honeypot.token_field_name {
            anyhow::bail!("honeypot bait and token fields must have different names");
        }
        for reserved in ["name", "email", "message"] {
            let honeypot = &self.honeypot;
            if honeypot.bait_field_name == reserved || honeypot.token_field_name == reserved {
                anyhow::bail!("honeypot field name '{reserved}' collides with a form field");
            }
        }
        if self.mail.host.trim().is_empty() {
            anyhow::bail!("mail.host is empty (set mail.host or TRANSPORT_HOST)");
        }
        if self.mail.timeout_seconds == 0 {
            anyhow::bail!("mail.timeout_seconds must be greater than zero");
        }
        self.mail
            .from
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| anyhow::anyhow!("mail.from is not a valid mailbox: {e}"))?;
        self.mail
            .to
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| anyhow::anyhow!("mail.to is not a valid mailbox: {e}"))?;
        Ok(())
    }
}
