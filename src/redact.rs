use crate::submission::{is_valid_email, FormFields, EMAIL_FIELD, MESSAGE_FIELD, NAME_FIELD};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"\b([a-zA-Z0-9._%+'-]+)@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b")
            .expect("email pattern compiles");
    static ref PHONE_RE: Regex =
        Regex::new(r"\+?\b\d{2,4}[-.\s]?\d{3}[-.\s]?\d{3,4}\b").expect("phone pattern compiles");
}

/// How much submitted form data reaches the server log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPrivacy {
    Full,
    #[default]
    Redacted,
    Omitted,
}

/// Renders a form field set for log lines according to a [`LogPrivacy`] level.
#[derive(Debug, Clone)]
pub struct FormRedactor {
    privacy: LogPrivacy,
    bait_field_name: String,
    token_field_name: String,
}

impl FormRedactor {
    pub fn new(privacy: LogPrivacy, bait_field_name: &str, token_field_name: &str) -> Self {
        Self {
            privacy,
            bait_field_name: bait_field_name.to_string(),
            token_field_name: token_field_name.to_string(),
        }
    }

    pub fn describe(&self, fields: &FormFields) -> String {
        match self.privacy {
            LogPrivacy::Omitted => "[form data omitted]".to_string(),
            LogPrivacy::Full => {
                let mut pairs: Vec<(&str, &str)> = fields.iter().collect();
                pairs.sort_unstable();
                serde_json::to_string(&pairs).unwrap_or_else(|_| "[unprintable]".to_string())
            }
            LogPrivacy::Redacted => {
                let mut pairs: Vec<(&str, String)> = fields
                    .iter()
                    .map(|(key, value)| (key, self.redact_field(key, value)))
                    .collect();
                pairs.sort_unstable();
                pairs
                    .iter()
                    .map(|(k, v)| format!("{}={v}", k.escape_debug()))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }

    fn redact_field(&self, key: &str, value: &str) -> String {
        if key == self.token_field_name {
            let presence = if value.is_empty() { "<absent>" } else { "<present>" };
            return presence.to_string();
        }
        if key == self.bait_field_name || key == MESSAGE_FIELD {
            return format!("<{} chars>", value.chars().count());
        }
        match key {
            NAME_FIELD => redact_name(value),
            EMAIL_FIELD if is_valid_email(value.trim()) => redact_text(value.trim()),
            _ => format!("<{} chars>", value.chars().count()),
        }
    }
}

fn redact_name(name: &str) -> String {
    match name.trim().chars().next() {
        Some(initial) => format!("{initial}***"),
        None => "<empty>".to_string(),
    }
}

/// Masks email local parts and phone numbers inside free text.
pub fn redact_text(content: &str) -> String {
    let result = EMAIL_RE.replace_all(content, |caps: &regex::Captures| {
        let local = caps.get(1).map_or("", |m| m.as_str());
        let domain = caps.get(2).map_or("", |m| m.as_str());
        match local.chars().next() {
            Some(first) => format!("{first}***@{domain}"),
            None => format!("***@{domain}"),
        }
    });
    PHONE_RE.replace_all(&result, "***-***-****").to_string()
}
