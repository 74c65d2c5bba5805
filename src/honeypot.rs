//! Honeypot spam guard.
//!
//! Two independent checks over a submitted form: a bait field that humans
//! never see (and so never fill in), and a signed "valid from" token that is
//! issued with every rendered form. Both are pure predicates; either one
//! failing marks the submission as automated.

use crate::config::HoneypotConfig;
use crate::submission::FormFields;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("proof token missing")]
    Missing,
    #[error("proof token malformed: {0}")]
    Malformed(String),
    #[error("unsupported proof token version: {0}")]
    UnsupportedVersion(String),
    #[error("proof token signature mismatch")]
    BadSignature,
    #[error("proof token payload invalid: {0}")]
    BadPayload(String),
    #[error("proof token valid from {valid_from} is in the future")]
    NotYetValid { valid_from: i64 },
    #[error("proof token expired ({age_seconds}s old)")]
    Expired { age_seconds: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpamReason {
    #[error("bait field '{field}' was filled in")]
    BaitFilled { field: String },
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("spam detected: {reason}")]
pub struct SpamError {
    pub reason: SpamReason,
}

impl From<SpamReason> for SpamError {
    fn from(reason: SpamReason) -> Self {
        SpamError { reason }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenPayload {
    valid_from: i64,
}

/// What the rendering layer needs to embed the honeypot in a form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoneypotInputs {
    pub bait_field_name: String,
    pub token_field_name: String,
    pub token: String,
}

#[derive(Clone)]
pub struct Honeypot {
    seed: Vec<u8>,
    bait_field_name: String,
    token_field_name: String,
    max_token_age_seconds: Option<u64>,
}

impl std::fmt::Debug for Honeypot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Honeypot")
            .field("seed", &"<redacted>")
            .field("bait_field_name", &self.bait_field_name)
            .field("token_field_name", &self.token_field_name)
            .field("max_token_age_seconds", &self.max_token_age_seconds)
            .finish()
    }
}

impl Honeypot {
    pub fn new(config: &HoneypotConfig) -> Self {
        Honeypot {
            seed: config.seed.as_bytes().to_vec(),
            bait_field_name: config.bait_field_name.clone(),
            token_field_name: config.token_field_name.clone(),
            max_token_age_seconds: config.max_token_age_seconds,
        }
    }

    pub fn bait_field_name(&self) -> &str {
        &self.bait_field_name
    }

    pub fn token_field_name(&self) -> &str {
        &self.token_field_name
    }

    pub fn inputs(&self) -> HoneypotInputs {
        HoneypotInputs {
            bait_field_name: self.bait_field_name.clone(),
            token_field_name: self.token_field_name.clone(),
            token: self.issue_token(),
        }
    }

    pub fn issue_token(&self) -> String {
        self.issue_token_at(Utc::now())
    }

    pub fn issue_token_at(&self, now: DateTime<Utc>) -> String {
        let payload = TokenPayload {
            valid_from: now.timestamp_millis(),
        };
        // A struct with a single i64 always serializes
        let payload_bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let payload_part = URL_SAFE_NO_PAD.encode(payload_bytes);
        let sig_part = URL_SAFE_NO_PAD.encode(self.sign(payload_part.as_bytes()));
        format!("{TOKEN_VERSION_V1}.{payload_part}.{sig_part}")
    }

    pub fn check(&self, fields: &FormFields) -> Result<(), SpamError> {
        self.check_at(fields, Utc::now())
    }

    pub fn check_at(&self, fields: &FormFields, now: DateTime<Utc>) -> Result<(), SpamError> {
        self.check_bait(fields)?;
        self.check_token(fields, now)?;
        Ok(())
    }

    pub fn check_bait(&self, fields: &FormFields) -> Result<(), SpamError> {
        match fields.get(&self.bait_field_name) {
            Some(value) if !value.is_empty() => Err(SpamReason::BaitFilled {
                field: self.bait_field_name.clone(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    pub fn check_token(&self, fields: &FormFields, now: DateTime<Utc>) -> Result<(), SpamError> {
        let token = match fields.get(&self.token_field_name) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(SpamReason::from(TokenError::Missing).into()),
        };
        let valid_from = self.verify_token(token).map_err(SpamReason::from)?;

        let now_millis = now.timestamp_millis();
        if valid_from > now_millis {
            return Err(SpamReason::from(TokenError::NotYetValid { valid_from }).into());
        }
        if let Some(max_age) = self.max_token_age_seconds {
            let age_seconds = (now_millis - valid_from) / 1000;
            if age_seconds > i64::try_from(max_age).unwrap_or(i64::MAX) {
                return Err(SpamReason::from(TokenError::Expired { age_seconds }).into());
            }
        }
        log::debug!("Proof token valid from {valid_from}");
        Ok(())
    }

    /// Checks structure and signature, returning the signed `valid_from`.
    fn verify_token(&self, token: &str) -> Result<i64, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed("token exceeds max length".to_string()));
        }
        let parts: Vec<&str> = token.split('.').collect();
        let (payload_part, sig_part) = match parts.as_slice() {
            [version, payload, sig] if *version == TOKEN_VERSION_V1 => (*payload, *sig),
            [version, _, _] => return Err(TokenError::UnsupportedVersion(version.to_string())),
            _ => return Err(TokenError::Malformed("expected three parts".to_string())),
        };

        let expected = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(&self.seed)
            .map_err(|e| TokenError::BadPayload(e.to_string()))?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| TokenError::BadSignature)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let payload: TokenPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| TokenError::BadPayload(e.to_string()))?;
        Ok(payload.valid_from)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so this cannot fail
        match HmacSha256::new_from_slice(&self.seed) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Err(_) => Vec::new(),
        }
    }
}
