use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;

pub const NAME_FIELD: &str = "name";
pub const EMAIL_FIELD: &str = "email";
pub const MESSAGE_FIELD: &str = "message";

lazy_static! {
    // Local part and dot-separated domain labels with an alphabetic TLD.
    // Leading dots and ".." runs are rejected separately since the regex
    // crate has no lookaround.
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$"
    )
    .expect("email pattern compiles");
}

/// The raw field set of one form post. Every field may be missing.
///
/// When a key is repeated the first value wins, the same as a browser
/// `FormData.get`; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fields = FormFields::default();
        for (key, value) in pairs {
            fields.insert_first(key.to_string(), value.to_string());
        }
        fields
    }

    fn insert_first(&mut self, key: String, value: String) {
        self.0.entry(key).or_insert(value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FormFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = FormFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of form field names to values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<FormFields, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = FormFields::default();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    fields.insert_first(key, value);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name required")]
    NameRequired,
    #[error("email required")]
    EmailRequired,
    #[error("email invalid")]
    EmailInvalid,
    #[error("message required")]
    MessageRequired,
}

/// Content fields of a submission that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSubmission<'a> {
    pub sender_name: &'a str,
    pub sender_email: &'a str,
    pub message_body: &'a str,
}

impl<'a> ValidatedSubmission<'a> {
    /// Checks name, email and message in that order and stops at the first problem.
    pub fn validate(fields: &'a FormFields) -> Result<Self, ValidationError> {
        let sender_name = non_blank(fields.get(NAME_FIELD)).ok_or(ValidationError::NameRequired)?;
        let sender_email =
            non_blank(fields.get(EMAIL_FIELD)).ok_or(ValidationError::EmailRequired)?;
        if !is_valid_email(sender_email) {
            return Err(ValidationError::EmailInvalid);
        }
        // The body is relayed as typed, so only the blank check trims it
        let message_body = fields
            .get(MESSAGE_FIELD)
            .filter(|m| !m.trim().is_empty())
            .ok_or(ValidationError::MessageRequired)?;

        Ok(ValidatedSubmission {
            sender_name,
            sender_email,
            message_body,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn is_valid_email(address: &str) -> bool {
    if address.len() > 254 || address.starts_with('.') || address.contains("..") {
        return false;
    }
    EMAIL_RE.is_match(address)
}
