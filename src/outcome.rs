use serde::{Deserialize, Serialize};

/// The single classified result of processing one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Spam,
    ValidationFailed(String),
    DeliveryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    Spam,
    Validation,
    Delivery,
}

/// JSON body returned to the page that posted the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&Outcome> for ContactResponse {
    fn from(outcome: &Outcome) -> Self {
        let failed = |reason| ContactResponse {
            ok: false,
            reason: Some(reason),
            detail: None,
        };
        match outcome {
            Outcome::Delivered => ContactResponse {
                ok: true,
                reason: None,
                detail: None,
            },
            Outcome::Spam => failed(FailureReason::Spam),
            Outcome::ValidationFailed(detail) => ContactResponse {
                detail: Some(detail.clone()),
                ..failed(FailureReason::Validation)
            },
            Outcome::DeliveryFailed => failed(FailureReason::Delivery),
        }
    }
}

impl From<Outcome> for ContactResponse {
    fn from(outcome: Outcome) -> Self {
        ContactResponse::from(&outcome)
    }
}
