//! Contact form validation and hand-off.
//!
//! Submissions are never stored. A valid submission is logged and passed to a
//! [`ContactSink`]; the default sink only logs, actual email delivery is left
//! to whoever wires in a real sink.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

pub const MISSING_FIELDS_MESSAGE: &str = "Please provide name, email, and message";
pub const INVALID_EMAIL_MESSAGE: &str = "Invalid email address";
pub const INVALID_BODY_MESSAGE: &str = "Invalid JSON body";
pub const SUCCESS_MESSAGE: &str = "Message sent successfully!";
pub const DELIVERY_FAILED_MESSAGE: &str = "Failed to send message";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Raw `POST /api/contact` body. Every field is optional at this stage so a
/// missing field becomes a validation error rather than a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
}

/// Why a submission was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRejection {
    MissingFields,
    InvalidEmail,
}

impl ContactRejection {
    pub fn message(&self) -> &'static str {
        match self {
            ContactRejection::MissingFields => MISSING_FIELDS_MESSAGE,
            ContactRejection::InvalidEmail => INVALID_EMAIL_MESSAGE,
        }
    }
}

/// JSON body returned by the contact endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}

impl ContactResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.is_empty())
}

/// Check required fields first, then the email format.
pub fn validate(request: ContactRequest) -> std::result::Result<ContactSubmission, ContactRejection> {
    let (Some(name), Some(email), Some(message)) = (
        required(request.name),
        required(request.email),
        required(request.message),
    ) else {
        return Err(ContactRejection::MissingFields);
    };
    if !is_valid_email(&email) {
        return Err(ContactRejection::InvalidEmail);
    }
    Ok(ContactSubmission {
        name,
        email,
        phone: request.phone.filter(|p| !p.is_empty()),
        message,
    })
}

/// Destination for accepted submissions.
pub trait ContactSink: Send + Sync {
    fn deliver(&self, submission: &ContactSubmission) -> Result<()>;
}

/// Default sink: records the submission in the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogContactSink;

impl ContactSink for LogContactSink {
    fn deliver(&self, submission: &ContactSubmission) -> Result<()> {
        info!(
            name = %submission.name,
            email = %submission.email,
            phone = submission.phone.as_deref().unwrap_or("-"),
            message = %submission.message,
            "new contact submission"
        );
        Ok(())
    }
}
