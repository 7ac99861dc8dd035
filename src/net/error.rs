//! Error taxonomy for REST calls and the forms that surface them.
//!
//! DESIGN
//! ======
//! Every API call resolves to `Result<T, ApiError>`. Callers match on the
//! variant instead of probing response shapes: validation errors render inline
//! next to form fields, auth errors end the session, network errors are
//! transient and retried by the next poll.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::collections::BTreeMap;

/// Result alias used by every [`crate::net::api::ChatApi`] call.
pub type ApiResult<T> = Result<T, ApiError>;

/// Keys the backend uses for errors that are not bound to a single field.
const GENERAL_KEYS: [&str; 4] = ["general", "error", "detail", "non_field_errors"];

/// Field-scoped validation messages keyed by wire field name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a message for `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// First message reported for `field`, if any.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|msgs| msgs.first()).map(String::as_str)
    }

    /// First message that is not tied to a specific form field.
    #[must_use]
    pub fn general(&self) -> Option<&str> {
        GENERAL_KEYS.iter().find_map(|key| self.field(key))
    }

    /// Best single message to show: the general one, else any field message.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.general()
            .or_else(|| self.0.values().find_map(|msgs| msgs.first()).map(String::as_str))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Parse a DRF-style error body: `{field: [msg, ...]}`, `{field: msg}`,
    /// or `{error: msg}`. Anything else yields an empty set.
    #[must_use]
    pub fn from_body(body: &serde_json::Value) -> Self {
        let mut errors = Self::new();
        let Some(object) = body.as_object() else {
            return errors;
        };
        for (field, value) in object {
            match value {
                serde_json::Value::String(msg) => errors.push(field.as_str(), msg.as_str()),
                serde_json::Value::Array(items) => {
                    for msg in items.iter().filter_map(serde_json::Value::as_str) {
                        errors.push(field.as_str(), msg);
                    }
                }
                _ => {}
            }
        }
        errors
    }
}

/// Coarse error class used for user-facing presentation decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Network,
}

/// Failure of a single REST call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the request body (HTTP 400/422).
    #[error("request rejected: {}", .0.first_message().unwrap_or("invalid input"))]
    Validation(FieldErrors),

    /// Credentials are missing, invalid, expired, or revoked (HTTP 401/403).
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Transport failure, unexpected status, or undecodable response.
    #[error("network failure: {0}")]
    Network(String),
}

impl ApiError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Network(_) => ErrorKind::Network,
        }
    }

    /// Classify a non-success HTTP response.
    #[must_use]
    pub fn from_status(status: u16, body: &serde_json::Value) -> Self {
        match status {
            400 | 422 => {
                let mut fields = FieldErrors::from_body(body);
                if fields.is_empty() {
                    fields.push("general", format!("request rejected with status {status}"));
                }
                Self::Validation(fields)
            }
            401 | 403 => {
                let detail = FieldErrors::from_body(body)
                    .general()
                    .map_or_else(|| format!("status {status}"), str::to_owned);
                Self::Auth(detail)
            }
            _ => Self::Network(format!("unexpected status {status}")),
        }
    }
}

/// Structured failure returned by form-backed session operations.
///
/// `message` is always displayable: the server's general message when one was
/// reported, otherwise the caller's fallback sentence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormFailure {
    pub fields: FieldErrors,
    pub message: String,
}

impl FormFailure {
    /// Failure produced by local validation before any request was issued.
    #[must_use]
    pub fn from_fields(fields: FieldErrors, fallback: &str) -> Self {
        let message = fields.general().unwrap_or(fallback).to_owned();
        Self { fields, message }
    }

    #[must_use]
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        match err {
            ApiError::Validation(fields) => Self::from_fields(fields.clone(), fallback),
            ApiError::Auth(_) | ApiError::Network(_) => Self {
                fields: FieldErrors::new(),
                message: fallback.to_owned(),
            },
        }
    }

    /// Inline message for one form field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.field(name)
    }

    /// Message for the form-level banner. Suppressed when every reported
    /// problem is already shown next to its field.
    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        if self.message.is_empty() {
            return None;
        }
        if self.fields.is_empty() || self.fields.general().is_some() {
            Some(self.message.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.message.is_empty()
    }
}
