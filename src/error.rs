// Error taxonomy for the certificate service
// Recoverable kinds (NotFound, Validation, AuthFailure) are turned into
// user-facing messages by the web layer; everything else is a 500.

use crate::routing::StoreRole;
use serde::Serialize;
use thiserror::Error;

/// A single form field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug)]
pub enum CertError {
    #[error("Owner {id} not found in either store")]
    NotFound { id: i64 },

    #[error("Invalid input: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Malformed date: {0}")]
    Parse(#[from] chrono::ParseError),

    #[error("Invalid username or password")]
    AuthFailure,

    #[error("Method not allowed")]
    MethodNotAllowed { allowed: &'static str },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("{0} store is unavailable")]
    StoreUnavailable(StoreRole),

    #[error("Session store is unavailable")]
    SessionUnavailable,

    #[error("QR encoding failed: {0}")]
    Qr(String),

    #[error("PNG encoding failed: {0}")]
    Image(#[from] png::EncodingError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration for {key}: {message}")]
    Config { key: String, message: String },
}

impl From<qrcode::types::QrError> for CertError {
    fn from(err: qrcode::types::QrError) -> Self {
        CertError::Qr(err.to_string())
    }
}

impl CertError {
    /// True for the kinds the web layer recovers into a message
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CertError::NotFound { .. }
                | CertError::Validation(_)
                | CertError::Parse(_)
                | CertError::AuthFailure
        )
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, CertError>;
