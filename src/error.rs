use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;

// ============================================================================
// Main Error Type
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Convenience constructors
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedInput, message)
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UploadFailed, message)
    }

    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InferenceFailed, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Configuration, message)
    }

    /// Message plus any structured details, as shown in the envelope's `details`.
    pub fn diagnostic(&self) -> String {
        match &self.details {
            Some(details) => format!("{} {}", self.message, details),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

// ============================================================================
// Error Codes
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (4xx)
    MalformedInput,

    // Server errors (5xx)
    UploadFailed,
    InferenceFailed,
    Configuration,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedInput => 400,
            Self::UploadFailed => 500,
            Self::InferenceFailed => 500,
            Self::Configuration => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }

    /// Fixed text shown to the caller; the raw message only ever goes to `details`.
    pub fn user_message(&self) -> &'static str {
        if self.is_client_error() {
            "Invalid request payload"
        } else {
            "Something went wrong"
        }
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

pub type Result<T> = std::result::Result<T, AppError>;

// ============================================================================
// Error Conversion Implementations
// ============================================================================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_input(format!("JSON error: {}", err))
    }
}

// ============================================================================
// Error Context Extension
// ============================================================================

pub trait ErrorContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<AppError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let mut err = e.into();
            err.message = format!("{}: {}", context.into(), err.message);
            err
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn log_error(error: &AppError) {
    if error.code.is_server_error() {
        log::error!("[{}] {}", error.code, error.diagnostic());
    } else {
        log::warn!("[{}] {}", error.code, error.diagnostic());
    }
}

// ============================================================================
// Tests
// ============================================================================
