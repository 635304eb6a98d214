use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Geolocation error {code}: {}", geolocation_message(.code))]
    Geolocation { code: u16 },

    #[error("No active session; log in first")]
    NotAuthenticated,

    #[error("Session rejected by the server (401)")]
    Unauthorized,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Hub error: {message}")]
    Hub { message: String },

    #[error("Hub connection closed: {}", close_reason(.reason))]
    HubClosed { reason: Option<String> },
}

fn geolocation_message(code: &u16) -> &'static str {
    crate::core::geolocation::message_for_code(*code)
}

fn close_reason(reason: &Option<String>) -> &str {
    reason.as_deref().unwrap_or("no reason given")
}

impl SqmError {
    pub fn config(message: impl Into<String>) -> Self {
        SqmError::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SqmError::Validation {
            message: message.into(),
        }
    }

    pub fn hub(message: impl Into<String>) -> Self {
        SqmError::Hub {
            message: message.into(),
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_friendly_message(&self) -> String {
        match self {
            SqmError::Http(e) if e.is_timeout() => {
                "The server took too long to respond.".to_string()
            }
            SqmError::Http(e) if e.is_connect() => {
                "Could not reach the server. Check your connection.".to_string()
            }
            SqmError::Http(_) => "Network request failed.".to_string(),
            SqmError::Io(_) => "Could not read or write local data.".to_string(),
            SqmError::Serialization(_) => "Received an unexpected response.".to_string(),
            SqmError::Config { .. }
            | SqmError::InvalidConfigValue { .. }
            | SqmError::MissingConfig { .. } => {
                format!("Configuration problem: {}", self)
            }
            SqmError::Validation { message } => message.clone(),
            SqmError::InvalidCoordinates { .. } => "The location is not valid.".to_string(),
            SqmError::Geolocation { code } => {
                crate::core::geolocation::message_for_code(*code).to_string()
            }
            SqmError::NotAuthenticated => "Please log in to continue.".to_string(),
            SqmError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            SqmError::Api { message, .. } => message.clone(),
            SqmError::Hub { .. } | SqmError::HubClosed { .. } => {
                "Live order updates are unavailable right now.".to_string()
            }
        }
    }

    /// Whether a manual retry by the user has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            SqmError::Http(_) | SqmError::Hub { .. } | SqmError::HubClosed { .. } => true,
            SqmError::Api { status, .. } => *status >= 500 || *status == 429,
            SqmError::Geolocation { code } => *code != 1,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqmError>;
