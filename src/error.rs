use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Error message Gmail reports when a modify call names an unknown label
pub const INVALID_LABEL_MESSAGE: &str = "Invalid label";

/// Error types for the autoresponder
#[derive(Error, Debug)]
pub enum GmailError {
    /// Gmail API answered with a non-success status
    #[error("Gmail API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A fetched message lacks a header the responder needs
    #[error("Message {message_id} has no {header} header")]
    MissingHeader {
        message_id: String,
        header: &'static str,
    },

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Label-related errors
    #[error("Label error: {0}")]
    LabelError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic catch-all error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl GmailError {
    /// Check if the error is transient; the next scheduled pass is the retry
    pub fn is_transient(&self) -> bool {
        match self {
            GmailError::NetworkError(_) => true,
            GmailError::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// Check if the error is permanent
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// True for the 400 "Invalid label" answer of a label modify call
    pub fn is_invalid_label(&self) -> bool {
        matches!(
            self,
            GmailError::Api { status: 400, message } if message == INVALID_LABEL_MESSAGE
        )
    }
}

/// Extract status and message from a Google API error body
///
/// Error bodies look like `{"error": {"code": 400, "message": "Invalid label", ...}}`.
fn api_error_from_body(body: &serde_json::Value) -> GmailError {
    let error = &body["error"];
    let status = error["code"]
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(400);
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    GmailError::Api { status, message }
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // Non-success response whose body was JSON
            google_gmail1::Error::BadRequest(ref body) => api_error_from_body(body),
            // Non-success response without a parseable body
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                GmailError::Api {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                }
            }
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(ref err) => {
                GmailError::AuthError(format!("Failed to obtain token: {}", err))
            }
            _ => GmailError::Unknown(error.to_string()),
        }
    }
}
