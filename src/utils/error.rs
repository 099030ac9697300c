use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Invalid argument: {name} is required")]
    InvalidArgument { name: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store error ({status}): {code}: {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    #[error("The item does not have content")]
    ContentNotAvailable,

    #[error("Chunk upload failed at offset {offset} after {attempts} attempts: {source}")]
    ChunkUpload {
        offset: u64,
        attempts: u32,
        #[source]
        source: Box<DriveError>,
    },

    #[error("Unexpected response from remote store: {message}")]
    UnexpectedResponse { message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Is a directory: {path}")]
    IsADirectory { path: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DriveError {
    pub fn invalid_argument(name: impl Into<String>) -> Self {
        DriveError::InvalidArgument { name: name.into() }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            DriveError::Cancelled => true,
            DriveError::ChunkUpload { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// HTTP status reported by the remote store, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DriveError::Remote { status, .. } => Some(*status),
            DriveError::Http(e) => e.status().map(|s| s.as_u16()),
            DriveError::ChunkUpload { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DriveError::Cancelled | DriveError::ContentNotAvailable => ErrorSeverity::Low,
            DriveError::Http(_) | DriveError::ChunkUpload { .. } => ErrorSeverity::Medium,
            DriveError::Remote { status, .. } if *status >= 500 || *status == 429 => {
                ErrorSeverity::Medium
            }
            DriveError::Remote { .. }
            | DriveError::NotADirectory { .. }
            | DriveError::IsADirectory { .. }
            | DriveError::UnexpectedResponse { .. }
            | DriveError::SerializationError(_) => ErrorSeverity::High,
            DriveError::InvalidArgument { .. }
            | DriveError::IoError(_)
            | DriveError::UrlError(_)
            | DriveError::ConfigError { .. }
            | DriveError::InvalidConfigValueError { .. }
            | DriveError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DriveError::Remote { status: 401, .. } | DriveError::Remote { status: 403, .. } => {
                "The remote drive rejected the credentials; check the access token".to_string()
            }
            DriveError::Remote { status: 404, .. } => {
                "The remote item was not found; it may have been moved or deleted".to_string()
            }
            DriveError::ChunkUpload { offset, attempts, .. } => format!(
                "Upload gave up at byte {} after {} attempts; the remote upload session was left as is",
                offset, attempts
            ),
            DriveError::Cancelled => "The operation was cancelled".to_string(),
            DriveError::ConfigError { .. }
            | DriveError::InvalidConfigValueError { .. }
            | DriveError::MissingConfigError { .. } => {
                format!("Configuration problem: {}", self)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
