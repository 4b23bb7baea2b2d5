use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Credentials file not found: {path}")]
    MissingCredentialsError { path: String },

    #[error("Bounced email file not found: {path}")]
    BouncedFileNotFound { path: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("API returned {status}: {message}")]
    ApiStatusError { status: u16, message: String },

    #[error("Rate limited by API, gave up after {attempts} attempts")]
    RateLimitedError { attempts: u32 },
}

impl CleanerError {
    pub fn config(message: impl Into<String>) -> Self {
        CleanerError::ConfigError {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        CleanerError::AuthError {
            message: message.into(),
        }
    }

    /// Whether the failure came from talking to the remote API rather than
    /// from local setup.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            CleanerError::ApiError(_)
                | CleanerError::ApiStatusError { .. }
                | CleanerError::RateLimitedError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CleanerError::MissingCredentialsError { .. } => {
                "Download an OAuth client (Desktop app) from the Google Cloud console and pass it with --credentials"
            }
            CleanerError::BouncedFileNotFound { .. } => {
                "Create the file with one bounced email address per line, or point --load-file at it"
            }
            CleanerError::AuthError { .. } => {
                "Delete the cached token file and run again to repeat the consent flow"
            }
            CleanerError::ApiStatusError { status: 401, .. }
            | CleanerError::ApiStatusError { status: 403, .. } => {
                "Check that the People API is enabled and the token has the contacts scope"
            }
            CleanerError::RateLimitedError { .. } => {
                "Wait a few minutes before retrying, or raise retry.max_attempts in the settings file"
            }
            CleanerError::ApiError(_) | CleanerError::ApiStatusError { .. } => {
                "Check your network connection and try again"
            }
            CleanerError::ConfigError { .. } | CleanerError::InvalidConfigValueError { .. } => {
                "Fix the reported setting and run again"
            }
            CleanerError::IoError(_) | CleanerError::SerializationError(_) => {
                "Check file permissions and that the files are not corrupted"
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CleanerError::ConfigError { .. }
            | CleanerError::InvalidConfigValueError { .. }
            | CleanerError::MissingCredentialsError { .. }
            | CleanerError::BouncedFileNotFound { .. } => 1,
            CleanerError::AuthError { .. } => 3,
            _ if self.is_remote() => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanerError>;
