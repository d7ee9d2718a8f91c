use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling a [`crate::Config`]. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "NOAA_TOKEN not found in the environment or .env file.\n\
         Hint: request a token at https://www.ncdc.noaa.gov/cdo-web/token and add `NOAA_TOKEN=...` to .env"
    )]
    MissingToken,

    #[error("Failed to read env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenv::Error,
    },

    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine platform config directory")]
    NoConfigDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a single API request.
///
/// Status and transport failures are kept apart so that callers can treat
/// them differently.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error {status}: {}", truncate_body(.body))]
    HttpStatus { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// True for failures that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::Transport(_) => true,
            FetchError::Decode(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reasons an object store could not be set up. Reported at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreSetupError {
    #[error(
        "AWS credentials not found or rejected.\n\
         Hint: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY, attach an IAM role, or pass --local-dir"
    )]
    MissingCredentials,

    #[error(
        "No bucket configured.\n\
         Hint: set NOAA_BUCKET, pass --bucket, or set `store.bucket` in config.toml"
    )]
    MissingBucket,

    #[error("Invalid object store configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Setup(#[from] StoreSetupError),

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to upload: {0}")]
    Store(#[from] object_store::Error),
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
