use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid label schema: {0}")]
    Schema(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Duplicate image (HTTP 409). A distinguished outcome, not a failure:
    /// bulk import tallies it separately from failed rows.
    #[error("duplicate image already exists in the dataset")]
    Conflict,

    /// HTTP 401. The saved session is cleared before this is returned.
    #[error("not authenticated (session cleared, run `aitrace login`)")]
    Unauthorized,

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
