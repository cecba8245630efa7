use thiserror::Error;

#[derive(Error, Debug)]
pub enum CuesmithError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML writing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Audio payload decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Invalid segment {index}: {reason}")]
    InvalidSegment { index: usize, reason: String },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Translation backend still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Export error: {0}")]
    Export(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, CuesmithError>;
