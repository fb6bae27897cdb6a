use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Referential integrity error: {0}")]
    ReferentialIntegrity(String),

    #[error("Range violation: {0}")]
    Range(String),

    #[error("Temporal gap error: {0}")]
    TemporalGap(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for EtlError {
    fn from(err: polars::error::PolarsError) -> Self {
        EtlError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
