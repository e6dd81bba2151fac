use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenomeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Value out of range: {0}")]
    Range(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Structural invariant violated: {0}")]
    StructuralInvariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GenomeError>;
