use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PgnError {
    #[error("Shape mismatch error: {0}")]
    ShapeMismatch(String),

    #[error("OOV index out of range: token id {token_id} is beyond the base vocabulary ({vocab_size}) and the {oov_count} OOV slots of the example")]
    OovIndexOutOfRange {
        token_id: i64,
        vocab_size: i64,
        oov_count: usize,
    },

    #[error("Checkpoint unavailable: {0}")]
    CheckpointUnavailable(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Value error: {0}")]
    ValueError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for PgnError {
    fn from(error: std::io::Error) -> Self {
        PgnError::IOError(error.to_string())
    }
}

impl From<TchError> for PgnError {
    fn from(error: TchError) -> Self {
        PgnError::TchError(error.to_string())
    }
}

impl From<serde_json::Error> for PgnError {
    fn from(error: serde_json::Error) -> Self {
        PgnError::SerializationError(error.to_string())
    }
}
