use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("text file {name} is not valid utf-8: {source}")]
    Utf8 {
        name: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid embedding model selection: {0}")]
    UnknownModel(String),

    #[error("invalid vector index selection: {0}")]
    UnknownIndexKind(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("top_k must be between 1 and {max}, got {requested}")]
    TopKOutOfRange { requested: usize, max: usize },

    #[error("embedding backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with {index_model} but queried with {query_model}")]
    ModelMismatch {
        index_model: String,
        query_model: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt index at {}: {details}", location.display())]
    CorruptIndex { location: PathBuf, details: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
