use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<structscope_go::GoError> for StructscopeError {
    fn from(err: structscope_go::GoError) -> Self {
        StructscopeError::Parsing(err.to_string())
    }
}

impl From<walkdir::Error> for StructscopeError {
    fn from(err: walkdir::Error) -> Self {
        StructscopeError::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, StructscopeError>;
