use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoError {
    #[error("Failed to load Go grammar: {0}")]
    Language(String),
    #[error("Invalid query: {0}")]
    Query(String),
    #[error("Parsing error in {path}: {message}")]
    Parse { path: String, message: String },
}

/// Failure to turn an edited file back into Go source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("invalid type `{literal}` for {context}")]
    InvalidType { literal: String, context: String },
    #[error("invalid name `{name}` for {context}")]
    InvalidName { name: String, context: String },
    #[error("invalid tag `{tag}` for {context}")]
    InvalidTag { tag: String, context: String },
    #[error("synthesized source for {file} does not parse: {message}")]
    InvalidOutput { file: String, message: String },
    #[error("unknown file {file} in package {package}")]
    UnknownFile { package: String, file: String },
}

pub type Result<T> = std::result::Result<T, GoError>;
