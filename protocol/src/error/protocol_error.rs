use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {encoding} body: {source}")]
    Decompression {
        encoding: crate::ContentEncoding,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0} must be a non-negative integer")]
    InvalidByteCount(&'static str),

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}
