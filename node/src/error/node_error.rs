use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use protocol::ErrorResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not Found")]
    NotFound,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl NodeError {
    fn status(&self) -> StatusCode {
        match self {
            NodeError::Protocol(_) => StatusCode::BAD_REQUEST,
            NodeError::Unauthorized => StatusCode::UNAUTHORIZED,
            NodeError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
