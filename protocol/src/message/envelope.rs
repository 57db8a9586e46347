use serde::{Deserialize, Serialize};

/// `{"response": ...}` wrapper used by every `/node/*` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

impl<T> Envelope<T> {
    pub fn new(response: T) -> Self {
        Self { response }
    }
}

/// Reply of the worker endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            processed: None,
        }
    }

    pub fn processed(count: usize) -> Self {
        Self {
            success: true,
            processed: Some(count),
        }
    }
}

/// Reply of the user-provisioning endpoints; `error` is always present, `null` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResult {
    pub success: bool,
    pub error: Option<String>,
}

impl HandlerResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}
