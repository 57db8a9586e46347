use crate::error::NodeError;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header;
use protocol::ProtocolError;
use serde::de::DeserializeOwned;

/// JSON request body, optionally gzip- or zstd-framed.
///
/// The framing is taken from `Content-Encoding` or sniffed from the body's
/// magic bytes. An empty body reads as `{}`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = NodeError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let encoding = request
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| ProtocolError::InvalidMessage(e.body_text()))?;

        let value = protocol::decode_json_body(encoding.as_deref(), &body)?;
        Ok(JsonBody(value))
    }
}
