//! Wire shapes of the relay-node control-plane API.
//!
//! Request and response bodies are plain JSON; request bodies may arrive
//! gzip- or zstd-framed, see [`compression`].

pub mod compression;
pub mod error;
pub mod message;

pub use compression::{
    ContentEncoding, MAX_DECODED_BODY, compress, decode_json_body, decode_json_body_capped,
    decompress, decompress_capped,
};
pub use error::{ProtocolError, Result};
pub use message::*;
