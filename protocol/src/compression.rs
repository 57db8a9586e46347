use crate::error::{ProtocolError, Result};
use flate2::Compression as GzipLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::str::FromStr;

pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// Largest body a compressed request may expand to.
pub const MAX_DECODED_BODY: usize = 64 * 1024 * 1024;

/// Framing of a request body as sent by the control plane or a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    /// Plain JSON
    #[default]
    Identity,
    /// Zstandard frame
    Zstd,
    /// Gzip member
    Gzip,
}

impl ContentEncoding {
    /// Pick the encoding of a body from its `Content-Encoding` header and magic prefix.
    ///
    /// Zstd wins over gzip, and either the header or the magic bytes are enough
    /// to select it. Anything else is treated as plain JSON.
    pub fn detect(header: Option<&str>, body: &[u8]) -> Self {
        let declared = header
            .and_then(|value| value.parse::<ContentEncoding>().ok())
            .unwrap_or_default();

        if declared == ContentEncoding::Zstd || body.starts_with(&ZSTD_MAGIC) {
            ContentEncoding::Zstd
        } else if declared == ContentEncoding::Gzip || body.starts_with(&GZIP_MAGIC) {
            ContentEncoding::Gzip
        } else {
            ContentEncoding::Identity
        }
    }
}

impl FromStr for ContentEncoding {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "zstd" | "zstandard" => ContentEncoding::Zstd,
            "gzip" | "x-gzip" | "gz" => ContentEncoding::Gzip,
            _ => ContentEncoding::Identity,
        })
    }
}

impl std::fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentEncoding::Identity => write!(f, "identity"),
            ContentEncoding::Zstd => write!(f, "zstd"),
            ContentEncoding::Gzip => write!(f, "gzip"),
        }
    }
}

/// Compress data with the given encoding
pub fn compress(data: &[u8], encoding: ContentEncoding) -> std::io::Result<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Zstd => zstd::encode_all(data, 3),
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), GzipLevel::fast());
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}

/// Decompress data with the given encoding
pub fn decompress(data: &[u8], encoding: ContentEncoding) -> std::io::Result<Vec<u8>> {
    decompress_capped(data, encoding, MAX_DECODED_BODY)
}

/// Decompress data, failing with `InvalidData` once the output passes `limit` bytes.
pub fn decompress_capped(
    data: &[u8],
    encoding: ContentEncoding,
    limit: usize,
) -> std::io::Result<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Zstd => read_capped(zstd::stream::read::Decoder::new(data)?, limit),
        ContentEncoding::Gzip => read_capped(GzDecoder::new(data), limit),
    }
}

fn read_capped(reader: impl Read, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut decompressed)?;
    if decompressed.len() > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("decoded body exceeds {} bytes", limit),
        ));
    }
    Ok(decompressed)
}

/// Decode a request body into `T`.
///
/// Compressed bodies are unwrapped first. An empty body decodes as `{}` so
/// that requests whose fields all have defaults may omit the body.
pub fn decode_json_body<T: DeserializeOwned>(header: Option<&str>, body: &[u8]) -> Result<T> {
    decode_json_body_capped(header, body, MAX_DECODED_BODY)
}

/// [`decode_json_body`] with an explicit cap on the decompressed size.
pub fn decode_json_body_capped<T: DeserializeOwned>(
    header: Option<&str>,
    body: &[u8],
    limit: usize,
) -> Result<T> {
    if body.is_empty() {
        return Ok(serde_json::from_slice(b"{}")?);
    }

    let encoding = ContentEncoding::detect(header, body);
    let decoded = match encoding {
        ContentEncoding::Identity => return Ok(serde_json::from_slice(body)?),
        _ => decompress_capped(body, encoding, limit)
            .map_err(|source| ProtocolError::Decompression { encoding, source })?,
    };

    Ok(serde_json::from_slice(&decoded)?)
}
