//! Artifact binary format
//!
//! ```text
//! "MBMA" | format version (u16 LE) | SHA-256 of payload (32 bytes) | payload
//! ```
//!
//! The payload is a gzip stream of the bincode encoding of the artifact.
//! Encoding is deterministic: decoding and re-encoding yields the same bytes.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use modelbridge_core::{Error, ModelArtifact, Result, FORMAT_VERSION};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

pub const MAGIC: &[u8; 4] = b"MBMA";
const HEADER_LEN: usize = 4 + 2 + 32;

pub fn encode(artifact: &ModelArtifact) -> Result<Vec<u8>> {
    let body = bincode::serialize(artifact).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body)?;
    let payload = encoder.finish()?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&Sha256::digest(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Format version recorded in the header
pub fn format_version(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Serialization(format!(
            "artifact is truncated ({} bytes)",
            bytes.len()
        )));
    }
    if &bytes[..4] != MAGIC {
        return Err(Error::Serialization("not a model artifact (bad magic)".to_string()));
    }
    Ok(u16::from_le_bytes([bytes[4], bytes[5]]))
}

pub fn decode(bytes: &[u8]) -> Result<ModelArtifact> {
    let version = format_version(bytes)?;
    if version == 0 || version > FORMAT_VERSION {
        return Err(Error::Serialization(format!(
            "unsupported artifact format version {} (this build reads up to {})",
            version, FORMAT_VERSION
        )));
    }

    let (checksum, payload) = bytes[6..].split_at(32);
    if Sha256::digest(payload).as_slice() != checksum {
        return Err(Error::Serialization("artifact checksum mismatch".to_string()));
    }

    let mut body = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut body)
        .map_err(|e| Error::Serialization(format!("corrupt artifact payload: {}", e)))?;
    let artifact: ModelArtifact =
        bincode::deserialize(&body).map_err(|e| Error::Serialization(e.to_string()))?;
    artifact.validate()?;
    Ok(artifact)
}
