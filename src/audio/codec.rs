//! PCM16 ⇄ base64 transport codec
//!
//! The wire format is the exact little-endian byte packing of the 16-bit
//! signed samples, base64-encoded with the standard alphabet so it can sit
//! inside a JSON string. Decoding is the exact inverse.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{Error, Result};

/// Encode PCM16 samples for embedding in a JSON command or response
#[must_use]
pub fn encode_pcm16(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode a base64 payload back into PCM16 samples
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is not valid base64 or decodes
/// to an odd number of bytes (which cannot be 16-bit samples).
pub fn decode_pcm16(encoded: &str) -> Result<Vec<i16>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Protocol(format!("invalid base64 audio payload: {e}")))?;

    if bytes.len() % 2 != 0 {
        return Err(Error::Protocol(format!(
            "PCM16 payload has odd byte length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
