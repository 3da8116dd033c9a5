//! Canonical WAV framing for utterance payloads.
//!
//! The transcription service expects a plain RIFF/WAVE container with a
//! 44-byte header and 16-bit PCM payload. The encoder here is written
//! byte-wise so the header is bit-exact; the decoder exists so callers can
//! verify what the encoder declared.

/// Length of the canonical RIFF/WAVE header in bytes.
pub const HEADER_LEN: usize = 44;

/// Errors produced while reading a WAV header.
#[derive(Debug, thiserror::Error)]
pub enum WavError {
    /// The buffer is shorter than a complete header.
    #[error("buffer of {0} bytes is too short for a WAV header")]
    Truncated(usize),
    /// One of the RIFF/WAVE/fmt/data chunk markers is missing.
    #[error("missing chunk marker {0:?}")]
    BadMarker(&'static str),
}

/// Fields declared by a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Declared length of the `data` chunk in bytes.
    pub data_len: u32,
}

/// Wraps raw PCM bytes in a canonical 44-byte RIFF/WAVE header.
///
/// All fields are little-endian. The chunk sizes are `data.len() + 36` for
/// the RIFF chunk and `data.len()` for the `data` chunk, with the byte
/// rate derived as `sample_rate * channels * bits_per_sample / 8`.
pub fn encode(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;

    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(data_len + 36).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM format tag
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Wraps utterance PCM with the pipeline's fixed format (16kHz mono 16-bit).
pub fn encode_utterance(pcm: &[u8]) -> Vec<u8> {
    encode(pcm, crate::SAMPLE_RATE, 1, 16)
}

/// Reads back the fields of a canonical WAV header.
pub fn decode_header(bytes: &[u8]) -> Result<WavHeader, WavError> {
    if bytes.len() < HEADER_LEN {
        return Err(WavError::Truncated(bytes.len()));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(WavError::BadMarker("RIFF"));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(WavError::BadMarker("WAVE"));
    }
    if &bytes[12..16] != b"fmt " {
        return Err(WavError::BadMarker("fmt "));
    }
    if &bytes[36..40] != b"data" {
        return Err(WavError::BadMarker("data"));
    }

    let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
    let u32_at = |offset: usize| {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    };

    Ok(WavHeader {
        channels: u16_at(22),
        sample_rate: u32_at(24),
        bits_per_sample: u16_at(34),
        data_len: u32_at(40),
    })
}
