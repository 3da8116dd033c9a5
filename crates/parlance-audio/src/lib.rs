//! Audio utilities for fixed-rate microphone capture.
//!
//! This crate wraps the low-level input side of `cpal` into the small
//! surface the capture pipeline needs:
//! - Enumerating input devices and looking them up by id.
//! - Opening a mono input stream at the pipeline's fixed sample rate.
//!
//! # Real-time constraints
//! Audio callbacks run on a real-time thread. Avoid allocations, locks,
//! and blocking I/O inside callbacks whenever possible; hand samples off
//! through a ring buffer and do all processing on a worker thread.

pub mod device;

/// Number of samples in one pipeline frame.
///
/// 512 samples is 32ms at 16kHz: small enough for responsive level
/// meters, large enough to keep the ring-buffer handoff cheap.
pub const FRAME_SAMPLES: usize = 512;

/// Serializes samples as the little-endian 16-bit byte stream the speech
/// pipeline and WAV container use.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::samples_to_le_bytes;

    #[test]
    fn samples_serialize_little_endian() {
        assert_eq!(
            samples_to_le_bytes(&[0x0102, -2]),
            vec![0x02, 0x01, 0xfe, 0xff]
        );
    }
}
