/// Computes the normalized RMS energy of one PCM frame.
///
/// The frame is interpreted as little-endian signed 16-bit mono samples.
/// The result is `sqrt(mean(sample^2)) / 32768`, so it falls in `[0, 1]`
/// with `1.0` corresponding to a full-scale signal. A frame with an odd
/// byte length has its trailing byte ignored. An empty frame yields `0.0`.
pub fn frame_energy(frame: &[u8]) -> f32 {
    let usable = frame.len() & !1;
    if usable == 0 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for pair in frame[..usable].chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
        sum += sample * sample;
    }

    let mean = sum / (usable / crate::BYTES_PER_SAMPLE) as f64;
    (mean.sqrt() / 32768.0) as f32
}

#[cfg(test)]
mod tests {
    use super::frame_energy;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect()
    }

    #[test]
    fn silence_has_zero_energy() {
        assert_eq!(frame_energy(&pcm(&[0; 512])), 0.0);
    }

    #[test]
    fn empty_frame_has_zero_energy() {
        assert_eq!(frame_energy(&[]), 0.0);
    }

    #[test]
    fn full_scale_square_wave_is_near_unity() {
        let samples: Vec<i16> = (0..512)
            .map(|index| if index % 2 == 0 { i16::MAX } else { i16::MIN + 1 })
            .collect();
        let energy = frame_energy(&pcm(&samples));
        assert!((energy - 1.0).abs() < 1e-3, "energy was {energy}");
    }

    #[test]
    fn trailing_odd_byte_is_ignored() {
        let mut frame = pcm(&[8000; 64]);
        let even = frame_energy(&frame);
        frame.push(0xff);
        assert_eq!(frame_energy(&frame), even);
    }
}
