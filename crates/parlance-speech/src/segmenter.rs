//! Silence-bounded utterance segmentation over a PCM frame stream.
//!
//! The segmenter is a two-state machine. It sits between the microphone
//! frame source and the dispatch path: frames go in at the capture cadence,
//! sealed utterances come out whenever a span of speech is terminated by
//! sustained silence or an explicit stop.

use crate::{BYTES_PER_SAMPLE, SAMPLE_RATE, energy::frame_energy, samples_to_milliseconds};

/// Tuning parameters for utterance segmentation.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Normalized energy above which a frame counts as voiced.
    pub min_energy_threshold: f32,
    /// Sustained silence required to seal the current utterance, in
    /// milliseconds.
    pub silence_duration_ms: u64,
    /// Utterances shorter than this are rejected instead of emitted, in
    /// milliseconds. Filters out clicks and taps that cross the energy
    /// threshold for a frame or two.
    pub min_utterance_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_energy_threshold: 0.03,
            silence_duration_ms: 1000,
            min_utterance_ms: 1000,
        }
    }
}

/// A sealed span of detected speech.
///
/// The PCM buffer covers the span from the first voiced frame to the last
/// voiced frame. Trailing silence accumulated while waiting for the
/// timeout is trimmed before sealing.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Raw little-endian 16-bit mono PCM bytes.
    pub pcm: Vec<u8>,
    /// Start of the span, in milliseconds since the segmenter was created.
    pub start_ms: u64,
    /// End of the span (last voiced sample), in milliseconds.
    pub end_ms: u64,
}

impl Utterance {
    /// Duration of the span in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Reasons a buffered span was discarded instead of emitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    /// The span ended before reaching the configured minimum duration.
    #[error("utterance too short: {duration_ms}ms of speech")]
    TooShort { duration_ms: u64 },
}

/// Boundary event produced while advancing the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterEvent {
    /// A complete utterance is ready for encoding and dispatch.
    Sealed(Utterance),
    /// A buffered span was discarded.
    Rejected(SegmentError),
}

/// Per-frame output of the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    /// Normalized energy of the frame, for level meters.
    pub energy: f32,
    /// Boundary event, if this frame crossed one.
    pub event: Option<SegmenterEvent>,
}

enum Phase {
    Idle,
    Capturing {
        buffer: Vec<u8>,
        start_sample: u64,
        last_voice_sample: u64,
    },
}

/// Two-state utterance segmenter.
///
/// Exactly one instance consumes the frames of one capture session. Time
/// is derived from the cumulative sample count, so a frame stream always
/// produces the same boundaries regardless of wall-clock scheduling.
pub struct VoiceSegmenter {
    config: SegmenterConfig,
    sample_rate: u32,
    samples_seen: u64,
    phase: Phase,
}

impl VoiceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            sample_rate: SAMPLE_RATE,
            samples_seen: 0,
            phase: Phase::Idle,
        }
    }

    /// Whether a span of speech is currently being buffered.
    pub fn is_capturing(&self) -> bool {
        matches!(self.phase, Phase::Capturing { .. })
    }

    /// Advances the segmenter by one frame of little-endian 16-bit PCM.
    ///
    /// A trailing odd byte is ignored. While capturing, every frame is
    /// appended regardless of its own energy so that quiet trailing
    /// consonants are not clipped; only voiced frames advance the
    /// last-voice mark that the silence timeout is measured against.
    pub fn push_frame(&mut self, frame: &[u8]) -> FrameUpdate {
        let frame = &frame[..frame.len() & !1];
        let energy = frame_energy(frame);
        let voiced = energy > self.config.min_energy_threshold;
        let frame_samples = (frame.len() / BYTES_PER_SAMPLE) as u64;

        let mut timed_out = false;
        match &mut self.phase {
            Phase::Idle => {
                if voiced {
                    let mut buffer = Vec::with_capacity(frame.len() * 32);
                    buffer.extend_from_slice(frame);
                    self.phase = Phase::Capturing {
                        buffer,
                        start_sample: self.samples_seen,
                        last_voice_sample: self.samples_seen + frame_samples,
                    };
                }
                self.samples_seen += frame_samples;
            }
            Phase::Capturing {
                buffer,
                last_voice_sample,
                ..
            } => {
                buffer.extend_from_slice(frame);
                self.samples_seen += frame_samples;

                if voiced {
                    *last_voice_sample = self.samples_seen;
                } else {
                    let silent_ms = samples_to_milliseconds(
                        self.samples_seen - *last_voice_sample,
                        self.sample_rate,
                    );
                    timed_out = silent_ms >= self.config.silence_duration_ms;
                }
            }
        }

        FrameUpdate {
            energy,
            event: timed_out.then(|| self.seal()),
        }
    }

    /// Forces the current span to end, as on push-to-talk release.
    ///
    /// A buffered span is flushed through the same minimum-duration check
    /// as a silence-sealed one. Returns `None` when nothing was buffered.
    pub fn finish(&mut self) -> Option<SegmenterEvent> {
        match self.phase {
            Phase::Idle => None,
            Phase::Capturing { .. } => Some(self.seal()),
        }
    }

    fn seal(&mut self) -> SegmenterEvent {
        let Phase::Capturing {
            mut buffer,
            start_sample,
            last_voice_sample,
        } = std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            unreachable!("seal is only reached while capturing");
        };

        // Trim back to the last voiced sample so the timeout's worth of
        // trailing silence is not shipped to the transcription service.
        let voiced_samples = (last_voice_sample - start_sample) as usize;
        buffer.truncate(voiced_samples * BYTES_PER_SAMPLE);

        let start_ms = samples_to_milliseconds(start_sample, self.sample_rate);
        let end_ms = samples_to_milliseconds(last_voice_sample, self.sample_rate);
        let duration_ms = end_ms - start_ms;

        if duration_ms < self.config.min_utterance_ms {
            SegmenterEvent::Rejected(SegmentError::TooShort { duration_ms })
        } else {
            SegmenterEvent::Sealed(Utterance {
                pcm: buffer,
                start_ms,
                end_ms,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 512 samples per frame, 32ms at 16kHz.
    const FRAME_SAMPLES: usize = 512;
    const FRAME_MS: u64 = 32;

    fn tone_frame() -> Vec<u8> {
        std::iter::repeat(8000i16)
            .take(FRAME_SAMPLES)
            .flat_map(|sample| sample.to_le_bytes())
            .collect()
    }

    fn silence_frame() -> Vec<u8> {
        vec![0u8; FRAME_SAMPLES * 2]
    }

    fn run(segmenter: &mut VoiceSegmenter, tone: usize, silence: usize) -> Vec<SegmenterEvent> {
        let mut events = Vec::new();
        for _ in 0..tone {
            if let Some(event) = segmenter.push_frame(&tone_frame()).event {
                events.push(event);
            }
        }
        for _ in 0..silence {
            if let Some(event) = segmenter.push_frame(&silence_frame()).event {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn all_silence_emits_nothing() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());
        let events = run(&mut segmenter, 0, 200);
        assert!(events.is_empty());
        assert!(!segmenter.is_capturing());
        assert_eq!(segmenter.finish(), None);
    }

    #[test]
    fn gap_below_timeout_does_not_split() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());

        // 992ms of silence between the bursts, just under the timeout.
        let mut events = run(&mut segmenter, 40, 31);
        events.extend(run(&mut segmenter, 40, 40));

        assert_eq!(events.len(), 1);
        let SegmenterEvent::Sealed(utterance) = &events[0] else {
            panic!("expected a sealed utterance, got {events:?}");
        };
        assert_eq!(utterance.start_ms, 0);
        assert_eq!(utterance.end_ms, (40 + 31 + 40) as u64 * FRAME_MS);
    }

    #[test]
    fn short_burst_is_rejected() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());
        let events = run(&mut segmenter, 10, 40);
        assert_eq!(
            events,
            vec![SegmenterEvent::Rejected(SegmentError::TooShort {
                duration_ms: 10 * FRAME_MS,
            })]
        );
    }

    #[test]
    fn trailing_silence_is_trimmed() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());
        let events = run(&mut segmenter, 40, 40);

        let SegmenterEvent::Sealed(utterance) = &events[0] else {
            panic!("expected a sealed utterance, got {events:?}");
        };
        assert_eq!(utterance.pcm.len(), 40 * FRAME_SAMPLES * 2);
    }

    #[test]
    fn tone_between_silence_yields_one_spanning_utterance() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());

        // Roughly 1.5s of silence, 2s of tone, then 1.2s of silence.
        let mut events = run(&mut segmenter, 0, 47);
        events.extend(run(&mut segmenter, 63, 38));

        assert_eq!(events.len(), 1);
        let SegmenterEvent::Sealed(utterance) = &events[0] else {
            panic!("expected a sealed utterance, got {events:?}");
        };

        assert_eq!(utterance.start_ms, 47 * FRAME_MS);
        assert_eq!(utterance.end_ms, (47 + 63) as u64 * FRAME_MS);

        // Within one frame of 2.0s worth of PCM bytes.
        let expected = 2 * 16_000 * 2;
        let actual = utterance.pcm.len() as i64;
        assert!((actual - expected).abs() <= (FRAME_SAMPLES * 2) as i64);
    }

    #[test]
    fn finish_flushes_buffered_speech() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());
        run(&mut segmenter, 40, 0);

        let event = segmenter.finish().expect("a buffered span was pending");
        let SegmenterEvent::Sealed(utterance) = event else {
            panic!("expected a sealed utterance");
        };
        assert_eq!(utterance.duration_ms(), 40 * FRAME_MS);
        assert!(!segmenter.is_capturing());
    }

    #[test]
    fn finish_rejects_short_spans() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());
        run(&mut segmenter, 5, 0);

        assert_eq!(
            segmenter.finish(),
            Some(SegmenterEvent::Rejected(SegmentError::TooShort {
                duration_ms: 5 * FRAME_MS,
            }))
        );
    }

    #[test]
    fn odd_trailing_byte_is_dropped_not_buffered() {
        let mut segmenter = VoiceSegmenter::new(SegmenterConfig::default());
        let mut frame = tone_frame();
        frame.push(0x7f);

        for _ in 0..40 {
            segmenter.push_frame(&frame);
        }
        let Some(SegmenterEvent::Sealed(utterance)) = segmenter.finish() else {
            panic!("expected a sealed utterance");
        };
        assert_eq!(utterance.pcm.len() % 2, 0);
        assert_eq!(utterance.pcm.len(), 40 * FRAME_SAMPLES * 2);
    }
}
