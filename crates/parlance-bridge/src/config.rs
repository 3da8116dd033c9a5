use serde::{Deserialize, Serialize};

/// Remote service endpoints and network policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined against.
    pub base_url: String,
    /// Optional session key forwarded on dispatch calls for server-side
    /// payload decryption.
    pub session_key: Option<String>,
    /// Connect/read timeout applied to every request, in seconds.
    pub timeout_secs: u64,
    /// Attempt budget for retried calls.
    pub max_retries: u32,
    /// Fixed delay between retried attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.parlance.dev".to_string(),
            session_key: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 2000,
        }
    }
}

/// Language pair used for transcription, chat, and translation calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanguageConfig {
    /// Language the user speaks, as a BCP-47-ish short code.
    pub source: String,
    /// Language replies and translations are requested in.
    pub target: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: "en".to_string(),
            target: "en".to_string(),
        }
    }
}

/// Tuning for voice-activity segmentation of the microphone stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Normalized energy above which a frame counts as voiced.
    pub min_energy_threshold: f32,
    /// Sustained silence that seals an utterance, in milliseconds.
    pub silence_duration_ms: u64,
    /// Minimum utterance duration; shorter spans are discarded, in
    /// milliseconds.
    pub min_utterance_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_energy_threshold: 0.03,
            silence_duration_ms: 1000,
            min_utterance_ms: 1000,
        }
    }
}

/// Parameters forwarded to the speech-synthesis endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeechConfig {
    pub voice: String,
    pub model: String,
    pub response_format: String,
    pub speed: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: "default".to_string(),
            model: "tts-1".to_string(),
            response_format: "mp3".to_string(),
            speed: 1.0,
        }
    }
}

/// Configuration for selecting specific audio devices.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AudioDeviceConfig {
    /// Identifier of the preferred audio input device.
    pub selected_device_id: Option<String>,
}

/// Global application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Remote API endpoints and retry/timeout policy.
    pub api: ApiConfig,
    /// Language pair for speech and text calls.
    pub languages: LanguageConfig,
    /// Voice-activity segmentation tuning.
    pub capture: CaptureConfig,
    /// Speech-synthesis parameters.
    pub speech: SpeechConfig,
    /// Configuration for audio devices for the host.
    pub audio_device_config: AudioDeviceConfig,
}
