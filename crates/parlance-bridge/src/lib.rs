//! Communication bridge between the UI collaborator and the backend.
//!
//! This crate defines the types and protocols used to connect a user
//! interface with an asynchronous backend responsible for authenticated
//! dispatch, microphone capture, and voice-assistant calls.
//!
//! The design is deliberately lightweight and unidirectional:
//! - The frontend sends commands (e.g., log in, start capture, send a
//!   chat prompt).
//! - The backend pushes events (e.g., input level updates, transcripts,
//!   assistant replies, notifications).
//!
//! Communication happens over bounded [`tokio::sync::mpsc`] channels wrapped
//! in [`BridgeChannels`], providing back-pressure, async compatibility, and
//! clean separation of concerns.

pub mod audio;
pub mod config;
pub mod notification;

use tokio::sync::mpsc::{self, Receiver, Sender};

/// One user turn and the assistant's reply, as kept in the in-memory
/// conversation log.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// What the user said or typed.
    pub user_text: String,
    /// What the assistant answered.
    pub reply_text: String,
}

/// How a capture session is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Utterances are bounded by detected silence; capture keeps running
    /// until explicitly stopped.
    VoiceActivated,
    /// Capture is bounded by the user gesture; releasing flushes whatever
    /// speech was buffered.
    PushToTalk,
}

/// Messages emitted by the backend to inform the frontend of state updates.
///
/// These are typically sent in response to frontend requests or to push
/// asynchronous progress/events (e.g., level updates, notifications).
#[derive(Debug, Clone)]
pub enum MessageFromBackend {
    /// Generic message for all notifications in the application.
    NotificationMessage(notification::NotificationMessage),
    /// Response to the configuration request from the frontend.
    ConfigurationResponse(config::Config),
    AudioDevicesListResponse(Vec<audio::InputDevice>),
    /// Whether a stored credential pair is currently present.
    AuthStateUpdate { authenticated: bool },
    CaptureStarted,
    CaptureStopped,
    /// Normalized microphone level in `[0, 1]`, for input meters.
    InputLevelUpdate(f32),
    /// Transcript of one captured utterance.
    UtteranceTranscribed { text: String },
    /// The assistant's reply to a transcript or typed prompt.
    AssistantReply { text: String },
    TranslationResponse(Vec<String>),
    VisualQueryResponse { answer: String },
    /// Synthesized speech audio for a previously requested text.
    SpeechSynthesized(Vec<u8>),
    ConversationLogResponse(Vec<Exchange>),
}

/// Commands issued by the frontend to control or query the backend.
///
/// These messages drive the core functionality of the application.
#[derive(Debug, Clone)]
pub enum MessageToBackend {
    /// Request for the application configuration.
    ConfigurationRequest,
    AudioDevicesListRequest,
    SelectAudioDevice(String),
    LoginRequest { identity: String, device_token: String },
    LogoutRequest,
    StartCaptureRequest(CaptureMode),
    StopCaptureRequest,
    /// Send a typed prompt to the assistant.
    ChatRequest(String),
    TranslateRequest(Vec<String>),
    VisualQueryRequest { image: Vec<u8>, query: String },
    /// Request speech synthesis of the given text.
    SpeakRequest(String),
    ConversationLogRequest,
}

/// Paired `tokio::mpsc` channels for bidirectional communication between
/// frontend and backend.
pub struct BridgeChannels {
    /// Receiver used by the frontend to get messages from the backend.
    pub frontend_rx: Receiver<MessageFromBackend>,
    /// Sender used by the frontend to send commands to the backend.
    pub frontend_tx: Sender<MessageToBackend>,

    /// Receiver used by the backend to get commands from the frontend.
    pub backend_rx: Receiver<MessageToBackend>,
    /// Sender used by the backend to send events/responses to the frontend.
    pub backend_tx: Sender<MessageFromBackend>,
}

impl BridgeChannels {
    /// Creates a new pair of bridged channels with the given buffer capacity.
    pub fn new(buffer: usize) -> Self {
        let (to_backend_tx, to_backend_rx) = mpsc::channel(buffer);
        let (to_frontend_tx, to_frontend_rx) = mpsc::channel(buffer);
        Self {
            frontend_tx: to_backend_tx,
            frontend_rx: to_frontend_rx,
            backend_rx: to_backend_rx,
            backend_tx: to_frontend_tx,
        }
    }
}

impl Default for BridgeChannels {
    fn default() -> Self {
        Self::new(64)
    }
}
