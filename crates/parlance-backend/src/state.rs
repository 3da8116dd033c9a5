use std::sync::Arc;

use parlance_api::{ApiClient, TokenManager};
use tokio::sync::watch;

/// Control surface of a running capture session.
///
/// The worker thread watches the stop signal; flipping it makes the worker
/// flush buffered speech, release the stream, and announce the stop over
/// the bridge. Dropping the handle without signalling leaves the worker
/// running, so the stop path always goes through the signal.
pub struct CaptureHandle {
    /// Cancellation signal observed by the capture worker.
    pub stop: watch::Sender<bool>,
}

/// The core application state that holds configuration, credentials, and
/// other shared resources.
///
/// This struct contains all the data that needs to be shared across async
/// tasks in the application.
///
/// It is designed to be wrapped in thread-safe, async-friendly concurrency
/// primitives (see [`SharedState`]) to allow safe concurrent reads and
/// occasional writes from multiple tasks.
pub struct State {
    /// The loaded application configuration.
    pub config: parlance_bridge::config::Config,
    /// Single owner of the stored credential and its refresh policy.
    pub token_manager: Arc<TokenManager>,
    /// Authenticated client for the remote assistant endpoints.
    pub api_client: Arc<ApiClient>,
    /// The audio host devices are enumerated from.
    pub active_host: Arc<cpal::Host>,
    /// Currently selected capture device, if any.
    pub active_audio_device: Arc<Option<cpal::Device>>,
    /// Running capture session, if any.
    pub capture: Option<CaptureHandle>,
    /// In-memory conversation log for the current run.
    pub conversation: Vec<parlance_bridge::Exchange>,
}

/// Thread-safe, async-friendly shared reference to the application [`State`].
///
/// This is the recommended way to pass state into async handlers, background
/// tasks, or any context where multiple tasks need read access (and occasional
/// write access).
pub type SharedState = Arc<tokio::sync::RwLock<State>>;
