//! Application context and message dispatching utilities.
//!
//! The context contains the shared state and provides helpers for sending
//! responses and notifications back to the frontend bridge.

use std::sync::Arc;

use parlance_bridge::{MessageFromBackend, MessageToBackend};
use tokio::sync::mpsc::{Receiver, Sender};

use crate::services;
use crate::state::SharedState;

/// Shared application context passed to services and message handlers.
pub(crate) struct AppContext {
    /// Mutable runtime application state shared across services.
    pub state: SharedState,
    /// Outbound channel to the frontend bridge.
    pub tx: Sender<MessageFromBackend>,
}

impl AppContext {
    /// Read and dispatch messages from the frontend bridge until it closes.
    pub async fn consume_bridge_messages(self: &Arc<Self>, mut rx: Receiver<MessageToBackend>) {
        while let Some(message) = rx.recv().await {
            log::debug!("Got a frontend message: {message:?}");
            self.dispatch_message(message).await;
        }
    }

    /// Dispatches the received message from frontend down to individual
    /// service handlers.
    async fn dispatch_message(self: &Arc<Self>, message: MessageToBackend) {
        match message {
            MessageToBackend::ConfigurationRequest => {
                services::config_service::handle_config_request(self.clone()).await;
            }
            MessageToBackend::AudioDevicesListRequest => {
                services::audio_service::handle_audio_devices_list_request(self.clone()).await;
            }
            MessageToBackend::SelectAudioDevice(id) => {
                services::audio_service::handle_audio_device_selection(self.clone(), id).await;
            }
            MessageToBackend::LoginRequest {
                identity,
                device_token,
            } => {
                services::auth_service::handle_login_request(self.clone(), identity, device_token)
                    .await;
            }
            MessageToBackend::LogoutRequest => {
                services::auth_service::handle_logout_request(self.clone()).await;
            }
            MessageToBackend::StartCaptureRequest(mode) => {
                services::capture_service::handle_start_capture_request(self.clone(), mode).await;
            }
            MessageToBackend::StopCaptureRequest => {
                services::capture_service::handle_stop_capture_request(self.clone()).await;
            }
            MessageToBackend::ChatRequest(prompt) => {
                services::assist_service::handle_chat_request(self.clone(), prompt).await;
            }
            MessageToBackend::TranslateRequest(sentences) => {
                services::assist_service::handle_translate_request(self.clone(), sentences).await;
            }
            MessageToBackend::VisualQueryRequest { image, query } => {
                services::assist_service::handle_visual_query_request(self.clone(), image, query)
                    .await;
            }
            MessageToBackend::SpeakRequest(text) => {
                services::assist_service::handle_speak_request(self.clone(), text).await;
            }
            MessageToBackend::ConversationLogRequest => {
                services::assist_service::handle_conversation_log_request(self.clone()).await;
            }
        }
    }

    /// Send a message to the frontend bridge.
    pub async fn send(&self, message: MessageFromBackend) {
        self.tx
            .send(message)
            .await
            .expect("failed to send message to frontend");
    }

    /// Send message synchronously (blocking) to the frontend bridge.
    pub fn send_blocking(&self, message: MessageFromBackend) {
        self.tx
            .blocking_send(message)
            .expect("failed to blocking send message to frontend");
    }

    /// Send a notification message to the frontend bridge.
    pub async fn send_notification(
        &self,
        notification_type: parlance_bridge::notification::NotificationType,
        content: impl Into<String>,
    ) {
        self.send(MessageFromBackend::NotificationMessage(
            parlance_bridge::notification::NotificationMessage {
                notification_type,
                message: content.into(),
            },
        ))
        .await;
    }
}
