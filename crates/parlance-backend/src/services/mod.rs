//! Backend service handlers for frontend-driven requests.
//!
//! This module groups async request handlers that operate on the shared
//! `AppContext`, perform side effects (network, capture, filesystem), and
//! emit results or notifications back to the frontend.

pub mod assist_service;
pub mod audio_service;
pub mod auth_service;
pub mod capture_service;
pub mod config_service;

use parlance_api::DispatchError;
use parlance_bridge::{MessageFromBackend, notification::NotificationType};

/// Represents a type that is used in all handlers as an application context.
pub(crate) type AppContextHandle = std::sync::Arc<crate::app::AppContext>;

/// Routes a failed dispatch call to the frontend.
///
/// An invalid session is announced as an auth-state change so the UI can
/// take the user back to login; everything else becomes an error
/// notification.
pub(crate) async fn report_dispatch_error(
    context: &AppContextHandle,
    operation: &str,
    error: DispatchError,
) {
    log::error!("The {operation} call failed: {error}");
    match error {
        DispatchError::Unauthenticated => {
            context
                .send(MessageFromBackend::AuthStateUpdate {
                    authenticated: false,
                })
                .await;
            context
                .send_notification(
                    NotificationType::Error,
                    "Your session has expired. Please sign in again.",
                )
                .await;
        }
        error => {
            context
                .send_notification(
                    NotificationType::Error,
                    format!("The {operation} request failed: {error}"),
                )
                .await;
        }
    }
}
