use parlance_bridge::{MessageFromBackend, notification::NotificationType};

/// Handles a login request (see
/// [`parlance_bridge::MessageToBackend::LoginRequest`]).
pub async fn handle_login_request(
    context: super::AppContextHandle,
    identity: String,
    device_token: String,
) {
    let token_manager = {
        let state = context.state.read().await;
        state.token_manager.clone()
    };

    match token_manager.login(&identity, &device_token).await {
        Ok(_) => {
            context
                .send(MessageFromBackend::AuthStateUpdate {
                    authenticated: true,
                })
                .await;
            context
                .send_notification(NotificationType::Success, "Signed in.")
                .await;
        }
        Err(error) => {
            log::error!("Login failed: {error}");
            context
                .send(MessageFromBackend::AuthStateUpdate {
                    authenticated: false,
                })
                .await;
            context
                .send_notification(
                    NotificationType::Error,
                    format!("Could not sign in: {error}"),
                )
                .await;
        }
    }
}

/// Handles a logout request. A running capture session is stopped first so
/// its dispatch path does not race the credential teardown.
pub async fn handle_logout_request(context: super::AppContextHandle) {
    super::capture_service::handle_stop_capture_request(context.clone()).await;

    let token_manager = {
        let state = context.state.read().await;
        state.token_manager.clone()
    };

    match token_manager.logout() {
        Ok(()) => {
            context
                .send(MessageFromBackend::AuthStateUpdate {
                    authenticated: false,
                })
                .await;
            context
                .send_notification(NotificationType::Info, "Signed out.")
                .await;
        }
        Err(error) => {
            log::error!("Logout failed: {error}");
            context
                .send_notification(
                    NotificationType::Error,
                    format!("Could not clear stored credentials: {error}"),
                )
                .await;
        }
    }
}
