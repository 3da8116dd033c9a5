//! Backend runtime setup and orchestration.
//!
//! This module wires together configuration, credentials, shared state, and
//! the message dispatch loop that listens to frontend bridge requests.

use std::{sync::Arc, thread, time::Duration};

use parlance_api::{
    ApiClient, AuthEndpoint, ClientConfig, FileCredentialStore, RetryPolicy, TokenManager,
    client::build_http_client,
};
use parlance_bridge::{MessageFromBackend, MessageToBackend};
use tokio::sync::{
    RwLock,
    mpsc::{Receiver, Sender},
};

use crate::app::AppContext;
use crate::state::State;

/// Initialize backend state and start processing frontend messages.
async fn setup_backend(rx: Receiver<MessageToBackend>, tx: Sender<MessageFromBackend>) {
    let config = crate::config::load_config()
        .await
        .expect("failed to load config");

    let http = build_http_client(Duration::from_secs(config.api.timeout_secs))
        .expect("failed to build http client");

    let credential_store = Arc::new(FileCredentialStore::new(
        crate::config::credentials_path().expect("failed to resolve credentials path"),
    ));
    let auth_endpoint = Arc::new(AuthEndpoint::new(http.clone(), config.api.base_url.clone()));
    let token_manager = Arc::new(TokenManager::new(credential_store, auth_endpoint));

    let api_client = Arc::new(ApiClient::new(
        http,
        ClientConfig {
            base_url: config.api.base_url.clone(),
            session_key: config.api.session_key.clone(),
            retry: RetryPolicy::new(
                config.api.max_retries,
                Duration::from_millis(config.api.retry_delay_ms),
            ),
        },
        token_manager.clone(),
    ));

    let active_host = Arc::new(cpal::default_host()); // using default host for now
    let active_audio_device = match config.audio_device_config.selected_device_id {
        Some(ref device_id) => {
            parlance_audio::device::get_device_by_id(&active_host, device_id.to_string())
                .expect("failed to get active audio device")
        }
        None => None,
    };

    let authenticated = token_manager.is_authenticated();

    let state = Arc::new(RwLock::new(State {
        config,
        token_manager,
        api_client,
        active_host,
        active_audio_device: Arc::new(active_audio_device),
        capture: None,
        conversation: Vec::new(),
    }));

    let context = Arc::new(AppContext { state, tx });

    // Let the frontend skip the login screen when a credential survived
    // the previous run.
    context
        .send(MessageFromBackend::AuthStateUpdate { authenticated })
        .await;

    context.consume_bridge_messages(rx).await;
}

/// Spawn the backend runtime and begin processing bridge messages.
pub fn run(rx: Receiver<MessageToBackend>, tx: Sender<MessageFromBackend>) {
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime");
        runtime.block_on(async { setup_backend(rx, tx).await });
    });
}
