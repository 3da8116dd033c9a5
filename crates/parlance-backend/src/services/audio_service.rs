use parlance_bridge::{audio::InputDevice, notification::NotificationType};

/// Handles an incoming audio devices list request (see
/// [`parlance_bridge::MessageToBackend::AudioDevicesListRequest`]).
pub async fn handle_audio_devices_list_request(context: super::AppContextHandle) {
    let (config, host) = {
        let state = context.state.read().await;
        (state.config.clone(), state.active_host.clone())
    };

    let devices = match parlance_audio::device::list_host_input_devices(&host) {
        Ok(devices) => devices,
        Err(error) => {
            log::error!("Could not enumerate input devices: {error}");
            context
                .send_notification(
                    NotificationType::Error,
                    "Could not read the list of input devices.",
                )
                .await;
            return;
        }
    };

    let response_devices: Vec<InputDevice> = devices
        .iter()
        .map(|device| InputDevice {
            id: device.id.to_string(),
            description: device.description.clone(),
            selected: config.audio_device_config.selected_device_id
                == Some(device.id.to_string()),
        })
        .collect();

    context
        .send(parlance_bridge::MessageFromBackend::AudioDevicesListResponse(
            response_devices,
        ))
        .await;
}

/// Handles an audio device selection request and persists it to config.
pub async fn handle_audio_device_selection(context: super::AppContextHandle, id: String) {
    let active_host = {
        let state = context.state.read().await;
        state.active_host.clone()
    };

    let audio_device = match parlance_audio::device::get_device_by_id(&active_host, id.clone()) {
        Ok(device) => device,
        Err(error) => {
            log::error!("Could not look up device {id}: {error}");
            context
                .send_notification(NotificationType::Error, "Unknown input device identifier.")
                .await;
            return;
        }
    };

    match audio_device {
        Some(device) => {
            let mut state = context.state.write().await;
            state.active_audio_device = std::sync::Arc::new(Some(device));
            state.config.audio_device_config.selected_device_id = Some(id);
            // persist the updated selection so it is remembered across runs
            if let Err(error) = crate::config::save_config(&state.config).await {
                log::error!("Could not persist the selected device: {error}");
            }
        }
        None => log::error!("Could not find the target device at {}", id),
    }
}
