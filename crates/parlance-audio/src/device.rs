use std::str::FromStr;

use cpal::{
    Device, Host,
    traits::{DeviceTrait, HostTrait},
};

/// Errors that can occur while configuring or creating an audio input device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Failed to enumerate audio input devices. This error occurs when the
    /// underlying audio backend fails to query the list of available input
    /// devices for the host.
    #[error("failed to read device's information: {0}")]
    ReadDevices(#[from] cpal::DevicesError),
    /// Failed to construct an input audio stream. This error is returned
    /// when the audio backend rejects the requested stream configuration,
    /// including the case where the device cannot capture mono 16-bit
    /// audio at the pipeline's sample rate.
    #[error("failed to build device input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    /// Failed to start a constructed input stream.
    #[error("failed to play device input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    /// Failed to parse the provided device ID. It may be incorrect or invalid.
    /// You should refer to CPAL's error for more information.
    #[error("failed to parse device id: {0}")]
    ReadDeviceId(#[from] cpal::DeviceIdError),
}

/// Represents parsed input audio device belonging to a specific host.
#[derive(Clone)]
pub struct HostInputDevice {
    /// Unique identifier of the device within the host.
    pub id: cpal::DeviceId,
    /// Human-readable device description.
    pub description: String,

    device: Device,
}

impl std::fmt::Display for HostInputDevice {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} ({})", self.description, self.id)
    }
}

impl From<Device> for HostInputDevice {
    fn from(device: Device) -> Self {
        Self {
            id: device.id().expect("failed to obtain device's id"),
            description: device
                .description()
                .expect("failed to obtain device's information")
                .to_string(),
            device,
        }
    }
}

/// Returns a list of all input audio devices available on the given host.
///
/// This function queries the provided [`cpal::Host`] for all input-capable
/// audio devices and returns their identifiers and display names.
pub fn list_host_input_devices(host: &Host) -> Result<Vec<HostInputDevice>, DeviceError> {
    Ok(host
        .input_devices()?
        .map(HostInputDevice::from)
        .collect())
}

/// Retrieves a specific audio device by its unique identifier within a given
/// host.
///
/// Attempts to look up an input or output device using a string
/// representation of its [`cpal::DeviceId`].
pub fn get_device_by_id(host: &Host, device_id: String) -> Result<Option<Device>, DeviceError> {
    let device_id = cpal::DeviceId::from_str(&device_id)?;
    Ok(host.device_by_id(&device_id))
}

/// Creates and returns a mono input stream at the given sample rate.
///
/// The capture pipeline runs at a single fixed rate end to end, so the
/// stream is requested directly in that format instead of the device's
/// default configuration. Devices that cannot provide it surface a
/// [`DeviceError::BuildStream`].
///
/// # Threading
///
/// Both `callback` and `error_callback` are executed on a real-time audio
/// thread. They must:
/// - Be fast and non-blocking.
/// - Avoid memory allocation.
/// - Avoid locks and I/O.
///
/// Blocking operations in callbacks may cause audio dropouts or undefined
/// behavior.
pub fn open_capture_stream<T>(
    input_device: &HostInputDevice,
    sample_rate: u32,
    mut callback: impl FnMut(&[T]) + Send + 'static,
    error_callback: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::Sample,
{
    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    Ok(input_device.device.build_input_stream(
        &config,
        move |data: &[T], _| callback(data),
        error_callback,
        None,
    )?)
}
