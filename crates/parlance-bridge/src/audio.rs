/// An input audio device as presented to the frontend.
#[derive(Debug, Clone)]
pub struct InputDevice {
    /// Stable identifier used to select the device.
    pub id: String,
    /// Human-readable device description.
    pub description: String,
    /// Whether this device is the currently configured capture source.
    pub selected: bool,
}
