//! BeagleBone PWM pin table
//!
//! Maps header pins to the sysfs PWM device that drives them. Pins muxed to
//! the same `ehrpwm` module share a time base but are still separate
//! devices as far as sysfs is concerned.

/// A header pin and the sysfs device driving it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmPin {
    /// Header pin name, e.g. `"P9_14"`
    pub pin: &'static str,
    /// Directory name under the sysfs PWM root, e.g. `"ehrpwm.1:0"`
    pub device: &'static str,
}

impl PwmPin {
    pub const fn new(pin: &'static str, device: &'static str) -> Self {
        Self { pin, device }
    }
}

/// PWM-capable pins of the BeagleBone P8/P9 headers
pub const BEAGLEBONE_PWM_PINS: [PwmPin; 8] = [
    PwmPin::new("P8_13", "ehrpwm.2:1"),
    PwmPin::new("P8_19", "ehrpwm.2:0"),
    PwmPin::new("P9_14", "ehrpwm.1:0"),
    PwmPin::new("P9_16", "ehrpwm.1:1"),
    PwmPin::new("P9_31", "ehrpwm.0:0"),
    PwmPin::new("P9_29", "ehrpwm.0:1"),
    PwmPin::new("P9_42", "ecap.0"),
    PwmPin::new("P9_28", "ecap.2"),
];

/// Look up the device driving `pin`
pub fn device_for(pin: &str) -> Option<&'static str> {
    BEAGLEBONE_PWM_PINS
        .iter()
        .find(|p| p.pin == pin)
        .map(|p| p.device)
}
