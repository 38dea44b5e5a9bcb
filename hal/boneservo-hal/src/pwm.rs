//! PWM backend abstraction
//!
//! A backend is the platform service that produces the electrical signal:
//! it starts and stops the PWM clock, hands out channels bound to physical
//! pins and programs the high time of each period.

use core::fmt;

use crate::pin::{ChannelId, PinId};

/// Errors reported by a PWM backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackendError {
    /// Reading or writing the underlying device failed
    Io,
    /// The device is held by another user (e.g. another process)
    Busy,
    /// The backend does not drive PWM on this pin
    UnsupportedPin,
    /// The channel was not handed out by this backend or is not allocated
    InvalidChannel,
    /// The pulse width does not fit in the PWM period
    InvalidPulseWidth,
    /// The PWM clock is not running
    NotEnabled,
    /// The requested PWM period is zero or not supported by the device
    InvalidPeriod,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            BackendError::Io => "PWM device I/O failed",
            BackendError::Busy => "PWM device is in use",
            BackendError::UnsupportedPin => "pin has no PWM output",
            BackendError::InvalidChannel => "invalid PWM channel",
            BackendError::InvalidPulseWidth => "pulse width exceeds PWM period",
            BackendError::NotEnabled => "PWM clock not enabled",
            BackendError::InvalidPeriod => "unsupported PWM period",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for BackendError {}

/// PWM peripheral backend
///
/// Implementations are not required to be reentrant; callers serialize all
/// access. Every call is expected to complete in bounded time and reports
/// failure through [`BackendError`] rather than blocking forever.
pub trait PwmBackend {
    /// Start the PWM clock / signal generator
    fn enable(&mut self) -> Result<(), BackendError>;

    /// Stop the PWM clock / signal generator
    fn disable(&mut self) -> Result<(), BackendError>;

    /// Pins that can carry a PWM signal on this platform
    fn capabilities(&self) -> &[PinId];

    /// Total number of channels the peripheral can drive at once
    fn channel_count(&self) -> usize;

    /// Bind a free channel to `pin` and set its period, in microseconds
    ///
    /// The channel comes up with a zero pulse width. Later duty writes are
    /// checked against this period.
    fn allocate_channel(&mut self, pin: &PinId, period_us: u32)
        -> Result<ChannelId, BackendError>;

    /// Stop output on `channel` and return it to the free pool
    ///
    /// What the line does afterwards (driven low, tri-stated) is platform
    /// convention.
    fn release_channel(&mut self, channel: ChannelId) -> Result<(), BackendError>;

    /// Program the high time of each period, in microseconds
    ///
    /// A pulse width of zero keeps the channel bound but emits no pulses.
    fn set_duty_cycle(&mut self, channel: ChannelId, pulse_width_us: u32)
        -> Result<(), BackendError>;

    /// Check whether `pin` appears in the capability table
    fn is_capable(&self, pin: &PinId) -> bool {
        self.capabilities().iter().any(|p| p == pin)
    }
}
