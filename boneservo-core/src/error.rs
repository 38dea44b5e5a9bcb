//! Servo subsystem errors
//!
//! Every operation either succeeds with a defined post-state or returns one
//! of these and leaves the subsystem, registry and servo as they were.
//! Nothing is retried automatically.

use core::fmt;

use boneservo_hal::BackendError;

/// Errors from subsystem, registry and servo operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// `enable` called while the subsystem is already enabled
    AlreadyEnabled,
    /// Operation requires the subsystem to be enabled
    NotEnabled,
    /// Binding was created under a previous enable generation
    StaleBinding,
    /// Pin is not PWM-capable on this platform
    UnknownPin,
    /// Pin is already bound to another servo
    PinBusy,
    /// Every hardware channel is in use
    NoFreeChannel,
    /// Channel is not bound (double release)
    NotBound,
    /// Servo is not attached to a pin
    NotAttached,
    /// Servo is already attached; detach first
    AlreadyAttached,
    /// Position or pulse width outside the configured range
    OutOfRange,
    /// Failure reported by the PWM backend
    Backend(BackendError),
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyEnabled => f.write_str("PWM subsystem already enabled"),
            Error::NotEnabled => f.write_str("PWM subsystem not enabled"),
            Error::StaleBinding => f.write_str("binding belongs to a previous enable cycle"),
            Error::UnknownPin => f.write_str("pin is not PWM-capable"),
            Error::PinBusy => f.write_str("pin already bound to another servo"),
            Error::NoFreeChannel => f.write_str("no free PWM channel"),
            Error::NotBound => f.write_str("channel not bound"),
            Error::NotAttached => f.write_str("servo not attached to a pin"),
            Error::AlreadyAttached => f.write_str("servo already attached"),
            Error::OutOfRange => f.write_str("value outside configured range"),
            Error::Backend(e) => write!(f, "PWM backend error: {}", e),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Backend(e) => Some(e),
            _ => None,
        }
    }
}
