//! Pin and channel identifiers
//!
//! Pins are named the way the board silkscreen names them (`P9_14` is
//! header P9, pin 14). Channels are small integers chosen by the backend.

use core::fmt;

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length of a pin name
pub const MAX_PIN_NAME_LEN: usize = 16;

/// Physical pin identifier
///
/// Opaque and immutable once constructed; two identifiers are equal when
/// they name the same header position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct PinId(String<MAX_PIN_NAME_LEN>);

impl PinId {
    /// Create a pin identifier from its board name
    ///
    /// Returns `None` if the name is empty or longer than
    /// [`MAX_PIN_NAME_LEN`].
    pub fn new(name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        let mut s = String::new();
        s.push_str(name).ok()?;
        Some(Self(s))
    }

    /// Get the board name of the pin
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware PWM channel
///
/// Handed out by [`crate::PwmBackend::allocate_channel`] and only meaningful
/// to the backend that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// Get the channel number
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}
