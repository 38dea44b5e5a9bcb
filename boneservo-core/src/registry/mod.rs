//! Pin registry
//!
//! Single source of truth for which pins are PWM-capable and which are
//! currently bound to a channel.

pub mod pins;

pub use pins::{PinRegistry, ServoId, MAX_CHANNELS, MAX_PWM_PINS};
