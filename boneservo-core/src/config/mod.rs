//! Configuration types
//!
//! Construction-time actuator settings: pulse bounds, logical input range,
//! PWM period, motor duty ceiling and the line state left behind on detach.

#[cfg(feature = "toml")]
pub mod toml;
pub mod types;

pub use types::*;
