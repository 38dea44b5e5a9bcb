//! Servo actuators
//!
//! A servo is the user-facing device. It holds at most one channel binding
//! at a time and moves between three states:
//!
//! ```text
//!              attach              detach
//! Unattached ─────────► Attached ─────────► Detached
//!                        ▲    │ set_position     │
//!                        │    └──────┘           │
//!                        └───────────────────────┘
//!                                attach
//! ```
//!
//! - [`Servo`] - positional servo (angle in, pulse width out)
//! - [`ContinuousServo`] - continuous-rotation servo (speed in)

pub mod continuous;
pub mod mapping;
pub mod positional;

pub use continuous::ContinuousServo;
pub use mapping::{position_to_pulse, pulse_to_position};
pub use positional::{Servo, ServoState};
