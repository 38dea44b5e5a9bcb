//! Board-agnostic servo control logic
//!
//! This crate contains everything between the application and the PWM
//! backend that does not depend on a specific board:
//!
//! - Subsystem lifecycle guard (global PWM enable, generation counter)
//! - Pin registry (PWM-capable pins, exclusive channel bindings)
//! - Servo state machine (attach, position control, detach)
//! - Duty-cycle motor output sharing the same lifecycle
//! - Actuator capability trait and its servo and motor variants
//! - Configuration type definitions
//!
//! # Control flow
//!
//! ```ignore
//! let subsystem: Subsystem<CriticalSectionRawMutex, _> = Subsystem::new(backend);
//! subsystem.enable()?;
//!
//! let mut servo = Servo::new(&subsystem);
//! servo.attach(&PinId::new("P9_14").unwrap())?; // neutral pulse
//! servo.set_position(90.0)?;
//! servo.detach()?;
//!
//! subsystem.disable()?;
//! ```

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod motor;
pub mod registry;
pub mod servo;
pub mod traits;

pub use boneservo_hal::{BackendError, ChannelId, PinId, PwmBackend};
pub use error::Error;
pub use lifecycle::{Binding, Generation, Subsystem, SubsystemState};
pub use motor::MotorPwm;
pub use registry::{PinRegistry, ServoId};
pub use servo::{ContinuousServo, Servo, ServoState};
pub use traits::Actuator;
