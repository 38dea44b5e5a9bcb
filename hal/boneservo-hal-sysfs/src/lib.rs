//! Linux sysfs PWM backend for BeagleBone boards
//!
//! Implements [`boneservo_hal::PwmBackend`] on top of the legacy
//! `/sys/class/pwm` interface exposed by the AM335x `ehrpwm` and `ecap`
//! drivers:
//!
//! ```text
//! /sys/class/pwm/
//! ├── ehrpwm.1:0/        <- P9_14
//! │   ├── request        "free" or the current owner; write 1/0
//! │   ├── run            1 = output on, 0 = output off
//! │   ├── period_ns
//! │   └── duty_ns
//! ├── ehrpwm.1:1/        <- P9_16
//! └── ...
//! ```
//!
//! Each header pin has its own PWM device, so channels map one-to-one onto
//! entries of the pin table in [`pins`].

#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod backend;
pub mod pins;

pub use backend::{SysfsBackend, SYSFS_PWM_ROOT};
pub use pins::{PwmPin, BEAGLEBONE_PWM_PINS};
