//! Boneservo Hardware Abstraction Layer
//!
//! This crate defines the PWM backend trait that board-specific crates
//! implement (Linux sysfs, in-memory simulation, ...). The servo core only
//! talks to hardware through [`PwmBackend`], so the same application code
//! runs against a real board or a simulated one.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (servo sweeps, scripts)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  boneservo-core (registry, servos)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  boneservo-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ boneservo-hal-│       │  boneservo-   │
//! │     sysfs     │       │ drivers (sim) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Types
//!
//! - [`pin::PinId`] - Board pin name (e.g. `"P9_14"`)
//! - [`pin::ChannelId`] - Hardware PWM channel handed out by a backend
//! - [`pwm::PwmBackend`] - Clock control and per-channel duty programming
//! - [`pwm::BackendError`] - Failures reported by a backend

#![no_std]
#![deny(unsafe_code)]

pub mod pin;
pub mod pwm;

// Re-export key types at crate root for convenience
pub use pin::{ChannelId, PinId, MAX_PIN_NAME_LEN};
pub use pwm::{BackendError, PwmBackend};
