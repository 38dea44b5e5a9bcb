//! Simulated PWM peripheral
//!
//! The simulation keeps per-channel duty state and a call log so that
//! callers can assert exactly which hardware operations were issued.

pub mod backend;

pub use backend::{Call, Operation, SimBackend, MAX_CALLS, MAX_SIM_CHANNELS, MAX_SIM_PINS};
