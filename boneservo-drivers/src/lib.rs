//! PWM backend implementations that need no hardware
//!
//! This crate provides implementations of the `boneservo-hal` backend
//! trait for host-side use:
//!
//! - Simulated PWM peripheral that records every call (tests, dry runs)

#![no_std]
#![deny(unsafe_code)]

pub mod sim;
