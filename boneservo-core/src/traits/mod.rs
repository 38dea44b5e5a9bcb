//! Actuator abstraction traits
//!
//! These traits define the interface between application logic and the
//! concrete servo and motor variants, so motion code can be written once for any of
//! them.

pub mod actuator;

pub use actuator::Actuator;
