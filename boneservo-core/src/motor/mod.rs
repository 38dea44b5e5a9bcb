//! Motor actuators
//!
//! A DC motor driver takes a fast PWM signal (8 kHz by default) whose duty
//! cycle sets the drive level. Same attach/detach lifecycle as a servo; the
//! command is a duty cycle in percent instead of a position.
//!
//! - [`MotorPwm`] - duty-cycle motor output with a configurable ceiling

pub mod pwm;

pub use pwm::MotorPwm;
