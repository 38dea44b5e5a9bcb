//! Actuator capability trait
//!
//! Implemented by every actuator. `Position` is whatever the variant maps
//! onto its pulse range: an angle for [`Servo`], a speed for
//! [`ContinuousServo`], a duty cycle in percent for [`MotorPwm`].

use embassy_sync::blocking_mutex::raw::RawMutex;

use boneservo_hal::{PinId, PwmBackend};

use crate::error::Error;
use crate::motor::MotorPwm;
use crate::servo::{ContinuousServo, Servo};

/// Something that can be bound to a PWM pin and commanded
pub trait Actuator {
    /// Logical command type
    type Position: Copy;

    /// Bind to `pin` and drive the neutral command
    fn attach(&mut self, pin: &PinId) -> Result<(), Error>;

    /// Command a new position
    ///
    /// Out-of-range commands fail with [`Error::OutOfRange`] and never reach
    /// the hardware.
    fn set_position(&mut self, position: Self::Position) -> Result<(), Error>;

    /// Release the pin
    fn detach(&mut self) -> Result<(), Error>;

    /// Check if the actuator currently holds a binding
    fn is_attached(&self) -> bool;
}

impl<M: RawMutex, B: PwmBackend> Actuator for Servo<'_, M, B> {
    type Position = f32;

    fn attach(&mut self, pin: &PinId) -> Result<(), Error> {
        Servo::attach(self, pin)
    }

    fn set_position(&mut self, position: f32) -> Result<(), Error> {
        Servo::set_position(self, position)
    }

    fn detach(&mut self) -> Result<(), Error> {
        Servo::detach(self)
    }

    fn is_attached(&self) -> bool {
        Servo::is_attached(self)
    }
}

impl<M: RawMutex, B: PwmBackend> Actuator for ContinuousServo<'_, M, B> {
    type Position = f32;

    fn attach(&mut self, pin: &PinId) -> Result<(), Error> {
        ContinuousServo::attach(self, pin)
    }

    fn set_position(&mut self, speed: f32) -> Result<(), Error> {
        self.set_speed(speed)
    }

    fn detach(&mut self) -> Result<(), Error> {
        ContinuousServo::detach(self)
    }

    fn is_attached(&self) -> bool {
        ContinuousServo::is_attached(self)
    }
}

impl<M: RawMutex, B: PwmBackend> Actuator for MotorPwm<'_, M, B> {
    type Position = u8;

    fn attach(&mut self, pin: &PinId) -> Result<(), Error> {
        MotorPwm::attach(self, pin)
    }

    fn set_position(&mut self, duty: u8) -> Result<(), Error> {
        self.set_duty(duty)
    }

    fn detach(&mut self) -> Result<(), Error> {
        MotorPwm::detach(self)
    }

    fn is_attached(&self) -> bool {
        MotorPwm::is_attached(self)
    }
}
