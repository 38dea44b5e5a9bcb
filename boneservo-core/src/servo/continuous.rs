//! Continuous-rotation servo
//!
//! Same wire protocol as a positional servo, but the pulse width selects a
//! speed instead of an angle. 0.0 is stop, -1.0 and 1.0 are full speed in
//! either direction.

use embassy_sync::blocking_mutex::raw::RawMutex;

use boneservo_hal::{PinId, PwmBackend};

use super::positional::{Servo, ServoState};
use crate::config::{ConfigError, ServoConfig};
use crate::error::Error;
use crate::lifecycle::Subsystem;

/// Continuous-rotation servo
pub struct ContinuousServo<'s, M: RawMutex, B: PwmBackend> {
    servo: Servo<'s, M, B>,
}

impl<'s, M: RawMutex, B: PwmBackend> ContinuousServo<'s, M, B> {
    /// Create with the default 1000-2000 µs pulse range
    pub fn new(subsystem: &'s Subsystem<M, B>) -> Self {
        Self {
            servo: Servo::build(subsystem, ServoConfig::continuous()),
        }
    }

    /// Create with a custom pulse range
    ///
    /// The stop pulse is the midpoint of the range.
    pub fn with_pulse_range(
        subsystem: &'s Subsystem<M, B>,
        min_us: u32,
        max_us: u32,
    ) -> Result<Self, ConfigError> {
        let config = ServoConfig::continuous().with_pulse_range(min_us, max_us);
        Self::with_config(subsystem, config)
    }

    /// Create from a full configuration
    ///
    /// The input range is forced to -1.0..=1.0.
    pub fn with_config(
        subsystem: &'s Subsystem<M, B>,
        config: ServoConfig,
    ) -> Result<Self, ConfigError> {
        let config = config.with_input_range(-1.0, 1.0);
        Ok(Self {
            servo: Servo::with_config(subsystem, config)?,
        })
    }

    /// Attach to `pin`, starting stopped
    pub fn attach(&mut self, pin: &PinId) -> Result<(), Error> {
        self.servo.attach(pin)
    }

    /// Set the rotation speed in -1.0..=1.0
    ///
    /// # Errors
    /// [`Error::OutOfRange`] for values outside -1.0..=1.0, otherwise as
    /// [`Servo::set_position`].
    pub fn set_speed(&mut self, speed: f32) -> Result<(), Error> {
        self.servo.set_position(speed)
    }

    /// Drive the stop pulse
    pub fn halt(&mut self) -> Result<(), Error> {
        self.servo.set_position(0.0)
    }

    /// Release the channel
    pub fn detach(&mut self) -> Result<(), Error> {
        self.servo.detach()
    }

    /// Last commanded speed, `None` if not attached
    pub fn speed(&self) -> Option<f32> {
        self.servo.position()
    }

    /// Current lifecycle state
    ///
    /// Reports `Detached` once a subsystem disable has invalidated the
    /// binding, same as [`Servo::state`].
    pub fn state(&self) -> ServoState {
        self.servo.state()
    }

    /// Check if the servo is attached
    pub fn is_attached(&self) -> bool {
        self.servo.is_attached()
    }

    /// Underlying positional servo
    pub fn inner(&self) -> &Servo<'s, M, B> {
        &self.servo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boneservo_drivers::sim::{Operation, SimBackend};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestSubsystem = Subsystem<NoopRawMutex, SimBackend>;

    fn pin(name: &str) -> PinId {
        PinId::new(name).unwrap()
    }

    fn enabled() -> TestSubsystem {
        let sys = Subsystem::new(SimBackend::beaglebone());
        sys.enable().unwrap();
        sys
    }

    #[test]
    fn test_attach_starts_stopped() {
        let sys = enabled();
        let mut servo = ContinuousServo::new(&sys);

        servo.attach(&pin("P8_13")).unwrap();
        assert_eq!(servo.speed(), Some(0.0));
        assert_eq!(servo.inner().pulse_width_us(), Some(1_500));
    }

    #[test]
    fn test_set_speed() {
        let sys = enabled();
        let mut servo = ContinuousServo::new(&sys);
        servo.attach(&pin("P8_13")).unwrap();
        let ch = servo.inner().channel().unwrap();

        servo.set_speed(1.0).unwrap();
        assert_eq!(sys.with_backend(|b| b.pulse_width_us(ch)), Some(2_000));

        servo.set_speed(-0.5).unwrap();
        assert_eq!(sys.with_backend(|b| b.pulse_width_us(ch)), Some(1_250));

        servo.halt().unwrap();
        assert_eq!(sys.with_backend(|b| b.pulse_width_us(ch)), Some(1_500));
        assert_eq!(servo.speed(), Some(0.0));
    }

    #[test]
    fn test_speed_out_of_range() {
        let sys = enabled();
        let mut servo = ContinuousServo::new(&sys);
        servo.attach(&pin("P8_13")).unwrap();
        sys.with_backend(|b| b.clear_calls());

        assert_eq!(servo.set_speed(1.5), Err(Error::OutOfRange));
        assert_eq!(sys.with_backend(|b| b.count(Operation::SetDuty)), 0);
    }

    #[test]
    fn test_custom_pulse_range() {
        let sys = enabled();
        let mut servo = ContinuousServo::with_pulse_range(&sys, 1_300, 1_700).unwrap();
        servo.attach(&pin("P8_13")).unwrap();
        assert_eq!(servo.inner().pulse_width_us(), Some(1_500));

        servo.set_speed(-1.0).unwrap();
        assert_eq!(servo.inner().pulse_width_us(), Some(1_300));

        assert!(matches!(
            ContinuousServo::with_pulse_range(&sys, 1_700, 1_300),
            Err(ConfigError::InvalidPulseRange)
        ));
    }

    #[test]
    fn test_state_follows_subsystem() {
        let sys = enabled();
        let mut servo = ContinuousServo::new(&sys);
        assert_eq!(servo.state(), ServoState::Unattached);
        assert!(!servo.is_attached());

        servo.attach(&pin("P8_13")).unwrap();
        assert_eq!(servo.state(), ServoState::Attached);
        assert!(servo.is_attached());

        sys.disable().unwrap();
        assert_eq!(servo.state(), ServoState::Detached);
        assert!(!servo.is_attached());
    }

    #[test]
    fn test_detach() {
        let sys = enabled();
        let mut servo = ContinuousServo::new(&sys);
        servo.attach(&pin("P8_13")).unwrap();

        servo.detach().unwrap();
        assert_eq!(servo.state(), ServoState::Detached);
        assert_eq!(servo.speed(), None);
        assert_eq!(servo.detach(), Err(Error::NotAttached));
    }
}
