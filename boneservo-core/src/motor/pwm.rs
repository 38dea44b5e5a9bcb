//! Duty-cycle motor output
//!
//! # Usage
//!
//! ```ignore
//! let mut motor = MotorPwm::new(&subsystem);
//! motor.attach(&PinId::new("P9_14").unwrap())?; // 8 kHz, 0 %
//! motor.set_duty(60)?;
//! motor.stop()?;
//! motor.detach()?;
//! ```
//!
//! Requests above the configured ceiling (78 % by default) are rejected
//! with [`Error::OutOfRange`] and never reach the hardware.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;

use boneservo_hal::{ChannelId, PinId, PwmBackend};

use crate::config::{ConfigError, MotorConfig};
use crate::error::Error;
use crate::lifecycle::{Attachment, Binding, Subsystem};
use crate::registry::ServoId;
use crate::servo::ServoState;

/// PWM-driven DC motor
pub struct MotorPwm<'s, M: RawMutex, B: PwmBackend> {
    attachment: Attachment<'s, M, B>,
    config: MotorConfig,
    /// Last commanded duty cycle (percent)
    duty: u8,
}

impl<'s, M: RawMutex, B: PwmBackend> MotorPwm<'s, M, B> {
    /// Create with the default 8 kHz / 78 % configuration
    pub fn new(subsystem: &'s Subsystem<M, B>) -> Self {
        Self::build(subsystem, MotorConfig::default())
    }

    /// Create with a custom configuration
    ///
    /// # Errors
    /// Any [`ConfigError`] reported by [`MotorConfig::validate`].
    pub fn with_config(
        subsystem: &'s Subsystem<M, B>,
        config: MotorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(subsystem, config))
    }

    fn build(subsystem: &'s Subsystem<M, B>, config: MotorConfig) -> Self {
        Self {
            attachment: Attachment::new(subsystem, "motor", config.detach),
            config,
            duty: 0,
        }
    }

    /// Motor identity
    pub fn id(&self) -> ServoId {
        self.attachment.id()
    }

    /// Motor configuration
    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServoState {
        self.attachment.state()
    }

    /// Check if the motor is attached
    pub fn is_attached(&self) -> bool {
        self.state() == ServoState::Attached
    }

    /// Pin the motor is attached to
    pub fn pin(&self) -> Option<&PinId> {
        self.attachment.live().map(Binding::pin)
    }

    /// Channel the motor is attached to
    pub fn channel(&self) -> Option<ChannelId> {
        self.attachment.live().map(Binding::channel)
    }

    /// Duty cycle on the line in percent, `None` if not attached
    ///
    /// Zero after [`MotorPwm::stop`].
    pub fn duty(&self) -> Option<u8> {
        self.attachment
            .live()
            .map(|binding| if binding.pulse_width_us() == 0 { 0 } else { self.duty })
    }

    /// High time on the line, `None` if not attached
    pub fn pulse_width_us(&self) -> Option<u32> {
        self.attachment.live().map(Binding::pulse_width_us)
    }

    /// Bind to `pin` at the configured period with the output at 0 %
    ///
    /// # Errors
    /// Same as [`Servo::attach`](crate::servo::Servo::attach).
    pub fn attach(&mut self, pin: &PinId) -> Result<(), Error> {
        self.attachment.attach(pin, self.config.period_us, 0)?;
        self.duty = 0;
        Ok(())
    }

    /// Drive `percent` of the period
    ///
    /// # Errors
    /// - [`Error::NotAttached`] if not attached
    /// - [`Error::OutOfRange`] above the configured ceiling; the backend is
    ///   not touched
    /// - [`Error::Backend`] if the write failed
    pub fn set_duty(&mut self, percent: u8) -> Result<(), Error> {
        self.attachment.require_attached()?;
        if percent > self.config.max_duty_percent {
            return Err(Error::OutOfRange);
        }

        let pulse_us = self.config.pulse_us(percent);
        self.attachment.program(pulse_us)?;
        self.duty = percent;

        debug!("motor {} -> {}% ({} us)", self.id().0, percent, pulse_us);
        Ok(())
    }

    /// Cut the drive but keep the binding
    pub fn stop(&mut self) -> Result<(), Error> {
        self.attachment.program(0)?;
        debug!("motor {} stopped", self.id().0);
        Ok(())
    }

    /// Stop output and release the binding
    ///
    /// # Errors
    /// - [`Error::NotAttached`] if not attached
    /// - [`Error::Backend`] if the backend failed; the motor stays attached
    pub fn detach(&mut self) -> Result<(), Error> {
        self.attachment.detach()
    }
}

impl<M: RawMutex, B: PwmBackend> fmt::Display for MotorPwm<'_, M, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "motor#{} {}", self.id().as_u32(), self.state())?;
        if let (Some(binding), Some(duty)) = (self.attachment.live(), self.duty()) {
            write!(
                f,
                ", pin: {}, channel: {}, duty: {}%",
                binding.pin(),
                binding.channel(),
                duty
            )?;
        }
        write!(f, ", period: {}us", self.config.period_us)
    }
}
