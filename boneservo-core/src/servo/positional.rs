//! Positional servo
//!
//! Arduino-style interface: attach to a pin, write positions or raw pulse
//! widths, detach. Errors leave the servo in the state it was in before
//! the call.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;

use boneservo_hal::{ChannelId, PinId, PwmBackend};

use super::mapping::{position_to_pulse, pulse_to_position};
use crate::config::{ConfigError, ServoConfig};
use crate::error::Error;
use crate::lifecycle::{Attachment, Binding, Subsystem};
use crate::registry::ServoId;

/// Servo lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoState {
    /// Never attached
    Unattached,
    /// Bound to a channel and driving its pin
    Attached,
    /// Was attached; binding released (explicitly or by subsystem disable)
    Detached,
}

impl fmt::Display for ServoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServoState::Unattached => "unattached",
            ServoState::Attached => "attached",
            ServoState::Detached => "detached",
        })
    }
}

/// Positional hobby servo
///
/// Owned by the caller and borrows the [`Subsystem`]. The servo outlives
/// any number of attach/detach cycles; only its binding comes and goes.
/// Dropping an attached servo releases its binding.
pub struct Servo<'s, M: RawMutex, B: PwmBackend> {
    attachment: Attachment<'s, M, B>,
    config: ServoConfig,
    /// Last commanded logical position
    position: f32,
}

impl<'s, M: RawMutex, B: PwmBackend> Servo<'s, M, B> {
    /// Create a servo with the default configuration
    pub fn new(subsystem: &'s Subsystem<M, B>) -> Self {
        Self::build(subsystem, ServoConfig::default())
    }

    /// Create a servo with a custom configuration
    ///
    /// # Errors
    /// Any [`ConfigError`] reported by [`ServoConfig::validate`].
    pub fn with_config(
        subsystem: &'s Subsystem<M, B>,
        config: ServoConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(subsystem, config))
    }

    /// Create without validating `config`
    pub(super) fn build(subsystem: &'s Subsystem<M, B>, config: ServoConfig) -> Self {
        Self {
            attachment: Attachment::new(subsystem, "servo", config.detach),
            config,
            position: config.input.midpoint(),
        }
    }

    /// Servo identity
    pub fn id(&self) -> ServoId {
        self.attachment.id()
    }

    /// Servo configuration
    pub fn config(&self) -> &ServoConfig {
        &self.config
    }

    /// Current lifecycle state
    ///
    /// A servo whose binding was invalidated by a subsystem disable reports
    /// `Detached` even before its next operation.
    pub fn state(&self) -> ServoState {
        self.attachment.state()
    }

    /// Check if the servo is attached
    pub fn is_attached(&self) -> bool {
        self.state() == ServoState::Attached
    }

    /// Pin the servo is attached to
    pub fn pin(&self) -> Option<&PinId> {
        self.attachment.live().map(Binding::pin)
    }

    /// Channel the servo is attached to
    pub fn channel(&self) -> Option<ChannelId> {
        self.attachment.live().map(Binding::channel)
    }

    /// Last commanded logical position, `None` if not attached
    pub fn position(&self) -> Option<f32> {
        self.attachment.live().map(|_| self.position)
    }

    /// Pulse width on the line, `None` if not attached
    ///
    /// Zero after [`Servo::stop`].
    pub fn pulse_width_us(&self) -> Option<u32> {
        self.attachment.live().map(Binding::pulse_width_us)
    }

    /// Bind to `pin` and drive the neutral pulse
    ///
    /// The neutral pulse is the midpoint of the pulse range so the motor
    /// does not jump on power-up. The channel runs at the configured
    /// period.
    ///
    /// # Errors
    /// - [`Error::AlreadyAttached`] if attached
    /// - [`Error::NotEnabled`] if the subsystem is disabled
    /// - [`Error::UnknownPin`], [`Error::PinBusy`], [`Error::NoFreeChannel`]
    /// - [`Error::Backend`] if allocation or programming failed
    pub fn attach(&mut self, pin: &PinId) -> Result<(), Error> {
        let neutral = self.config.pulse.neutral_us();
        self.attachment.attach(pin, self.config.period_us, neutral)?;
        self.position = self.config.input.midpoint();
        Ok(())
    }

    /// Move to a logical position
    ///
    /// # Errors
    /// - [`Error::NotAttached`] if not attached
    /// - [`Error::OutOfRange`] if `value` is outside the input range; the
    ///   backend is not touched
    /// - [`Error::Backend`] if the write failed
    pub fn set_position(&mut self, value: f32) -> Result<(), Error> {
        self.attachment.require_attached()?;
        let pulse_us = position_to_pulse(&self.config, value)?;

        self.attachment.program(pulse_us)?;
        self.position = value;

        debug!("servo {} -> {} ({} us)", self.id().0, value, pulse_us);
        Ok(())
    }

    /// Program a raw pulse width in microseconds
    ///
    /// # Errors
    /// - [`Error::NotAttached`] if not attached
    /// - [`Error::OutOfRange`] if outside the configured pulse bounds
    /// - [`Error::Backend`] if the write failed
    pub fn set_pulse_width(&mut self, pulse_us: u32) -> Result<(), Error> {
        self.attachment.require_attached()?;
        if !self.config.pulse.contains(pulse_us) {
            return Err(Error::OutOfRange);
        }

        self.attachment.program(pulse_us)?;
        self.position = pulse_to_position(&self.config, pulse_us);

        debug!("servo {} -> {} us", self.id().0, pulse_us);
        Ok(())
    }

    /// Stop emitting pulses but keep the binding
    ///
    /// The next `set_position` or `set_pulse_width` resumes output.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.attachment.program(0)?;
        debug!("servo {} stopped", self.id().0);
        Ok(())
    }

    /// Stop output and release the binding
    ///
    /// The line state afterwards follows the configured
    /// [`DetachPolicy`](crate::config::DetachPolicy).
    ///
    /// # Errors
    /// - [`Error::NotAttached`] if not attached; no backend call is made
    /// - [`Error::Backend`] if the backend failed; the servo stays attached
    ///   and [`Servo::pulse_width_us`] still matches the line
    pub fn detach(&mut self) -> Result<(), Error> {
        self.attachment.detach()
    }
}

impl<M: RawMutex, B: PwmBackend> fmt::Display for Servo<'_, M, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.state())?;
        if let Some(binding) = self.attachment.live() {
            write!(
                f,
                ", pin: {}, channel: {}, pulse: {}us",
                binding.pin(),
                binding.channel(),
                binding.pulse_width_us()
            )?;
        }
        write!(f, ", period: {}us", self.config.period_us)
    }
}
