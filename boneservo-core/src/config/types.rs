//! Actuator configuration type definitions
//!
//! Servo defaults match an analog hobby servo on a BeagleBone: 500-2000 µs
//! pulses, 0-180° travel and a 20 ms (50 Hz) period. Motor defaults match a
//! DC motor driver fed with an 8 kHz duty-cycle signal.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default minimum pulse width (µs)
pub const DEFAULT_MIN_PULSE_US: u32 = 500;

/// Default maximum pulse width (µs)
pub const DEFAULT_MAX_PULSE_US: u32 = 2_000;

/// Default PWM period (µs, 50 Hz)
pub const DEFAULT_PERIOD_US: u32 = 20_000;

/// Default logical range (degrees)
pub const DEFAULT_MIN_DEGREES: f32 = 0.0;
pub const DEFAULT_MAX_DEGREES: f32 = 180.0;

/// Default motor PWM period (µs, 8 kHz)
pub const DEFAULT_MOTOR_PERIOD_US: u32 = 125;

/// Default motor duty ceiling (percent)
pub const DEFAULT_MOTOR_MAX_DUTY: u8 = 78;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Pulse bounds empty or inverted
    InvalidPulseRange,
    /// Input range empty, inverted or not finite
    InvalidInputRange,
    /// Maximum pulse does not fit in the PWM period
    PulseExceedsPeriod,
    /// Board description could not be parsed
    Parse,
    /// Two servos in a board description share a pin
    DuplicatePin,
    /// PWM period is zero
    InvalidPeriod,
    /// Duty ceiling is zero or above 100 %
    InvalidDutyLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigError::InvalidPulseRange => "pulse range must satisfy 0 < min < max",
            ConfigError::InvalidInputRange => "input range must be finite with min < max",
            ConfigError::PulseExceedsPeriod => "maximum pulse exceeds PWM period",
            ConfigError::Parse => "board description parse error",
            ConfigError::DuplicatePin => "pin assigned to more than one actuator",
            ConfigError::InvalidPeriod => "PWM period must be non-zero",
            ConfigError::InvalidDutyLimit => "duty limit must be within 1..=100 %",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for ConfigError {}

/// Hardware pulse width bounds, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulseRange {
    /// Pulse width at the minimum logical position
    pub min_us: u32,
    /// Pulse width at the maximum logical position
    pub max_us: u32,
}

impl PulseRange {
    pub const fn new(min_us: u32, max_us: u32) -> Self {
        Self { min_us, max_us }
    }

    /// Midpoint of the range, used as the power-up pulse
    pub const fn neutral_us(&self) -> u32 {
        self.min_us + (self.max_us - self.min_us) / 2
    }

    /// Width of the range
    pub const fn span_us(&self) -> u32 {
        self.max_us - self.min_us
    }

    /// Check if a pulse width lies within the bounds (inclusive)
    pub const fn contains(&self, pulse_us: u32) -> bool {
        pulse_us >= self.min_us && pulse_us <= self.max_us
    }
}

impl Default for PulseRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PULSE_US, DEFAULT_MAX_PULSE_US)
    }
}

/// Logical position range (degrees, normalized ratio, speed, ...)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InputRange {
    pub min: f32,
    pub max: f32,
}

impl InputRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Midpoint of the range
    pub fn midpoint(&self) -> f32 {
        self.min + (self.max - self.min) / 2.0
    }

    /// Check if a value lies within the range (inclusive); NaN never does
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for InputRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DEGREES, DEFAULT_MAX_DEGREES)
    }
}

/// What the line carries after `detach`
///
/// Platform dependent, so it is chosen explicitly per servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DetachPolicy {
    /// Release the channel and let the platform stop the output
    /// (sysfs: `run=0`, line idles low)
    #[default]
    StopOutput,
    /// Program a zero-width pulse before releasing the channel
    ZeroDuty,
}

/// Per-servo configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServoConfig {
    /// Hardware pulse bounds
    pub pulse: PulseRange,
    /// Logical position range mapped onto `pulse`
    pub input: InputRange,
    /// PWM period (µs)
    pub period_us: u32,
    /// Line state after detach
    pub detach: DetachPolicy,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pulse: PulseRange::default(),
            input: InputRange::default(),
            period_us: DEFAULT_PERIOD_US,
            detach: DetachPolicy::default(),
        }
    }
}

impl ServoConfig {
    /// Configuration for a continuous-rotation servo
    ///
    /// Input is a speed in -1.0..=1.0 with 0.0 (1500 µs) as stop.
    pub fn continuous() -> Self {
        Self {
            pulse: PulseRange::new(1_000, 2_000),
            input: InputRange::new(-1.0, 1.0),
            ..Self::default()
        }
    }

    /// Set the pulse bounds
    pub fn with_pulse_range(mut self, min_us: u32, max_us: u32) -> Self {
        self.pulse = PulseRange::new(min_us, max_us);
        self
    }

    /// Set the logical input range
    pub fn with_input_range(mut self, min: f32, max: f32) -> Self {
        self.input = InputRange::new(min, max);
        self
    }

    /// Set the PWM period
    pub fn with_period_us(mut self, period_us: u32) -> Self {
        self.period_us = period_us;
        self
    }

    /// Set the detach policy
    pub fn with_detach_policy(mut self, detach: DetachPolicy) -> Self {
        self.detach = detach;
        self
    }

    /// PWM frequency in Hz
    pub fn frequency_hz(&self) -> u32 {
        if self.period_us == 0 {
            0
        } else {
            1_000_000 / self.period_us
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pulse.min_us == 0 || self.pulse.min_us >= self.pulse.max_us {
            return Err(ConfigError::InvalidPulseRange);
        }
        if !self.input.min.is_finite()
            || !self.input.max.is_finite()
            || self.input.min >= self.input.max
        {
            return Err(ConfigError::InvalidInputRange);
        }
        if self.pulse.max_us >= self.period_us {
            return Err(ConfigError::PulseExceedsPeriod);
        }
        Ok(())
    }
}

/// Per-motor configuration
///
/// Motors take a duty cycle in percent rather than a pulse width. Requests
/// above `max_duty_percent` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorConfig {
    /// PWM period (µs)
    pub period_us: u32,
    /// Highest accepted duty cycle (percent)
    pub max_duty_percent: u8,
    /// Line state after detach
    pub detach: DetachPolicy,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            period_us: DEFAULT_MOTOR_PERIOD_US,
            max_duty_percent: DEFAULT_MOTOR_MAX_DUTY,
            detach: DetachPolicy::default(),
        }
    }
}

impl MotorConfig {
    /// Set the PWM period
    pub fn with_period_us(mut self, period_us: u32) -> Self {
        self.period_us = period_us;
        self
    }

    /// Set the duty ceiling
    pub fn with_max_duty(mut self, percent: u8) -> Self {
        self.max_duty_percent = percent;
        self
    }

    /// Set the detach policy
    pub fn with_detach_policy(mut self, detach: DetachPolicy) -> Self {
        self.detach = detach;
        self
    }

    /// PWM frequency in Hz
    pub fn frequency_hz(&self) -> u32 {
        if self.period_us == 0 {
            0
        } else {
            1_000_000 / self.period_us
        }
    }

    /// High time for `percent` of the period, rounded down
    pub fn pulse_us(&self, percent: u8) -> u32 {
        let pulse = u64::from(self.period_us) * u64::from(percent) / 100;
        u32::try_from(pulse).unwrap_or(self.period_us)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_us == 0 {
            return Err(ConfigError::InvalidPeriod);
        }
        if self.max_duty_percent == 0 || self.max_duty_percent > 100 {
            return Err(ConfigError::InvalidDutyLimit);
        }
        Ok(())
    }
}
