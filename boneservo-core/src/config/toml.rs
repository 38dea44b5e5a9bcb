//! TOML board description
//!
//! Describes which servos and motors hang off which pins, so an application
//! can build its actuators from a file instead of code:
//!
//! ```toml
//! [pwm]
//! period_us = 20000
//!
//! [[servo]]
//! name = "pan"
//! pin = "P9_14"
//!
//! [[servo]]
//! name = "wheel"
//! pin = "P8_13"
//! kind = "continuous"
//! detach = "zero_duty"
//!
//! [[motor]]
//! name = "drive"
//! pin = "P9_16"
//! max_duty_percent = 60
//! ```
//!
//! Every field except `name` and `pin` is optional and falls back to the
//! defaults in [`ServoConfig`] or [`MotorConfig`]. The `[pwm]` period applies
//! to servos only; motors carry their own (8 kHz unless overridden).

use heapless::{String, Vec};
use serde::Deserialize;

use boneservo_hal::PinId;

use super::types::{ConfigError, DetachPolicy, MotorConfig, ServoConfig, DEFAULT_PERIOD_US};

/// Maximum number of servos in one board description
pub const MAX_SERVOS: usize = 8;

/// Maximum number of motors in one board description
pub const MAX_MOTORS: usize = 4;

/// Maximum length of a servo name
pub const MAX_SERVO_NAME_LEN: usize = 16;

/// `[pwm]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PwmSection {
    #[serde(default = "default_period_us")]
    pub period_us: u32,
}

fn default_period_us() -> u32 {
    DEFAULT_PERIOD_US
}

impl Default for PwmSection {
    fn default() -> Self {
        Self {
            period_us: DEFAULT_PERIOD_US,
        }
    }
}

/// Servo variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoKind {
    #[default]
    Positional,
    Continuous,
}

/// One `[[servo]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServoProfile {
    pub name: String<MAX_SERVO_NAME_LEN>,
    pub pin: PinId,
    #[serde(default)]
    pub kind: ServoKind,
    pub min_pulse_us: Option<u32>,
    pub max_pulse_us: Option<u32>,
    pub min_position: Option<f32>,
    pub max_position: Option<f32>,
    #[serde(default)]
    pub detach: DetachPolicy,
}

impl ServoProfile {
    /// Build the servo configuration for this entry
    ///
    /// # Errors
    /// Any [`ConfigError`] reported by [`ServoConfig::validate`].
    pub fn servo_config(&self, period_us: u32) -> Result<ServoConfig, ConfigError> {
        let mut config = match self.kind {
            ServoKind::Positional => ServoConfig::default(),
            ServoKind::Continuous => ServoConfig::continuous(),
        };

        if let Some(min_us) = self.min_pulse_us {
            config.pulse.min_us = min_us;
        }
        if let Some(max_us) = self.max_pulse_us {
            config.pulse.max_us = max_us;
        }
        // Continuous servos always take a speed in -1.0..=1.0
        if self.kind == ServoKind::Positional {
            if let Some(min) = self.min_position {
                config.input.min = min;
            }
            if let Some(max) = self.max_position {
                config.input.max = max;
            }
        }

        let config = config
            .with_period_us(period_us)
            .with_detach_policy(self.detach);
        config.validate()?;
        Ok(config)
    }
}

/// One `[[motor]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MotorProfile {
    pub name: String<MAX_SERVO_NAME_LEN>,
    pub pin: PinId,
    pub period_us: Option<u32>,
    pub max_duty_percent: Option<u8>,
    #[serde(default)]
    pub detach: DetachPolicy,
}

impl MotorProfile {
    /// Build the motor configuration for this entry
    ///
    /// # Errors
    /// Any [`ConfigError`] reported by [`MotorConfig::validate`].
    pub fn motor_config(&self) -> Result<MotorConfig, ConfigError> {
        let mut config = MotorConfig::default().with_detach_policy(self.detach);
        if let Some(period_us) = self.period_us {
            config = config.with_period_us(period_us);
        }
        if let Some(percent) = self.max_duty_percent {
            config = config.with_max_duty(percent);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parsed board description
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub pwm: PwmSection,
    #[serde(default, rename = "servo")]
    pub servos: Vec<ServoProfile, MAX_SERVOS>,
    #[serde(default, rename = "motor")]
    pub motors: Vec<MotorProfile, MAX_MOTORS>,
}

impl BoardConfig {
    /// Look up a servo entry by name
    pub fn servo(&self, name: &str) -> Option<&ServoProfile> {
        self.servos.iter().find(|s| s.name.as_str() == name)
    }

    /// Configuration for the named servo
    pub fn servo_config(&self, name: &str) -> Option<Result<ServoConfig, ConfigError>> {
        self.servo(name)
            .map(|profile| profile.servo_config(self.pwm.period_us))
    }

    /// Look up a motor entry by name
    pub fn motor(&self, name: &str) -> Option<&MotorProfile> {
        self.motors.iter().find(|m| m.name.as_str() == name)
    }

    /// Configuration for the named motor
    pub fn motor_config(&self, name: &str) -> Option<Result<MotorConfig, ConfigError>> {
        self.motor(name).map(MotorProfile::motor_config)
    }

    /// Every pin the description assigns, servos first
    fn pins(&self) -> impl Iterator<Item = &PinId> {
        self.servos
            .iter()
            .map(|s| &s.pin)
            .chain(self.motors.iter().map(|m| &m.pin))
    }
}

/// Parse and validate a board description
///
/// # Errors
/// - [`ConfigError::Parse`] for malformed TOML, unknown enum values, empty
///   names or more than [`MAX_SERVOS`] servos / [`MAX_MOTORS`] motors
/// - [`ConfigError::DuplicatePin`] if two actuators share a pin
/// - any per-servo or per-motor validation error
pub fn parse_board_config(input: &str) -> Result<BoardConfig, ConfigError> {
    let board: BoardConfig = ::toml::from_str(input).map_err(|_| {
        warn!("board description is not valid TOML");
        ConfigError::Parse
    })?;

    for (i, pin) in board.pins().enumerate() {
        if pin.as_str().is_empty() {
            return Err(ConfigError::Parse);
        }
        if board.pins().take(i).any(|other| other == pin) {
            warn!("pin {} assigned twice", pin.as_str());
            return Err(ConfigError::DuplicatePin);
        }
    }
    for servo in &board.servos {
        if servo.name.is_empty() {
            return Err(ConfigError::Parse);
        }
        servo.servo_config(board.pwm.period_us)?;
    }
    for motor in &board.motors {
        if motor.name.is_empty() {
            return Err(ConfigError::Parse);
        }
        motor.motor_config()?;
    }

    debug!(
        "board description: {} servos, {} motors",
        board.servos.len(),
        board.motors.len()
    );
    Ok(board)
}
