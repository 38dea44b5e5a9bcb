//! Position to pulse width mapping
//!
//! Linear, order-preserving map from the logical input range onto the
//! hardware pulse bounds. Values outside the input range are rejected, not
//! clamped.

use crate::config::ServoConfig;
use crate::error::Error;

/// Map a logical position to a pulse width in microseconds
///
/// Rounds to the nearest microsecond. The result always lies within
/// `config.pulse`, and `v1 < v2` implies `pulse(v1) <= pulse(v2)`.
///
/// # Errors
/// [`Error::OutOfRange`] if `value` is outside `config.input` or NaN.
pub fn position_to_pulse(config: &ServoConfig, value: f32) -> Result<u32, Error> {
    let input = &config.input;
    if !input.contains(value) {
        return Err(Error::OutOfRange);
    }

    let fraction = (value - input.min) / (input.max - input.min);
    let offset = (fraction * config.pulse.span_us() as f32 + 0.5) as u32;

    Ok((config.pulse.min_us + offset).min(config.pulse.max_us))
}

/// Map a pulse width back to a logical position
///
/// Pulse widths outside the bounds are clamped to the range ends.
pub fn pulse_to_position(config: &ServoConfig, pulse_us: u32) -> f32 {
    let pulse = &config.pulse;
    let clamped = pulse_us.clamp(pulse.min_us, pulse.max_us);
    let fraction = (clamped - pulse.min_us) as f32 / pulse.span_us() as f32;

    config.input.min + fraction * (config.input.max - config.input.min)
}
