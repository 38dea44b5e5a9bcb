//! In-memory PWM backend
//!
//! Behaves like a board with a fixed capability table and channel pool:
//!
//! - Channels are handed out lowest-index first
//! - Each channel keeps the period it was allocated with and duty writes
//!   are checked against it
//! - Every call is appended to a log, including calls that fail
//! - A single failure can be injected per operation kind, optionally after
//!   a number of successful calls
//!
//! # Usage
//!
//! ```ignore
//! let mut sim = SimBackend::beaglebone();
//! sim.fail_next(Operation::SetDuty, BackendError::Io);
//! // ... drive the backend, then inspect sim.calls()
//! ```

use heapless::Vec;

use boneservo_hal::{BackendError, ChannelId, PinId, PwmBackend};

/// Maximum number of channels a simulated peripheral can expose
pub const MAX_SIM_CHANNELS: usize = 16;

/// Maximum number of PWM-capable pins in the capability table
pub const MAX_SIM_PINS: usize = 32;

/// Maximum number of calls kept in the log
pub const MAX_CALLS: usize = 256;

/// BeagleBone header pins with an ehrpwm/ecap output
const BEAGLEBONE_PINS: [&str; 8] = [
    "P8_13", "P8_19", "P9_14", "P9_16", "P9_31", "P9_29", "P9_42", "P9_28",
];

/// Backend operation kinds, used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Enable,
    Disable,
    Allocate,
    Release,
    SetDuty,
}

/// A recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Call {
    /// Clock started
    Enable,
    /// Clock stopped
    Disable,
    /// Channel requested for a pin (`None` if the request failed)
    Allocate {
        pin: PinId,
        period_us: u32,
        channel: Option<ChannelId>,
    },
    /// Channel returned to the pool
    Release(ChannelId),
    /// Pulse width programmed
    SetDuty {
        channel: ChannelId,
        pulse_width_us: u32,
    },
}

impl Call {
    fn operation(&self) -> Operation {
        match self {
            Call::Enable => Operation::Enable,
            Call::Disable => Operation::Disable,
            Call::Allocate { .. } => Operation::Allocate,
            Call::Release(_) => Operation::Release,
            Call::SetDuty { .. } => Operation::SetDuty,
        }
    }
}

/// Pending injected failure
#[derive(Debug, Clone, Copy)]
struct Failure {
    op: Operation,
    /// Calls of `op` still allowed to succeed first
    skip: usize,
    error: BackendError,
}

/// State of one allocated channel
#[derive(Debug, Clone)]
struct SimChannel {
    pin: PinId,
    period_us: u32,
    pulse_width_us: u32,
}

/// Simulated PWM peripheral
#[derive(Debug)]
pub struct SimBackend {
    pins: Vec<PinId, MAX_SIM_PINS>,
    channel_count: usize,
    enabled: bool,
    channels: [Option<SimChannel>; MAX_SIM_CHANNELS],
    calls: Vec<Call, MAX_CALLS>,
    /// Calls dropped because the log was full
    dropped_calls: usize,
    failures: Vec<Failure, 5>,
}

impl SimBackend {
    /// Create a simulated peripheral
    ///
    /// Pins beyond [`MAX_SIM_PINS`] are ignored and the channel count is
    /// capped at [`MAX_SIM_CHANNELS`].
    pub fn new(pins: &[PinId], channel_count: usize) -> Self {
        let mut table = Vec::new();
        for pin in pins.iter().take(MAX_SIM_PINS) {
            // Cannot fail: bounded by take()
            let _ = table.push(pin.clone());
        }

        Self {
            pins: table,
            channel_count: channel_count.min(MAX_SIM_CHANNELS),
            enabled: false,
            channels: Default::default(),
            calls: Vec::new(),
            dropped_calls: 0,
            failures: Vec::new(),
        }
    }

    /// Simulate the BeagleBone PWM pin set (8 pins, one channel each)
    pub fn beaglebone() -> Self {
        let mut pins: Vec<PinId, MAX_SIM_PINS> = Vec::new();
        for name in BEAGLEBONE_PINS {
            if let Some(pin) = PinId::new(name) {
                let _ = pins.push(pin);
            }
        }
        Self::new(&pins, BEAGLEBONE_PINS.len())
    }

    /// Make the next call of `op` fail with `error`
    ///
    /// The failing call is still recorded in the log.
    pub fn fail_next(&mut self, op: Operation, error: BackendError) {
        self.fail_after(op, 0, error);
    }

    /// Let `skip` calls of `op` succeed, then fail the next one with `error`
    pub fn fail_after(&mut self, op: Operation, skip: usize, error: BackendError) {
        self.failures.retain(|f| f.op != op);
        // One slot per operation kind, so this always fits
        let _ = self.failures.push(Failure { op, skip, error });
    }

    /// All calls recorded so far, oldest first
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of recorded calls of one kind
    pub fn count(&self, op: Operation) -> usize {
        self.calls.iter().filter(|c| c.operation() == op).count()
    }

    /// Number of calls that did not fit in the log
    pub fn dropped_calls(&self) -> usize {
        self.dropped_calls
    }

    /// Forget all recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
        self.dropped_calls = 0;
    }

    /// Check if the clock is running
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of channels currently allocated
    pub fn allocated_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.is_some()).count()
    }

    /// Pin bound to `channel`, if allocated
    pub fn pin_of(&self, channel: ChannelId) -> Option<&PinId> {
        self.slot(channel).map(|c| &c.pin)
    }

    /// Pulse width currently programmed on `channel`, if allocated
    pub fn pulse_width_us(&self, channel: ChannelId) -> Option<u32> {
        self.slot(channel).map(|c| c.pulse_width_us)
    }

    /// Period `channel` was allocated with, if allocated
    pub fn period_us(&self, channel: ChannelId) -> Option<u32> {
        self.slot(channel).map(|c| c.period_us)
    }

    fn slot(&self, channel: ChannelId) -> Option<&SimChannel> {
        self.channels
            .get(usize::from(channel.index()))
            .and_then(|c| c.as_ref())
    }

    fn record(&mut self, call: Call) {
        if self.calls.push(call).is_err() {
            self.dropped_calls += 1;
        }
    }

    fn injected(&mut self, op: Operation) -> Result<(), BackendError> {
        match self.failures.iter().position(|f| f.op == op) {
            Some(idx) if self.failures[idx].skip > 0 => {
                self.failures[idx].skip -= 1;
                Ok(())
            }
            Some(idx) => Err(self.failures.swap_remove(idx).error),
            None => Ok(()),
        }
    }

    fn try_allocate(&mut self, pin: &PinId, period_us: u32) -> Result<ChannelId, BackendError> {
        self.injected(Operation::Allocate)?;

        if !self.enabled {
            return Err(BackendError::NotEnabled);
        }
        if !self.is_capable(pin) {
            return Err(BackendError::UnsupportedPin);
        }
        if period_us == 0 {
            return Err(BackendError::InvalidPeriod);
        }

        let idx = self.channels[..self.channel_count]
            .iter()
            .position(|c| c.is_none())
            .ok_or(BackendError::Busy)?;

        self.channels[idx] = Some(SimChannel {
            pin: pin.clone(),
            period_us,
            pulse_width_us: 0,
        });
        Ok(ChannelId(idx as u8))
    }
}

impl PwmBackend for SimBackend {
    fn enable(&mut self) -> Result<(), BackendError> {
        self.record(Call::Enable);
        self.injected(Operation::Enable)?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BackendError> {
        self.record(Call::Disable);
        self.injected(Operation::Disable)?;
        self.enabled = false;
        Ok(())
    }

    fn capabilities(&self) -> &[PinId] {
        &self.pins
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn allocate_channel(
        &mut self,
        pin: &PinId,
        period_us: u32,
    ) -> Result<ChannelId, BackendError> {
        let result = self.try_allocate(pin, period_us);
        self.record(Call::Allocate {
            pin: pin.clone(),
            period_us,
            channel: result.ok(),
        });
        result
    }

    fn release_channel(&mut self, channel: ChannelId) -> Result<(), BackendError> {
        self.record(Call::Release(channel));
        self.injected(Operation::Release)?;

        let slot = self
            .channels
            .get_mut(usize::from(channel.index()))
            .ok_or(BackendError::InvalidChannel)?;
        if slot.take().is_none() {
            return Err(BackendError::InvalidChannel);
        }
        Ok(())
    }

    fn set_duty_cycle(
        &mut self,
        channel: ChannelId,
        pulse_width_us: u32,
    ) -> Result<(), BackendError> {
        self.record(Call::SetDuty {
            channel,
            pulse_width_us,
        });
        self.injected(Operation::SetDuty)?;

        if !self.enabled {
            return Err(BackendError::NotEnabled);
        }

        let slot = self
            .channels
            .get_mut(usize::from(channel.index()))
            .and_then(|c| c.as_mut())
            .ok_or(BackendError::InvalidChannel)?;
        if pulse_width_us > slot.period_us {
            return Err(BackendError::InvalidPulseWidth);
        }
        slot.pulse_width_us = pulse_width_us;
        Ok(())
    }
}
