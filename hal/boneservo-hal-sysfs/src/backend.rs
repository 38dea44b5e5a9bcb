//! Sysfs PWM backend
//!
//! Programming sequence per device:
//!
//! ```text
//! allocate:  read request == "free"  ->  request=1, run=0, period_ns=P
//! set duty:  duty_ns=D               ->  run=1 (first write only)
//! release:   run=0, request=0
//! ```
//!
//! All attribute values are in nanoseconds. The kernel driver has no
//! global clock switch, so `enable` only checks that the sysfs tree is
//! present and `disable` stops accepting channel operations.

use std::fs;
use std::path::{Path, PathBuf};

use boneservo_hal::{BackendError, ChannelId, PinId, PwmBackend};

use crate::pins::{PwmPin, BEAGLEBONE_PWM_PINS};

/// Default sysfs PWM root
pub const SYSFS_PWM_ROOT: &str = "/sys/class/pwm";

const ATTR_REQUEST: &str = "request";
const ATTR_RUN: &str = "run";
const ATTR_PERIOD: &str = "period_ns";
const ATTR_DUTY: &str = "duty_ns";

/// One pin of the capability table and its channel state
#[derive(Debug)]
struct Slot {
    device: &'static str,
    /// Set while the channel is allocated; true once output is running
    running: Option<bool>,
    /// Period written on allocation
    period_us: u32,
}

/// PWM backend driving the legacy `/sys/class/pwm` interface
#[derive(Debug)]
pub struct SysfsBackend {
    root: PathBuf,
    enabled: bool,
    pins: Vec<PinId>,
    slots: Vec<Slot>,
}

impl SysfsBackend {
    /// Backend for the given pin table under `root`
    ///
    /// Pins with names that do not fit a [`PinId`] are skipped.
    pub fn new(root: impl Into<PathBuf>, table: &[PwmPin]) -> Self {
        let mut pins = Vec::with_capacity(table.len());
        let mut slots = Vec::with_capacity(table.len());
        for entry in table {
            if let Some(pin) = PinId::new(entry.pin) {
                pins.push(pin);
                slots.push(Slot {
                    device: entry.device,
                    running: None,
                    period_us: 0,
                });
            }
        }

        Self {
            root: root.into(),
            enabled: false,
            pins,
            slots,
        }
    }

    /// BeagleBone pin table under [`SYSFS_PWM_ROOT`]
    pub fn beaglebone() -> Self {
        Self::new(SYSFS_PWM_ROOT, &BEAGLEBONE_PWM_PINS)
    }

    /// BeagleBone pin table under a custom root
    pub fn beaglebone_at(root: impl Into<PathBuf>) -> Self {
        Self::new(root, &BEAGLEBONE_PWM_PINS)
    }

    /// Sysfs root this backend writes under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// PWM period `channel` was allocated with
    pub fn period_us(&self, channel: ChannelId) -> Option<u32> {
        self.allocated(channel).ok().map(|s| s.period_us)
    }

    /// Sysfs device name behind `channel`
    pub fn device(&self, channel: ChannelId) -> Option<&'static str> {
        self.slots.get(usize::from(channel.index())).map(|s| s.device)
    }

    fn attr_path(&self, device: &str, attr: &str) -> PathBuf {
        self.root.join(device).join(attr)
    }

    fn read_attr(&self, device: &str, attr: &str) -> Result<String, BackendError> {
        fs::read_to_string(self.attr_path(device, attr)).map_err(|_| io_error(device, attr))
    }

    fn write_attr(&self, device: &str, attr: &str, value: u64) -> Result<(), BackendError> {
        trace!("{}/{} <- {}", device, attr, value);
        fs::write(self.attr_path(device, attr), format!("{value}\n"))
            .map_err(|_| io_error(device, attr))
    }

    fn check_enabled(&self) -> Result<(), BackendError> {
        if self.enabled {
            Ok(())
        } else {
            Err(BackendError::NotEnabled)
        }
    }

    /// Allocated slot behind `channel`
    fn allocated(&self, channel: ChannelId) -> Result<&Slot, BackendError> {
        self.slots
            .get(usize::from(channel.index()))
            .filter(|s| s.running.is_some())
            .ok_or(BackendError::InvalidChannel)
    }
}

fn io_error(device: &str, attr: &str) -> BackendError {
    warn!("sysfs {}/{} failed", device, attr);
    BackendError::Io
}

fn ns(us: u32) -> u64 {
    u64::from(us) * 1_000
}

impl PwmBackend for SysfsBackend {
    fn enable(&mut self) -> Result<(), BackendError> {
        if !self.root.is_dir() {
            warn!("sysfs PWM root missing");
            return Err(BackendError::Io);
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BackendError> {
        self.enabled = false;
        Ok(())
    }

    fn capabilities(&self) -> &[PinId] {
        &self.pins
    }

    fn channel_count(&self) -> usize {
        self.slots.len()
    }

    fn allocate_channel(
        &mut self,
        pin: &PinId,
        period_us: u32,
    ) -> Result<ChannelId, BackendError> {
        self.check_enabled()?;
        if period_us == 0 {
            return Err(BackendError::InvalidPeriod);
        }

        let index = self
            .pins
            .iter()
            .position(|p| p == pin)
            .ok_or(BackendError::UnsupportedPin)?;
        let slot = &self.slots[index];
        if slot.running.is_some() {
            return Err(BackendError::Busy);
        }
        let device = slot.device;

        // Another process (or a previous run that crashed) may hold it
        let request = self.read_attr(device, ATTR_REQUEST)?;
        if !request.contains("free") {
            warn!("{} requested by {}", device, request.trim());
            return Err(BackendError::Busy);
        }

        self.write_attr(device, ATTR_REQUEST, 1)?;
        let configured = self
            .write_attr(device, ATTR_RUN, 0)
            .and_then(|()| self.write_attr(device, ATTR_PERIOD, ns(period_us)));
        if let Err(e) = configured {
            if self.write_attr(device, ATTR_REQUEST, 0).is_err() {
                warn!("{} left requested after failed setup", device);
            }
            return Err(e);
        }

        let slot = &mut self.slots[index];
        slot.running = Some(false);
        slot.period_us = period_us;
        Ok(ChannelId(index as u8))
    }

    fn release_channel(&mut self, channel: ChannelId) -> Result<(), BackendError> {
        let device = self.allocated(channel)?.device;

        self.write_attr(device, ATTR_RUN, 0)?;
        self.write_attr(device, ATTR_REQUEST, 0)?;

        self.slots[usize::from(channel.index())].running = None;
        Ok(())
    }

    fn set_duty_cycle(
        &mut self,
        channel: ChannelId,
        pulse_width_us: u32,
    ) -> Result<(), BackendError> {
        self.check_enabled()?;
        let slot = self.allocated(channel)?;
        if pulse_width_us > slot.period_us {
            return Err(BackendError::InvalidPulseWidth);
        }
        let (device, running) = (slot.device, slot.running == Some(true));

        self.write_attr(device, ATTR_DUTY, ns(pulse_width_us))?;
        if !running {
            self.write_attr(device, ATTR_RUN, 1)?;
            self.slots[usize::from(channel.index())].running = Some(true);
        }
        Ok(())
    }
}
