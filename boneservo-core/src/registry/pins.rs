//! Pin registry implementation
//!
//! The registry holds the capability table copied from the backend at
//! enable time and one entry per live binding. It keeps only the owning
//! servo's id, never a reference to the servo itself.
//!
//! Invariants:
//! - each pin is bound to at most one channel
//! - each channel is bound to at most one servo
//! - the number of bindings never exceeds the backend's channel count

use core::fmt;

use heapless::Vec;

use boneservo_hal::{ChannelId, PinId, PwmBackend};

use crate::error::Error;

/// Maximum number of PWM-capable pins tracked
pub const MAX_PWM_PINS: usize = 32;

/// Maximum number of simultaneous bindings
pub const MAX_CHANNELS: usize = 16;

/// Identity of an actuator object (servo or motor)
///
/// Handed out by the subsystem; only used to tell owners apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoId(pub(crate) u32);

impl ServoId {
    /// Get the raw id
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "servo#{}", self.0)
    }
}

/// One live binding
#[derive(Debug, Clone)]
struct Entry {
    pin: PinId,
    channel: ChannelId,
    owner: ServoId,
}

/// Registry of PWM-capable pins and their bindings
#[derive(Debug)]
pub struct PinRegistry {
    capable: Vec<PinId, MAX_PWM_PINS>,
    entries: Vec<Entry, MAX_CHANNELS>,
    /// Channel capacity reported by the backend
    capacity: usize,
}

impl Default for PinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PinRegistry {
    /// Create an empty registry (no capable pins, no capacity)
    pub const fn new() -> Self {
        Self {
            capable: Vec::new(),
            entries: Vec::new(),
            capacity: 0,
        }
    }

    /// Load the capability table
    ///
    /// Drops any existing bindings. Pins beyond [`MAX_PWM_PINS`] are
    /// ignored and the capacity is capped at [`MAX_CHANNELS`].
    pub fn populate(&mut self, pins: &[PinId], channel_count: usize) {
        self.entries.clear();
        self.capable.clear();
        for pin in pins {
            if self.capable.push(pin.clone()).is_err() {
                warn!("capability table truncated at {} pins", MAX_PWM_PINS);
                break;
            }
        }
        self.capacity = channel_count.min(MAX_CHANNELS);
    }

    /// Tear down the capability table and all bindings
    pub fn clear(&mut self) {
        self.entries.clear();
        self.capable.clear();
        self.capacity = 0;
    }

    /// Check whether `pin` is PWM-capable
    pub fn is_capable(&self, pin: &PinId) -> bool {
        self.capable.iter().any(|p| p == pin)
    }

    /// Number of channels that may be bound at once
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live bindings
    pub fn bound_count(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Channel and owner bound to `pin`
    pub fn binding_for(&self, pin: &PinId) -> Option<(ChannelId, ServoId)> {
        self.entries
            .iter()
            .find(|e| &e.pin == pin)
            .map(|e| (e.channel, e.owner))
    }

    /// Owner of `channel`, if bound
    pub fn owner_of(&self, channel: ChannelId) -> Option<ServoId> {
        self.entries
            .iter()
            .find(|e| e.channel == channel)
            .map(|e| e.owner)
    }

    /// Check that `channel` is bound to `pin` on behalf of `owner`
    pub fn holds(&self, pin: &PinId, channel: ChannelId, owner: ServoId) -> bool {
        self.entries
            .iter()
            .any(|e| e.channel == channel && e.owner == owner && &e.pin == pin)
    }

    /// Reserve `pin` for `owner` and obtain a channel running at
    /// `period_us` from the backend
    ///
    /// # Errors
    /// - [`Error::UnknownPin`] if the pin is not in the capability table
    /// - [`Error::PinBusy`] if the pin is already bound
    /// - [`Error::NoFreeChannel`] if every channel is in use
    /// - [`Error::Backend`] if the backend refuses the allocation
    pub fn allocate<B: PwmBackend>(
        &mut self,
        backend: &mut B,
        pin: &PinId,
        owner: ServoId,
        period_us: u32,
    ) -> Result<ChannelId, Error> {
        if !self.is_capable(pin) {
            return Err(Error::UnknownPin);
        }
        if self.binding_for(pin).is_some() {
            return Err(Error::PinBusy);
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::NoFreeChannel);
        }

        let channel = backend.allocate_channel(pin, period_us)?;

        // A backend handing out a channel twice would alias two pins
        if self.owner_of(channel).is_some() {
            warn!("backend returned bound channel {}", channel.index());
            return Err(Error::NoFreeChannel);
        }

        let entry = Entry {
            pin: pin.clone(),
            channel,
            owner,
        };
        if self.entries.push(entry).is_err() {
            if let Err(e) = backend.release_channel(channel) {
                warn!("channel {} leaked: {}", channel.index(), e);
            }
            return Err(Error::NoFreeChannel);
        }

        trace!("{} bound to {} on channel {}", pin.as_str(), owner.0, channel.index());
        Ok(channel)
    }

    /// Return `channel` to the backend and free its pin
    ///
    /// Releasing a channel that is not bound is a caller bug and fails with
    /// [`Error::NotBound`]. If the backend fails, the binding is kept.
    pub fn release<B: PwmBackend>(
        &mut self,
        backend: &mut B,
        channel: ChannelId,
    ) -> Result<(), Error> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.channel == channel)
            .ok_or(Error::NotBound)?;

        backend.release_channel(channel)?;
        self.entries.swap_remove(idx);

        trace!("channel {} released", channel.index());
        Ok(())
    }

    /// Release every binding
    ///
    /// Bindings whose backend release fails are dropped anyway. Returns the
    /// number of bindings removed.
    pub fn release_all<B: PwmBackend>(&mut self, backend: &mut B) -> usize {
        let count = self.entries.len();
        while let Some(entry) = self.entries.pop() {
            if let Err(e) = backend.release_channel(entry.channel) {
                warn!(
                    "forced release of channel {} failed: {}",
                    entry.channel.index(),
                    e
                );
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boneservo_drivers::sim::{Operation, SimBackend};
    use boneservo_hal::BackendError;

    const PERIOD: u32 = 20_000;

    fn pin(name: &str) -> PinId {
        PinId::new(name).unwrap()
    }

    fn setup() -> (PinRegistry, SimBackend) {
        let mut backend = SimBackend::beaglebone();
        backend.enable().unwrap();
        let mut registry = PinRegistry::new();
        registry.populate(backend.capabilities(), backend.channel_count());
        (registry, backend)
    }

    #[test]
    fn test_populate() {
        let (registry, _) = setup();
        assert!(registry.is_capable(&pin("P9_14")));
        assert!(!registry.is_capable(&pin("P9_12")));
        assert_eq!(registry.capacity(), 8);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_allocate_unknown_pin() {
        let (mut registry, mut backend) = setup();
        let result = registry.allocate(&mut backend, &pin("P9_12"), ServoId(1), PERIOD);
        assert_eq!(result, Err(Error::UnknownPin));
        assert_eq!(backend.count(Operation::Allocate), 0);
    }

    #[test]
    fn test_allocate_busy_pin() {
        let (mut registry, mut backend) = setup();
        let ch = registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD)
            .unwrap();

        let result = registry.allocate(&mut backend, &pin("P9_14"), ServoId(2), PERIOD);
        assert_eq!(result, Err(Error::PinBusy));
        assert_eq!(registry.binding_for(&pin("P9_14")), Some((ch, ServoId(1))));
        assert_eq!(backend.count(Operation::Allocate), 1);
    }

    #[test]
    fn test_no_oversubscription() {
        let mut backend = SimBackend::beaglebone();
        backend.enable().unwrap();
        let mut registry = PinRegistry::new();
        registry.populate(backend.capabilities(), 2);

        registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD)
            .unwrap();
        registry
            .allocate(&mut backend, &pin("P9_16"), ServoId(2), PERIOD)
            .unwrap();
        let result = registry.allocate(&mut backend, &pin("P8_13"), ServoId(3), PERIOD);

        assert_eq!(result, Err(Error::NoFreeChannel));
        assert_eq!(registry.bound_count(), 2);
        assert_eq!(backend.allocated_channels(), 2);
    }

    #[test]
    fn test_allocate_programs_period() {
        let (mut registry, mut backend) = setup();
        let ch = registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), 125)
            .unwrap();
        assert_eq!(backend.period_us(ch), Some(125));

        let result = registry.allocate(&mut backend, &pin("P9_16"), ServoId(2), 0);
        assert_eq!(result, Err(Error::Backend(BackendError::InvalidPeriod)));
        assert_eq!(registry.bound_count(), 1);
    }

    #[test]
    fn test_backend_refusal_leaves_registry_untouched() {
        let (mut registry, mut backend) = setup();
        backend.fail_next(Operation::Allocate, BackendError::Busy);

        let result = registry.allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD);
        assert_eq!(result, Err(Error::Backend(BackendError::Busy)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_frees_pin() {
        let (mut registry, mut backend) = setup();
        let ch = registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD)
            .unwrap();

        registry.release(&mut backend, ch).unwrap();
        assert!(registry.is_empty());
        assert_eq!(backend.allocated_channels(), 0);

        // Pin can be bound again, by someone else
        registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(2), PERIOD)
            .unwrap();
    }

    #[test]
    fn test_double_release_is_not_bound() {
        let (mut registry, mut backend) = setup();
        let ch = registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD)
            .unwrap();

        registry.release(&mut backend, ch).unwrap();
        assert_eq!(registry.release(&mut backend, ch), Err(Error::NotBound));
        assert_eq!(backend.count(Operation::Release), 1);
    }

    #[test]
    fn test_release_failure_keeps_binding() {
        let (mut registry, mut backend) = setup();
        let ch = registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD)
            .unwrap();

        backend.fail_next(Operation::Release, BackendError::Io);
        assert_eq!(
            registry.release(&mut backend, ch),
            Err(Error::Backend(BackendError::Io))
        );
        assert!(registry.holds(&pin("P9_14"), ch, ServoId(1)));
    }

    #[test]
    fn test_release_all() {
        let (mut registry, mut backend) = setup();
        for (i, name) in ["P9_14", "P9_16", "P8_13"].iter().enumerate() {
            registry
                .allocate(&mut backend, &pin(name), ServoId(i as u32), PERIOD)
                .unwrap();
        }

        backend.fail_next(Operation::Release, BackendError::Io);
        assert_eq!(registry.release_all(&mut backend), 3);
        assert!(registry.is_empty());
        assert_eq!(backend.count(Operation::Release), 3);
    }

    #[test]
    fn test_clear() {
        let (mut registry, mut backend) = setup();
        registry
            .allocate(&mut backend, &pin("P9_14"), ServoId(1), PERIOD)
            .unwrap();

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.is_capable(&pin("P9_14")));
        assert_eq!(registry.capacity(), 0);
    }
}
