//! Subsystem lifecycle guard
//!
//! [`Subsystem`] owns the PWM backend, the pin registry and the enable
//! state. All of them sit behind one blocking mutex: the backend's register
//! set is shared across channels, so every backend access is serialized
//! through the same critical section and calls are applied in arrival
//! order.
//!
//! Servos borrow the subsystem; the subsystem never holds a reference to a
//! servo. Forced detach on [`Subsystem::disable`] therefore works by
//! invalidating bindings, which servos notice on their next operation.

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use boneservo_hal::{ChannelId, PinId, PwmBackend};

use crate::config::DetachPolicy;
use crate::error::Error;
use crate::registry::{PinRegistry, ServoId};

/// Enable epoch counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Generation(u32);

impl Generation {
    /// Get the raw counter value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Global PWM enable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubsystemState {
    #[default]
    Disabled,
    Enabled,
}

/// Exclusive channel binding
///
/// Handed to an actuator when it attaches. Not `Clone`: a binding moves
/// with its owner and is only given up by releasing it.
///
/// The binding tracks the pulse width last written through it, so it
/// always describes what the line is carrying.
#[derive(Debug, PartialEq, Eq)]
pub struct Binding {
    pin: PinId,
    channel: ChannelId,
    owner: ServoId,
    generation: Generation,
    period_us: u32,
    pulse_us: u32,
}

impl Binding {
    /// Pin the binding holds
    pub fn pin(&self) -> &PinId {
        &self.pin
    }

    /// Hardware channel driving the pin
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Servo that owns the binding
    pub fn owner(&self) -> ServoId {
        self.owner
    }

    /// Enable generation the binding was created under
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// PWM period the channel was allocated with
    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    /// Pulse width currently programmed on the channel
    pub fn pulse_width_us(&self) -> u32 {
        self.pulse_us
    }
}

/// State guarded by the subsystem mutex
struct Inner<B> {
    backend: B,
    state: SubsystemState,
    generation: Generation,
    registry: PinRegistry,
    next_servo: u32,
}

impl<B: PwmBackend> Inner<B> {
    fn check_enabled(&self) -> Result<(), Error> {
        match self.state {
            SubsystemState::Enabled => Ok(()),
            SubsystemState::Disabled => Err(Error::NotEnabled),
        }
    }

    /// Generation first, then enable state, then the registry entry
    fn check_binding(&self, binding: &Binding) -> Result<(), Error> {
        if binding.generation != self.generation {
            return Err(Error::StaleBinding);
        }
        self.check_enabled()?;
        if !self
            .registry
            .holds(&binding.pin, binding.channel, binding.owner)
        {
            return Err(Error::NotBound);
        }
        Ok(())
    }

    fn allocate(
        &mut self,
        owner: ServoId,
        pin: &PinId,
        period_us: u32,
    ) -> Result<Binding, Error> {
        self.check_enabled()?;
        let channel = self
            .registry
            .allocate(&mut self.backend, pin, owner, period_us)?;
        Ok(Binding {
            pin: pin.clone(),
            channel,
            owner,
            generation: self.generation,
            period_us,
            pulse_us: 0,
        })
    }
}

/// PWM subsystem lifecycle guard
///
/// `M` selects the critical section: `CriticalSectionRawMutex` when servos
/// are driven from several threads or interrupt contexts, `NoopRawMutex`
/// when everything runs in one context.
pub struct Subsystem<M: RawMutex, B: PwmBackend> {
    inner: Mutex<M, RefCell<Inner<B>>>,
}

impl<M: RawMutex, B: PwmBackend> Subsystem<M, B> {
    /// Wrap a backend; the subsystem starts disabled
    pub const fn new(backend: B) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                backend,
                state: SubsystemState::Disabled,
                generation: Generation(0),
                registry: PinRegistry::new(),
                next_servo: 0,
            })),
        }
    }

    /// Run `f` inside the critical section
    fn with<R>(&self, f: impl FnOnce(&mut Inner<B>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Start the PWM clock and open a new generation
    ///
    /// Not idempotent: re-enabling could reset hardware underneath live
    /// bindings, so a second call fails.
    ///
    /// # Errors
    /// - [`Error::AlreadyEnabled`] if already enabled
    /// - [`Error::Backend`] if the clock could not be started
    pub fn enable(&self) -> Result<Generation, Error> {
        self.with(|inner| {
            if inner.state == SubsystemState::Enabled {
                return Err(Error::AlreadyEnabled);
            }

            inner.backend.enable()?;
            inner.generation = inner.generation.next();
            let channels = inner.backend.channel_count();
            inner
                .registry
                .populate(inner.backend.capabilities(), channels);
            inner.state = SubsystemState::Enabled;

            info!(
                "PWM subsystem enabled ({}, {} channels)",
                inner.generation.0,
                inner.registry.capacity()
            );
            Ok(inner.generation)
        })
    }

    /// Detach every binding and stop the PWM clock
    ///
    /// Bindings are torn down even if the backend fails to release some of
    /// them. If stopping the clock fails the subsystem stays enabled (with
    /// no bindings) so the call can be retried.
    ///
    /// # Errors
    /// - [`Error::NotEnabled`] if already disabled
    /// - [`Error::Backend`] if the clock could not be stopped
    pub fn disable(&self) -> Result<(), Error> {
        self.with(|inner| {
            inner.check_enabled()?;

            let forced = inner.registry.release_all(&mut inner.backend);
            if forced > 0 {
                warn!("forced detach of {} bound channels", forced);
            }

            inner.backend.disable()?;
            inner.registry.clear();
            inner.state = SubsystemState::Disabled;

            info!("PWM subsystem disabled ({})", inner.generation.0);
            Ok(())
        })
    }

    /// Current enable state
    pub fn state(&self) -> SubsystemState {
        self.with(|inner| inner.state)
    }

    /// Check if the subsystem is enabled
    pub fn is_enabled(&self) -> bool {
        self.state() == SubsystemState::Enabled
    }

    /// Current generation (the one opened by the last `enable`)
    pub fn generation(&self) -> Generation {
        self.with(|inner| inner.generation)
    }

    /// Number of live bindings
    pub fn bound_count(&self) -> usize {
        self.with(|inner| inner.registry.bound_count())
    }

    /// Channel and owner currently bound to `pin`
    pub fn binding_for(&self, pin: &PinId) -> Option<(ChannelId, ServoId)> {
        self.with(|inner| inner.registry.binding_for(pin))
    }

    /// Check whether `pin` is PWM-capable in the current generation
    pub fn is_capable(&self, pin: &PinId) -> bool {
        self.with(|inner| inner.registry.is_capable(pin))
    }

    /// Check whether a binding can still be used
    pub fn is_live(&self, binding: &Binding) -> bool {
        self.with(|inner| inner.check_binding(binding).is_ok())
    }

    /// Access the backend inside the critical section
    #[cfg(test)]
    pub(crate) fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        self.with(|inner| f(&mut inner.backend))
    }

    /// Hand out a fresh actuator identity
    pub(crate) fn register_servo(&self) -> ServoId {
        self.with(|inner| {
            let id = ServoId(inner.next_servo);
            inner.next_servo = inner.next_servo.wrapping_add(1);
            id
        })
    }

    /// Reserve `pin` for `owner` without programming it
    #[cfg(test)]
    pub(crate) fn allocate(
        &self,
        owner: ServoId,
        pin: &PinId,
        period_us: u32,
    ) -> Result<Binding, Error> {
        self.with(|inner| inner.allocate(owner, pin, period_us))
    }

    /// Reserve `pin` at `period_us` and program its first pulse as one step
    ///
    /// If programming fails the allocation is rolled back before the error
    /// is returned, so no half-made binding is ever observable.
    ///
    /// # Errors
    /// [`Error::NotEnabled`], any registry allocation error, or
    /// [`Error::Backend`] if the first pulse could not be written.
    pub(crate) fn bind(
        &self,
        owner: ServoId,
        pin: &PinId,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<Binding, Error> {
        self.with(|inner| {
            let mut binding = inner.allocate(owner, pin, period_us)?;

            if let Err(e) = inner.backend.set_duty_cycle(binding.channel, pulse_us) {
                warn!(
                    "initial pulse on {} failed, rolling back: {}",
                    pin.as_str(),
                    e
                );
                if let Err(rollback) = inner.registry.release(&mut inner.backend, binding.channel)
                {
                    warn!(
                        "rollback of channel {} failed: {}",
                        binding.channel.index(),
                        rollback
                    );
                }
                return Err(e.into());
            }

            binding.pulse_us = pulse_us;
            Ok(binding)
        })
    }

    /// Program the pulse width of a bound channel
    ///
    /// # Errors
    /// - [`Error::StaleBinding`] if the binding predates the last enable
    /// - [`Error::NotEnabled`] if the subsystem is disabled
    /// - [`Error::NotBound`] if the binding was torn down
    /// - [`Error::Backend`] if the write failed; the recorded pulse is kept
    pub(crate) fn program(&self, binding: &mut Binding, pulse_us: u32) -> Result<(), Error> {
        self.with(|inner| {
            inner.check_binding(binding)?;
            inner.backend.set_duty_cycle(binding.channel, pulse_us)?;
            binding.pulse_us = pulse_us;
            Ok(())
        })
    }

    /// Stop output on a bound channel and free its pin
    ///
    /// With [`DetachPolicy::ZeroDuty`] a zero-width pulse is programmed
    /// first. If the release then fails, the previous pulse is written
    /// back inside the same critical section, so a binding that survives a
    /// failed release still matches the hardware. Should that write fail
    /// too, the binding records the zero pulse the line is left with.
    ///
    /// Errors are the same as [`Subsystem::program`]; on a backend failure
    /// the binding stays valid.
    pub(crate) fn release(
        &self,
        binding: &mut Binding,
        policy: DetachPolicy,
    ) -> Result<(), Error> {
        self.with(|inner| {
            inner.check_binding(binding)?;
            let zero_duty = policy == DetachPolicy::ZeroDuty;
            if zero_duty {
                inner.backend.set_duty_cycle(binding.channel, 0)?;
            }

            if let Err(e) = inner.registry.release(&mut inner.backend, binding.channel) {
                if zero_duty {
                    if let Err(restore) =
                        inner.backend.set_duty_cycle(binding.channel, binding.pulse_us)
                    {
                        warn!(
                            "channel {} stuck at zero duty: {}",
                            binding.channel.index(),
                            restore
                        );
                        binding.pulse_us = 0;
                    }
                }
                return Err(e);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boneservo_drivers::sim::{Call, Operation, SimBackend};
    use boneservo_hal::BackendError;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type TestSubsystem = Subsystem<NoopRawMutex, SimBackend>;

    const PERIOD: u32 = 20_000;

    fn pin(name: &str) -> PinId {
        PinId::new(name).unwrap()
    }

    fn subsystem() -> TestSubsystem {
        Subsystem::new(SimBackend::beaglebone())
    }

    #[test]
    fn test_starts_disabled() {
        let sys = subsystem();
        assert_eq!(sys.state(), SubsystemState::Disabled);
        assert_eq!(sys.generation(), Generation(0));
        assert!(!sys.is_capable(&pin("P9_14")));
    }

    #[test]
    fn test_enable_twice_fails() {
        let sys = subsystem();
        assert_eq!(sys.enable(), Ok(Generation(1)));
        assert_eq!(sys.enable(), Err(Error::AlreadyEnabled));
        assert_eq!(sys.generation(), Generation(1));
        assert_eq!(sys.with_backend(|b| b.count(Operation::Enable)), 1);
    }

    #[test]
    fn test_disable_twice_fails() {
        let sys = subsystem();
        assert_eq!(sys.disable(), Err(Error::NotEnabled));

        sys.enable().unwrap();
        assert_eq!(sys.disable(), Ok(()));
        assert_eq!(sys.disable(), Err(Error::NotEnabled));
        assert_eq!(sys.with_backend(|b| b.count(Operation::Disable)), 1);
    }

    #[test]
    fn test_generation_increments_per_enable() {
        let sys = subsystem();
        for expected in 1..=3 {
            assert_eq!(sys.enable(), Ok(Generation(expected)));
            sys.disable().unwrap();
        }
    }

    #[test]
    fn test_enable_populates_and_disable_tears_down_registry() {
        let sys = subsystem();
        sys.enable().unwrap();
        assert!(sys.is_capable(&pin("P9_14")));

        sys.disable().unwrap();
        assert!(!sys.is_capable(&pin("P9_14")));
    }

    #[test]
    fn test_failed_enable_leaves_state() {
        let sys = subsystem();
        sys.with_backend(|b| b.fail_next(Operation::Enable, BackendError::Io));

        assert_eq!(sys.enable(), Err(Error::Backend(BackendError::Io)));
        assert_eq!(sys.state(), SubsystemState::Disabled);
        assert_eq!(sys.generation(), Generation(0));
    }

    #[test]
    fn test_allocate_requires_enable() {
        let sys = subsystem();
        let id = sys.register_servo();
        assert_eq!(sys.allocate(id, &pin("P9_14"), PERIOD), Err(Error::NotEnabled));
        assert_eq!(sys.with_backend(|b| b.count(Operation::Allocate)), 0);
    }

    #[test]
    fn test_bind_programs_initial_pulse() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();

        let binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();
        assert_eq!(binding.owner(), id);
        assert_eq!(binding.generation(), Generation(1));
        assert_eq!(binding.period_us(), PERIOD);
        assert_eq!(binding.pulse_width_us(), 1_250);
        assert_eq!(
            sys.with_backend(|b| b.pulse_width_us(binding.channel())),
            Some(1_250)
        );
        assert!(sys.is_live(&binding));
    }

    #[test]
    fn test_bind_rolls_back_on_program_failure() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        sys.with_backend(|b| b.fail_next(Operation::SetDuty, BackendError::Io));

        let result = sys.bind(id, &pin("P9_14"), PERIOD, 1_250);
        assert_eq!(result, Err(Error::Backend(BackendError::Io)));
        assert_eq!(sys.bound_count(), 0);
        assert_eq!(sys.binding_for(&pin("P9_14")), None);
        assert_eq!(sys.with_backend(|b| b.allocated_channels()), 0);
    }

    #[test]
    fn test_stale_binding_after_reenable() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut old = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();

        sys.disable().unwrap();
        sys.enable().unwrap();
        sys.with_backend(|b| b.clear_calls());

        assert!(!sys.is_live(&old));
        assert_eq!(sys.program(&mut old, 1_500), Err(Error::StaleBinding));
        assert_eq!(
            sys.release(&mut old, DetachPolicy::StopOutput),
            Err(Error::StaleBinding)
        );
        assert!(sys.with_backend(|b| b.calls().is_empty()));
    }

    #[test]
    fn test_program_after_disable_is_not_enabled() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();

        sys.disable().unwrap();
        assert_eq!(sys.program(&mut binding, 1_500), Err(Error::NotEnabled));
    }

    #[test]
    fn test_release_twice_is_not_bound() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut binding = sys.allocate(id, &pin("P9_14"), PERIOD).unwrap();

        sys.release(&mut binding, DetachPolicy::StopOutput).unwrap();
        assert_eq!(
            sys.release(&mut binding, DetachPolicy::StopOutput),
            Err(Error::NotBound)
        );
    }

    #[test]
    fn test_release_zero_duty_policy() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();
        let ch = binding.channel();
        sys.with_backend(|b| b.clear_calls());

        sys.release(&mut binding, DetachPolicy::ZeroDuty).unwrap();
        sys.with_backend(|b| {
            assert_eq!(
                b.calls(),
                &[
                    Call::SetDuty {
                        channel: ch,
                        pulse_width_us: 0,
                    },
                    Call::Release(ch),
                ]
            );
        });
    }

    #[test]
    fn test_program_records_pulse() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();

        sys.program(&mut binding, 1_800).unwrap();
        assert_eq!(binding.pulse_width_us(), 1_800);

        sys.with_backend(|b| b.fail_next(Operation::SetDuty, BackendError::Io));
        assert_eq!(
            sys.program(&mut binding, 600),
            Err(Error::Backend(BackendError::Io))
        );
        assert_eq!(binding.pulse_width_us(), 1_800);
    }

    #[test]
    fn test_failed_zero_duty_release_restores_pulse() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();
        let ch = binding.channel();
        sys.with_backend(|b| {
            b.clear_calls();
            b.fail_next(Operation::Release, BackendError::Io);
        });

        assert_eq!(
            sys.release(&mut binding, DetachPolicy::ZeroDuty),
            Err(Error::Backend(BackendError::Io))
        );
        assert!(sys.is_live(&binding));
        assert_eq!(binding.pulse_width_us(), 1_250);
        sys.with_backend(|b| {
            assert_eq!(b.pulse_width_us(ch), Some(1_250));
            assert_eq!(
                b.calls(),
                &[
                    Call::SetDuty {
                        channel: ch,
                        pulse_width_us: 0,
                    },
                    Call::Release(ch),
                    Call::SetDuty {
                        channel: ch,
                        pulse_width_us: 1_250,
                    },
                ]
            );
        });
    }

    #[test]
    fn test_failed_restore_records_zero_pulse() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let mut binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();
        let ch = binding.channel();

        // Zero pulse goes through, release fails, restore fails
        sys.with_backend(|b| {
            b.fail_next(Operation::Release, BackendError::Io);
            b.fail_after(Operation::SetDuty, 1, BackendError::Io);
        });

        assert_eq!(
            sys.release(&mut binding, DetachPolicy::ZeroDuty),
            Err(Error::Backend(BackendError::Io))
        );
        assert!(sys.is_live(&binding));
        assert_eq!(binding.pulse_width_us(), 0);
        assert_eq!(sys.with_backend(|b| b.pulse_width_us(ch)), Some(0));
    }

    #[test]
    fn test_disable_releases_every_binding() {
        let sys = subsystem();
        sys.enable().unwrap();
        for name in ["P9_14", "P9_16", "P8_13"] {
            let id = sys.register_servo();
            sys.bind(id, &pin(name), PERIOD, 1_250).unwrap();
        }
        assert_eq!(sys.bound_count(), 3);

        sys.disable().unwrap();
        assert_eq!(sys.bound_count(), 0);
        sys.with_backend(|b| {
            assert_eq!(b.count(Operation::Release), 3);
            assert_eq!(b.allocated_channels(), 0);
            assert!(!b.is_enabled());
        });
    }

    #[test]
    fn test_failed_disable_can_be_retried() {
        let sys = subsystem();
        sys.enable().unwrap();
        let id = sys.register_servo();
        let binding = sys.bind(id, &pin("P9_14"), PERIOD, 1_250).unwrap();
        sys.with_backend(|b| b.fail_next(Operation::Disable, BackendError::Io));

        assert_eq!(sys.disable(), Err(Error::Backend(BackendError::Io)));
        assert!(sys.is_enabled());
        assert!(!sys.is_live(&binding));

        assert_eq!(sys.disable(), Ok(()));
        assert!(!sys.is_enabled());
    }

    #[test]
    fn test_servo_ids_are_unique() {
        let sys = subsystem();
        let a = sys.register_servo();
        let b = sys.register_servo();
        assert_ne!(a, b);
    }
}
