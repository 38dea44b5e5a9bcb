//! Actuator side of a channel binding
//!
//! Every actuator goes through the same attach, program, detach cycle and
//! has to notice when a subsystem disable pulled its binding away. This
//! handle does that bookkeeping once; servos and motors only add their own
//! value mapping on top.

use embassy_sync::blocking_mutex::raw::RawMutex;

use boneservo_hal::{PinId, PwmBackend};

use super::guard::{Binding, Subsystem};
use crate::config::DetachPolicy;
use crate::error::Error;
use crate::registry::ServoId;
use crate::servo::ServoState;

pub(crate) struct Attachment<'s, M: RawMutex, B: PwmBackend> {
    subsystem: &'s Subsystem<M, B>,
    id: ServoId,
    /// Used in log lines ("servo", "motor")
    kind: &'static str,
    detach: DetachPolicy,
    binding: Option<Binding>,
    /// Set once the first binding has gone away
    was_attached: bool,
}

impl<'s, M: RawMutex, B: PwmBackend> Attachment<'s, M, B> {
    pub(crate) fn new(
        subsystem: &'s Subsystem<M, B>,
        kind: &'static str,
        detach: DetachPolicy,
    ) -> Self {
        Self {
            subsystem,
            id: subsystem.register_servo(),
            kind,
            detach,
            binding: None,
            was_attached: false,
        }
    }

    pub(crate) fn id(&self) -> ServoId {
        self.id
    }

    /// Lifecycle state; a binding invalidated by disable reads as detached
    pub(crate) fn state(&self) -> ServoState {
        match &self.binding {
            Some(binding) if self.subsystem.is_live(binding) => ServoState::Attached,
            Some(_) => ServoState::Detached,
            None if self.was_attached => ServoState::Detached,
            None => ServoState::Unattached,
        }
    }

    /// Binding, if the subsystem still honours it
    pub(crate) fn live(&self) -> Option<&Binding> {
        self.binding
            .as_ref()
            .filter(|binding| self.subsystem.is_live(binding))
    }

    /// Drop a binding the subsystem no longer honours
    fn forget(&mut self) {
        if let Some(binding) = self.binding.take() {
            warn!(
                "{} {} lost binding on {} (forced detach)",
                self.kind,
                self.id.0,
                binding.pin().as_str()
            );
            self.was_attached = true;
        }
    }

    /// Succeed only with a live binding, forgetting a dead one
    pub(crate) fn require_attached(&mut self) -> Result<(), Error> {
        let live = match &self.binding {
            Some(binding) => self.subsystem.is_live(binding),
            None => return Err(Error::NotAttached),
        };
        if !live {
            self.forget();
            return Err(Error::NotAttached);
        }
        Ok(())
    }

    /// Translate a channel-level failure on our own binding
    ///
    /// The subsystem can only invalidate a binding through disable; to the
    /// caller that is indistinguishable from having been detached.
    fn map_channel_error(&mut self, e: Error) -> Error {
        match e {
            Error::StaleBinding | Error::NotEnabled | Error::NotBound => {
                self.forget();
                Error::NotAttached
            }
            other => other,
        }
    }

    /// Bind to `pin` at `period_us` and drive `pulse_us`
    pub(crate) fn attach(
        &mut self,
        pin: &PinId,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<(), Error> {
        if self.require_attached().is_ok() {
            return Err(Error::AlreadyAttached);
        }

        let binding = self.subsystem.bind(self.id, pin, period_us, pulse_us)?;
        info!(
            "{} {} attached to {} on channel {}",
            self.kind,
            self.id.0,
            pin.as_str(),
            binding.channel().index()
        );
        self.binding = Some(binding);
        Ok(())
    }

    /// Write a pulse width on the live binding
    pub(crate) fn program(&mut self, pulse_us: u32) -> Result<(), Error> {
        self.require_attached()?;
        let subsystem = self.subsystem;
        let binding = self.binding.as_mut().ok_or(Error::NotAttached)?;
        let result = subsystem.program(binding, pulse_us);
        result.map_err(|e| self.map_channel_error(e))
    }

    /// Release the binding following the configured detach policy
    ///
    /// On a backend failure the binding is kept and still matches the
    /// hardware.
    pub(crate) fn detach(&mut self) -> Result<(), Error> {
        self.require_attached()?;
        let subsystem = self.subsystem;
        let binding = self.binding.as_mut().ok_or(Error::NotAttached)?;
        if let Err(e) = subsystem.release(binding, self.detach) {
            return Err(self.map_channel_error(e));
        }

        if let Some(binding) = self.binding.take() {
            info!(
                "{} {} detached from {}",
                self.kind,
                self.id.0,
                binding.pin().as_str()
            );
        }
        self.was_attached = true;
        Ok(())
    }
}

impl<M: RawMutex, B: PwmBackend> Drop for Attachment<'_, M, B> {
    fn drop(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            if let Err(e) = self.subsystem.release(&mut binding, self.detach) {
                debug!("{} {} release on drop: {}", self.kind, self.id.0, e);
            }
        }
    }
}
