//! Subsystem lifecycle
//!
//! The PWM peripheral is enabled and disabled as a whole. Every enable
//! starts a new generation; bindings carry the generation they were created
//! under so that a binding from a previous enable cycle can be rejected
//! instead of touching hardware state that no longer exists.

mod attachment;
pub mod guard;

pub(crate) use attachment::Attachment;
pub use guard::{Binding, Generation, Subsystem, SubsystemState};
