//! Micropush takes the output of an external code generator, rewrites its
//! preamble for the MicroPython runtime, and pushes the result onto a live
//! board over the serial port. It replaces the usual "unplug, copy, replug"
//! dance with a single command that interrupts whatever program is running,
//! uploads the new files, and restarts the board.
//!
//! The deployment side of `micropush` is implemented as a state machine.
//! State machines are implemented in terms of **states** and **transitions**
//! between them with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions should be permitted and as many errors
//!   should be detected at **compile-time**.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable. Any transition back to that state would create a new
//!   state.
//! * Data can be transferred from one state to the next by attaching it to the
//!   transition event. Such data is statically defined as part of the event
//!   type.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern. The `From` trait allows for a type to define how to create itself
//! from another type, providing an intuitive and simple mechanism for
//! converting `events` into new `states`. Only transitions for which the
//! `From` trait is implemented are authorized and any other transition would
//! be detected at compile-time as an error.
//!
//! The header rewriting side has no state at all: it is a pure function from
//! one line stream to another and can be run on a different machine than the
//! one the board is plugged into.

mod backend;
mod deploy;
mod link;
mod rewrite;
mod settings;
mod utils;

pub use backend::{AmpyBackend, BackendError, DeviceBackend};
pub use deploy::{factory, factory_with, DeploymentPipeline, TransferPlan};
pub use link::{ControlLink, SerialControlLink};
pub use rewrite::{rewrite, rewrite_to_string, PreambleSpec};
pub use settings::{Settings, SettingsBuilder};
pub use utils::wait_for_port;
