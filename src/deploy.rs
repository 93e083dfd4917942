//! `micropush` deployment pipeline.
//!
//! Drives a live board from "executing the old program" to "executing the
//! freshly compiled program": interrupt and soft-reboot over the serial
//! line, push the runtime and program files through the transfer backend,
//! then reset the board.
//!
//! **Example** - Executing the state machine event loop:
//! ```ignore
//! use micropush as mp;
//!
//! let settings = mp::SettingsBuilder::new().path("COM4").finalize();
//! let mut pipeline = mp::factory(settings);
//! let status = pipeline.run(); // status code returned after the `Exit` event
//! std::process::exit(status.into());
//! ```

mod events;
mod state_machine;
mod states;

pub use state_machine::{factory, factory_with, DeploymentPipeline};
pub use states::TransferPlan;
