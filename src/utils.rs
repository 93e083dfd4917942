//! Helper functions to deal with serial ports.

mod keyboard;
mod ports;

pub(crate) use keyboard::poll_escape;
pub use ports::wait_for_port;
