//! Serial control channel used to stop the running program and soft-reboot
//! the board before any file transfer.
//!
//! The MicroPython REPL line discipline understands two control bytes:
//! `0x03` (Ctrl-C) interrupts the running program and `0x04` (Ctrl-D)
//! soft-reboots the interpreter without power-cycling the hardware. This
//! sequence must be reproduced bit-exact; it is the only traffic `micropush`
//! ever puts on the wire itself.

use std::io::prelude::*;
use std::thread;

use log::{debug, info};
use serialport::SerialPort;

use crate::Settings;

/// Interrupts the running program. Sent twice: a program that is
/// mid-statement can absorb one interrupt without yielding control.
pub const INTERRUPT_BYTE: u8 = 0x03;

/// Soft-reboots the interpreter into its command-accepting state.
pub const SOFT_REBOOT_BYTE: u8 = 0x04;

// =============================================================================
// Public Interface
// =============================================================================

/// The control capability the deployment state machine needs from the serial
/// line. Abstracted so the state machine can be exercised with a fake link.
pub trait ControlLink {
    /// Interrupt whatever is running on the board and soft-reboot its
    /// interpreter. On return the serial handle is closed again; the
    /// transfer backend opens its own connection to the same port and cannot
    /// do so while ours is open.
    fn interrupt_and_reboot(&mut self, settings: &Settings) -> Result<(), serialport::Error>;
}

/// Production [`ControlLink`] over a real serial port.
pub struct SerialControlLink;
impl ControlLink for SerialControlLink {
    fn interrupt_and_reboot(&mut self, settings: &Settings) -> Result<(), serialport::Error> {
        let mut port = open_port(settings)?;

        port.write_all(&[INTERRUPT_BYTE])?;
        thread::sleep(settings.interrupt_settle);
        port.write_all(&[INTERRUPT_BYTE])?;
        thread::sleep(settings.interrupt_settle);

        port.write_all(&[SOFT_REBOOT_BYTE])?;
        thread::sleep(settings.reboot_settle);

        // Dropping the port closes it.
        info!("soft reset sent to {}", port.name().unwrap_or_default());
        Ok(())
    }
}

// =============================================================================
// Private stuff
// =============================================================================

fn open_port(settings: &Settings) -> Result<Box<dyn SerialPort>, serialport::Error> {
    use retry::{delay, retry_with_index};

    let result = retry_with_index(
        delay::Fixed::from_millis(1000).take(2),
        |index| -> Result<Box<dyn SerialPort>, serialport::Error> {
            debug!("Trying to connect {}", index);
            let path = settings.path.clone().unwrap_or_default();
            serialport::new(&path, settings.baud_rate)
                .timeout(settings.read_timeout)
                .open()
        },
    );
    match result {
        Ok(port) => {
            info!(
                "Connected to {} at {} baud",
                port.name().unwrap_or_default(),
                settings.baud_rate
            );
            Ok(port)
        }
        Err(err) => match err {
            retry::Error::Operation {
                error,
                total_delay,
                tries,
            } => {
                info!(
                    "Failed to open the port after {:?} and {} tries: {}",
                    total_delay, tries, error,
                );
                Err(error)
            }
            retry::Error::Internal(_) => {
                info!("Internal retry error while opening port");
                Err(serialport::Error::new(
                    serialport::ErrorKind::Unknown,
                    "internal error while retrying to open the port",
                ))
            }
        },
    }
}
