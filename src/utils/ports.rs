//! Serial port device manipulation.

use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serialport::{available_ports, SerialPortType};

use crate::utils::poll_escape;

//==============================================================================
// Public Interface
//==============================================================================

/// Check for a device with the given path in the system. If not immediately
/// found, enter into a waiting loop, checking every period of time whether
/// the device has been created or not. A board that was just plugged in can
/// take a moment to get its device node. While waiting, the user can
/// interactively cancel by pressing the `ESC` key.
///
/// The function will return `true` when the wait was cancelled by the user
/// hitting `Esc`.
pub fn wait_for_port(path: &str) -> bool {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(120);
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
            .template("[MP] {spinner:.blue} {msg}"),
    );

    let mut attempt: usize = 1;
    let waiting_period = 2;

    pb.set_message(format!(
        "[{:03}s] ⏳ Waiting for {} to be ready (ESC to cancel)...",
        style(waiting_period).dim(),
        style(path).cyan()
    ));

    // The main thread enumerates ports; a second thread listens for the
    // `ESC` key. Two channels coordinate their termination: one for the
    // cancellation condition, one for the device readiness condition.

    // Cancellation channel, on which the cancellation thread will be the
    // sender and the main thread the receiver.
    let (cancel_tx, cancel_rx) = mpsc::channel();

    // The device ready channel, on which the main thread will be the sender
    // and the cancellation thread the receiver.
    let (done_tx, done_rx) = mpsc::channel();

    let cancelation_thread = thread::spawn(move || loop {
        // Check if we need to terminate because the serial device is ready.
        if done_rx.try_recv().is_ok() {
            break;
        }
        // Poll for the Esc key, non blocking
        if let Ok(esc) = poll_escape() {
            if esc {
                cancel_tx
                    .send(1)
                    .expect("an unrecoverable error while sending over cancel_tx");
                break;
            }
        }
    });

    let mut cancelled = false;
    loop {
        let found_ports = enumerate_serial_ports();

        if check_requested_port(&found_ports, path) {
            // Notify the cancellation thread
            done_tx
                .send(1)
                .expect("an unrecoverable error while sending over done_tx");

            pb.finish_with_message(format!("👍 Serial port {} is ready", style(path).green()));
            break;
        }

        // Update the progress message and wait for some time (receiving
        // until timeout from the cancellation channel) before enumerating
        // serial devices again.
        let waited = attempt * waiting_period;
        pb.set_message(format!(
            "[{:03}s {}] ⏳ Waiting for {} to be ready (ESC to cancel)...",
            style(waited).dim(),
            found_ports.len(),
            style(path).cyan()
        ));

        match cancel_rx.recv_timeout(Duration::from_secs(waiting_period as u64)) {
            Ok(_) => {
                pb.finish_with_message(format!(
                    "❌ Waiting on port {} canceled after {} seconds",
                    style(path).cyan(),
                    style(waited).dim()
                ));
                cancelled = true;
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                // try again after a timeout
            }
            Err(RecvTimeoutError::Disconnected) => {
                // no point in waiting anymore :'(
                cancelled = true;
                break;
            }
        }

        attempt += 1;
    }

    cancelation_thread
        .join()
        .expect("an unrecoverable error while joining the cancellation thread");

    cancelled
}

//==============================================================================
// Private stuff
//==============================================================================

fn check_requested_port(ports: &[String], path: &str) -> bool {
    ports.iter().any(|detected| detected.starts_with(path))
}

/// Enumerates serial devices on the system, with extra detail for USB ports.
fn enumerate_serial_ports() -> Vec<String> {
    let mut names = vec![];
    match available_ports() {
        Ok(ports) => {
            for p in ports {
                match p.port_type {
                    // USB ports give us more info about the connected serial
                    // controller
                    SerialPortType::UsbPort(info) => {
                        names.push(format!(
                            "{}: ({} / {})",
                            p.port_name,
                            info.manufacturer.as_ref().map_or("", String::as_str),
                            info.product.as_ref().map_or("", String::as_str)
                        ));
                    }
                    // We're also interested in the other devices, such as
                    // virtual ports for testing
                    _ => {
                        names.push(p.port_name);
                    }
                }
            }
        }
        Err(ref e) => {
            info!("error: {}", e.to_string());
        }
    }
    names
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn requested_port_matches_on_prefix() {
    let ports = vec![
        "/dev/ttyUSB0: (Silicon Labs / CP2102)".to_string(),
        "/dev/ttyS0".to_string(),
    ];
    assert!(check_requested_port(&ports, "/dev/ttyUSB0"));
    assert!(check_requested_port(&ports, "/dev/ttyS0"));
    assert!(!check_requested_port(&ports, "/dev/ttyACM0"));
}
