//! Remote filesystem and reset operations against the board.
//!
//! The board's filesystem is not touched directly: everything goes through an
//! out-of-process transfer tool (`ampy`) that owns the remote file protocol.
//! The narrow [`DeviceBackend`] trait keeps the deployment state machine
//! testable with a fake backend, without a real device or subprocess.

use std::fmt;
use std::path::Path;
use std::process::Command;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

// =============================================================================
// Public Interface
// =============================================================================

/// A failed backend invocation, carrying the command that was run and the
/// diagnostic text it produced.
#[derive(Debug, Clone)]
pub struct BackendError {
    /// The command line that was invoked.
    pub command: String,
    /// Captured stderr/stdout of the failed invocation, or the spawn error.
    pub detail: String,
}
impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` failed: {}", self.command, self.detail.trim())
    }
}
impl std::error::Error for BackendError {}

/// The capabilities the deployment state machine needs from the transfer
/// tool. One implementation shells out to `ampy`; tests substitute fakes.
pub trait DeviceBackend {
    /// Create `remote` on the board. The tool has no "directory exists"
    /// query, only a side-effecting create that errors when the directory is
    /// already present; callers decide whether that error matters.
    fn ensure_remote_dir(&mut self, remote: &str) -> Result<(), BackendError>;

    /// Copy `local` to `remote` on the board.
    fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), BackendError>;

    /// Reset the board so it picks up the freshly pushed program.
    fn reset_device(&mut self) -> Result<(), BackendError>;
}

/// Production backend invoking the `ampy` command line tool. `ampy` opens
/// its own serial connection to the port, which is why the control handle
/// must be closed before any of these calls.
pub struct AmpyBackend {
    port: String,
}
impl AmpyBackend {
    pub fn new(port: impl Into<String>) -> Self {
        AmpyBackend { port: port.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String, BackendError> {
        let command = format!("ampy --port {} {}", self.port, args.join(" "));
        debug!("invoking {}", command);

        let output = Command::new("ampy")
            .arg("--port")
            .arg(&self.port)
            .args(args)
            .output()
            .map_err(|e| BackendError {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let mut detail = String::from_utf8_lossy(&output.stderr).into_owned();
            if detail.trim().is_empty() {
                detail = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            Err(BackendError { command, detail })
        }
    }
}
impl DeviceBackend for AmpyBackend {
    fn ensure_remote_dir(&mut self, remote: &str) -> Result<(), BackendError> {
        self.run(&["mkdir", remote]).map(|_| ())
    }

    fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), BackendError> {
        let local_str = local.to_string_lossy();

        // The transfer itself is a black box; all we can show is a spinner
        // while `ampy` feeds the file over the serial line.
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(120);
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])
                .template("[MP] {spinner:.blue} {msg}"),
        );
        pb.set_message(format!("⏩ Pushing {} -> {}", local_str, remote));

        let result = self.run(&["put", local_str.as_ref(), remote]).map(|_| ());
        match &result {
            Ok(_) => pb.finish_with_message(format!("📦 Pushed {}", remote)),
            Err(_) => pb.finish_with_message(format!("💥 Failed to push {}", remote)),
        }
        result
    }

    fn reset_device(&mut self) -> Result<(), BackendError> {
        self.run(&["reset"]).map(|_| ())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn backend_error_display_includes_command_and_detail() {
    let err = BackendError {
        command: "ampy --port COM4 mkdir /lib".into(),
        detail: "failed to access /lib\n".into(),
    };
    let text = err.to_string();
    assert!(text.contains("ampy --port COM4 mkdir /lib"));
    assert!(text.contains("failed to access /lib"));
}
