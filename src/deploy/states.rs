//! States for the `micropush` deployment pipeline state machine.
//!
//! This module is private and restricted to the [`deploy`](crate::deploy)
//! scope. The public interface of the deployment pipeline state machine is
//! provided by [`deploy`](crate::deploy).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use std::path::{Path, PathBuf};
use std::thread;

use console::style;
use log::{debug, error, info, warn};

use super::events::*;
use crate::backend::DeviceBackend;
use crate::link::ControlLink;
use crate::settings::Settings;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into
/// it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done
    /// against the transfer `backend` and the serial control `link`, and
    /// when finished, requests a transition to a `new state` by returning
    /// the appropriate `event`. The `state` and the `event` are consumed to
    /// create the `new state` using the corresponding [`From`] trait
    /// implementation (provided such implementation exists).
    fn run(
        &mut self,
        settings: &Settings,
        backend: &mut dyn DeviceBackend,
        link: &mut dyn ControlLink,
    ) -> Event;
}

// TransferPlan ================================================================

/// The ordered transfers of one deployment run.
///
/// Invariants: the library directory is prepared before anything lands in
/// it, and the runtime support file is pushed before the user program. The
/// generated program imports the runtime at startup, so a board reset in
/// between two pushes must never find the program without its runtime.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferPlan {
    /// Remote directory to create-or-confirm before any library transfer.
    pub lib_dir: String,
    /// Runtime support file: (local path, remote path under `lib_dir`).
    pub runtime: (PathBuf, String),
    /// User program file: (local path, remote root path).
    pub program: (PathBuf, String),
}
impl TransferPlan {
    /// Build the plan for the artifacts named in `settings`. The runtime
    /// keeps its file name under the remote library directory; the program
    /// always lands at the fixed remote program path, whatever its local
    /// name, because that is the file the board auto-runs.
    pub fn new(settings: &Settings) -> Self {
        let runtime_local = PathBuf::from(&settings.runtime_file);
        let runtime_name = runtime_local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "boardio.py".into());
        TransferPlan {
            lib_dir: settings.remote_lib_dir.clone(),
            runtime: (
                runtime_local,
                format!("{}/{}", settings.remote_lib_dir, runtime_name),
            ),
            program: (
                PathBuf::from(&settings.program_file),
                settings.remote_program.clone(),
            ),
        }
    }
}

// Init State ==================================================================

/// The initial state of the deployment pipeline state machine.
///
/// Checks that the local artifacts exist before any device interaction;
/// missing files are fatal here, with a direct message, and never reach the
/// board.
///
/// From the `InitState`, the state machine can evolve via the following
/// transitions:
///
///  * **[`StartInterruptEvent`] => [`InterruptState`]** after the pre-checks
///    pass and the transfer plan is built,
///  * **[`DoneEvent`] => [`DoneState`]** when a local artifact is missing.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(
        &mut self,
        settings: &Settings,
        _backend: &mut dyn DeviceBackend,
        _link: &mut dyn ControlLink,
    ) -> Event {
        info!("=> Init");
        assert_ne!(settings.path, None);

        for local in &[&settings.program_file, &settings.runtime_file] {
            if !Path::new(local).exists() {
                println!(
                    "{}",
                    style(format!("[MP] 💥 local file `{}` not found!", local)).red()
                );
                return Event::Done(DoneEvent {
                    settings: settings.clone(),
                    with_errors: true,
                });
            }
        }

        Event::StartInterrupt(StartInterruptEvent {
            settings: settings.clone(),
            plan: TransferPlan::new(settings),
        })
    }
}

// Interrupt State =============================================================

/// A `state` of the deployment pipeline where `micropush` interrupts the
/// program currently running on the board and soft-reboots its interpreter
/// over the serial line, then closes the handle so the transfer backend can
/// open its own.
///
/// Interrupt failures (port busy, no device present) are warnings, not
/// fatal: the board may already be sitting at its command prompt, in which
/// case the transfers will succeed anyway. This is a best-effort policy,
/// not a correctness guarantee.
///
///  * **[`PrepareDirEvent`] => [`PrepareDirState`]** always, whatever the
///    outcome of the interrupt attempt.
#[derive(Debug)]
pub(crate) struct InterruptState {
    pub plan: TransferPlan,
}
impl Runnable for InterruptState {
    fn run(
        &mut self,
        settings: &Settings,
        _backend: &mut dyn DeviceBackend,
        link: &mut dyn ControlLink,
    ) -> Event {
        info!("=> Interrupt");

        match link.interrupt_and_reboot(settings) {
            Ok(()) => debug!("board interrupted and soft-rebooted"),
            Err(ref e) => {
                warn!("soft reset over the serial line failed: {}", e);
                println!(
                    "{}",
                    style("[MP] ⚠️  could not interrupt the running program; assuming the board is ready")
                        .yellow()
                );
            }
        }

        // Give the board time to come back before the backend reconnects.
        thread::sleep(settings.reconnect_settle);

        Event::PrepareDir(PrepareDirEvent {
            settings: settings.clone(),
            plan: self.plan.clone(),
        })
    }
}

// PrepareDir State ============================================================

/// A `state` of the deployment pipeline where the remote library directory
/// is created. The backend has no "directory exists" query, only a
/// side-effecting create that errors when the directory is already there,
/// so a failure here is swallowed as pre-existing and the pipeline moves
/// on.
///
///  * **[`PushRuntimeEvent`] => [`PushRuntimeState`]** always.
#[derive(Debug)]
pub(crate) struct PrepareDirState {
    pub plan: TransferPlan,
}
impl Runnable for PrepareDirState {
    fn run(
        &mut self,
        settings: &Settings,
        backend: &mut dyn DeviceBackend,
        _link: &mut dyn ControlLink,
    ) -> Event {
        info!("=> PrepareDir");
        println!("[MP] 📁 Preparing {} on the board...", self.plan.lib_dir);

        match backend.ensure_remote_dir(&self.plan.lib_dir) {
            Ok(()) => debug!("created {}", self.plan.lib_dir),
            Err(ref e) => {
                debug!("{}", e);
                info!("{} probably exists already, continuing", self.plan.lib_dir);
            }
        }

        Event::PushRuntime(PushRuntimeEvent {
            settings: settings.clone(),
            plan: self.plan.clone(),
        })
    }
}

// PushRuntime State ===========================================================

/// A `state` of the deployment pipeline where the runtime support file is
/// pushed into the remote library directory. A failure here is fatal: the
/// program file is never pushed on top of a missing runtime, no retry, no
/// rollback.
///
///  * **[`PushProgramEvent`] => [`PushProgramState`]** on success,
///  * **[`DoneEvent`] => [`DoneState`]** on a transfer failure.
#[derive(Debug)]
pub(crate) struct PushRuntimeState {
    pub plan: TransferPlan,
}
impl Runnable for PushRuntimeState {
    fn run(
        &mut self,
        settings: &Settings,
        backend: &mut dyn DeviceBackend,
        _link: &mut dyn ControlLink,
    ) -> Event {
        info!("=> PushRuntime");

        let (local, remote) = &self.plan.runtime;
        match backend.put_file(local, remote) {
            Ok(()) => Event::PushProgram(PushProgramEvent {
                settings: settings.clone(),
                plan: self.plan.clone(),
            }),
            Err(ref e) => {
                error!("{}", e);
                println!("{}", style("[MP] 💥 Failed to push the runtime!").red());
                Event::Done(DoneEvent {
                    settings: settings.clone(),
                    with_errors: true,
                })
            }
        }
    }
}

// PushProgram State ===========================================================

/// A `state` of the deployment pipeline where the compiled program is pushed
/// to the remote root. A failure is fatal and the board is never reset, so
/// whatever was running before the partial push stays in charge of deciding
/// what to do next.
///
///  * **[`ResetDeviceEvent`] => [`ResetState`]** on success,
///  * **[`DoneEvent`] => [`DoneState`]** on a transfer failure.
#[derive(Debug)]
pub(crate) struct PushProgramState {
    pub plan: TransferPlan,
}
impl Runnable for PushProgramState {
    fn run(
        &mut self,
        settings: &Settings,
        backend: &mut dyn DeviceBackend,
        _link: &mut dyn ControlLink,
    ) -> Event {
        info!("=> PushProgram");

        let (local, remote) = &self.plan.program;
        match backend.put_file(local, remote) {
            Ok(()) => Event::ResetDevice(ResetDeviceEvent {
                settings: settings.clone(),
            }),
            Err(ref e) => {
                error!("{}", e);
                println!("{}", style("[MP] 💥 Failed to push the program!").red());
                Event::Done(DoneEvent {
                    settings: settings.clone(),
                    with_errors: true,
                })
            }
        }
    }
}

// Reset State =================================================================

/// A `state` of the deployment pipeline where the board is reset through the
/// backend so it boots into the freshly pushed program.
///
///  * **[`DoneEvent`] => [`DoneState`]** always; with errors when the reset
///    command fails.
#[derive(Debug)]
pub(crate) struct ResetState {}
impl Runnable for ResetState {
    fn run(
        &mut self,
        settings: &Settings,
        backend: &mut dyn DeviceBackend,
        _link: &mut dyn ControlLink,
    ) -> Event {
        info!("=> Reset");
        println!("[MP] 🔄 Restarting the board...");

        match backend.reset_device() {
            Ok(()) => {
                println!(
                    "{}",
                    style("[MP] ✅ Upload complete, the new program is starting").green()
                );
                Event::Done(DoneEvent {
                    settings: settings.clone(),
                    with_errors: false,
                })
            }
            Err(ref e) => {
                error!("{}", e);
                println!("{}", style("[MP] 💥 Failed to reset the board!").red());
                Event::Done(DoneEvent {
                    settings: settings.clone(),
                    with_errors: true,
                })
            }
        }
    }
}

// Done State ==================================================================

/// Reached when the deployment pipeline completes its execution and is about
/// to terminate (normally or abnormally).
///
/// This state goes into a 2-phase execution. During the initial phase, it
/// runs like any other state to report the outcome. It then triggers the
/// [`ExitEvent`] to cause the pipeline state machine to terminate and exit.
///
/// Termination due to errors is indicated with the `with_error` field in the
/// state. This condition is used to set the return value from the pipeline
/// event loop.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_error: bool,
    /// When `true` instructs the pipeline state machine to exit its event
    /// loop.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(
        &mut self,
        settings: &Settings,
        _backend: &mut dyn DeviceBackend,
        _link: &mut dyn ControlLink,
    ) -> Event {
        info!(
            "=> Done with{}errors",
            if self.with_error { " " } else { " no " }
        );
        if self.with_error {
            println!("{}", style("[MP] 💥 Upload failed!").red());
            println!("[MP] 🔌 Check the connection and press Reset on the board before retrying.");
        }

        Event::Exit(ExitEvent {
            settings: settings.clone(),
            with_error: self.with_error,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SettingsBuilder;

    #[test]
    fn plan_sends_runtime_into_the_lib_dir() {
        let settings = SettingsBuilder::new()
            .path("TEST")
            .runtime_file("runtime/boardio.py")
            .finalize();
        let plan = TransferPlan::new(&settings);
        assert_eq!(plan.lib_dir, "/lib");
        assert_eq!(plan.runtime.0, PathBuf::from("runtime/boardio.py"));
        assert_eq!(plan.runtime.1, "/lib/boardio.py");
    }

    #[test]
    fn plan_pins_the_remote_program_path() {
        // The board auto-runs /main.py; the local name must not leak into
        // the remote path.
        let settings = SettingsBuilder::new()
            .path("TEST")
            .program_file("build/blink.py")
            .finalize();
        let plan = TransferPlan::new(&settings);
        assert_eq!(plan.program.0, PathBuf::from("build/blink.py"));
        assert_eq!(plan.program.1, "/main.py");
    }

    #[test]
    fn plan_honors_a_custom_lib_dir() {
        let settings = SettingsBuilder::new()
            .path("TEST")
            .remote_lib_dir("/libs")
            .finalize();
        let plan = TransferPlan::new(&settings);
        assert_eq!(plan.runtime.1, "/libs/boardio.py");
    }
}
