//! `micropush` deployment pipeline state machine.
//!
//! A deployment run walks a live board through a fixed, strictly sequential
//! sequence of steps, with no branching back:
//!
//! ```text
//!   .------.
//!   | Init |  pre-check the local artifacts, build the transfer plan
//!   '------'
//!       |
//!       v
//!  .-----------.
//!  | Interrupt |  0x03 x2, 0x04 over the serial line, close the handle
//!  '-----------'  (failures are warnings: the board may already be idle)
//!       |
//!       v
//! .------------.
//! | PrepareDir |  create the remote /lib (already-exists is fine)
//! '------------'
//!       |
//!       v
//! .-------------.    .-------------.    .-------.
//! | PushRuntime |--->| PushProgram |--->| Reset |
//! '-------------'    '-------------'    '-------'
//!       |  failure         |  failure       |
//!       '------------------'----------------'--> Done
//! ```
//!
//! Every arrow is a distinct call against the transfer backend or the serial
//! control link; the machine advances only on success of the previous step,
//! except where a step's failure policy says otherwise (see the individual
//! states). Each step that needs the port opens and closes its own
//! connection, so at most one handle to the port is open at any time.

use super::events::*;
use super::states::*;
use crate::backend::{AmpyBackend, DeviceBackend};
use crate::link::{ControlLink, SerialControlLink};
use crate::settings::Settings;

// =============================================================================
// Public Interface
// =============================================================================

/// Represents the `micropush` deployment pipeline state machine. Use the
/// `factory()` function to get an instance then run it by calling its
/// `run()` method.
pub struct DeploymentPipeline {
    sm: PipelineStates,
    backend: Box<dyn DeviceBackend>,
    link: Box<dyn ControlLink>,
}
impl DeploymentPipeline {
    /// The deployment pipeline event loop runs until the `Done` state is
    /// reached and its `should_exit` flag is set. At such point, the event
    /// loop terminates and returns an exit code indicating no errors when
    /// equal to **`0`**; otherwise a termination with error.
    pub fn run(&mut self) -> i8 {
        loop {
            self.sm = self.sm.step(self.backend.as_mut(), self.link.as_mut());
            if let PipelineStates::Done(sm) = &self.sm {
                if sm.state.should_exit {
                    return if sm.state.with_error { 1 } else { 0 };
                }
            }
        }
    }
}

/// Factory function for the `micropush` deployment pipeline, wired to the
/// production `ampy` backend and a real serial control link. Use it to get
/// an instance of the state machine, which you can run by invoking its
/// `run()` method.
pub fn factory(settings: Settings) -> DeploymentPipeline {
    let port = settings.path.clone().unwrap_or_default();
    factory_with(
        settings,
        Box::new(AmpyBackend::new(port)),
        Box::new(SerialControlLink),
    )
}

/// Same as [`factory`], with caller-provided backend and control link.
/// This is the seam that lets the state machine be exercised without a real
/// device or subprocess.
pub fn factory_with(
    settings: Settings,
    backend: Box<dyn DeviceBackend>,
    link: Box<dyn ControlLink>,
) -> DeploymentPipeline {
    DeploymentPipeline {
        // The machine naturally starts in the `Init` state.
        sm: PipelineStates::Init(PipelineSM::new(settings)),
        backend,
        link,
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine implementing `micropush`'s deployment pipeline.
///
/// This is a private interface, abstracted for a simpler and more intuitive
/// use in the public `DeploymentPipeline` interface.
///
/// Note that using a generic type that holds the current state serves two
/// purposes. It allows for also having shared data by all states that is not
/// really part of state data (the run settings). Additionally, it's nicer
/// when debugging to see the state machine and the current state it is
/// holding at any time.
#[derive(Debug)]
struct PipelineSM<S: Runnable> {
    settings: Settings,
    state: S,
}
impl<S: Runnable> PipelineSM<S> {
    fn run(&mut self, backend: &mut dyn DeviceBackend, link: &mut dyn ControlLink) -> Event {
        self.state.run(&self.settings, backend, link)
    }
}

/// The state machine starts in the `InitState`.
impl PipelineSM<InitState> {
    fn new(settings: Settings) -> Self {
        PipelineSM {
            settings,
            state: InitState {},
        }
    }
}

/// An enum wrapper around the states of the deployment pipeline state
/// machine. It provides a simpler and more intuitive model for manipulating
/// states and their transitions.
enum PipelineStates {
    Init(PipelineSM<InitState>),
    Interrupt(PipelineSM<InterruptState>),
    PrepareDir(PipelineSM<PrepareDirState>),
    PushRuntime(PipelineSM<PushRuntimeState>),
    PushProgram(PipelineSM<PushProgramState>),
    Reset(PipelineSM<ResetState>),
    Done(PipelineSM<DoneState>),
}
impl PipelineStates {
    /// The unit of work in the state machine event loop. It checks the
    /// current state and the current event and decides the next transition.
    /// State transitions from events are implemented using the rust
    /// `From`/`Into` pattern. Most of the potential errors of
    /// state/event/transition mismatches can be caught at compile time.
    fn step(&mut self, backend: &mut dyn DeviceBackend, link: &mut dyn ControlLink) -> Self {
        match self {
            PipelineStates::Init(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::StartInterrupt(ev) => PipelineStates::Interrupt(ev.into()),
                    Event::Done(ev) => PipelineStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            PipelineStates::Interrupt(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::PrepareDir(ev) => PipelineStates::PrepareDir(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            PipelineStates::PrepareDir(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::PushRuntime(ev) => PipelineStates::PushRuntime(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            PipelineStates::PushRuntime(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::PushProgram(ev) => PipelineStates::PushProgram(ev.into()),
                    Event::Done(ev) => PipelineStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            PipelineStates::PushProgram(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::ResetDevice(ev) => PipelineStates::Reset(ev.into()),
                    Event::Done(ev) => PipelineStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            PipelineStates::Reset(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::Done(ev) => PipelineStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            PipelineStates::Done(sm) => {
                let event = sm.run(backend, link);
                match event {
                    Event::Exit(ev) => PipelineStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<StartInterruptEvent> for PipelineSM<InterruptState> {
    fn from(event: StartInterruptEvent) -> PipelineSM<InterruptState> {
        PipelineSM {
            settings: event.settings,
            state: InterruptState { plan: event.plan },
        }
    }
}

impl From<PrepareDirEvent> for PipelineSM<PrepareDirState> {
    fn from(event: PrepareDirEvent) -> PipelineSM<PrepareDirState> {
        PipelineSM {
            settings: event.settings,
            state: PrepareDirState { plan: event.plan },
        }
    }
}

impl From<PushRuntimeEvent> for PipelineSM<PushRuntimeState> {
    fn from(event: PushRuntimeEvent) -> PipelineSM<PushRuntimeState> {
        PipelineSM {
            settings: event.settings,
            state: PushRuntimeState { plan: event.plan },
        }
    }
}

impl From<PushProgramEvent> for PipelineSM<PushProgramState> {
    fn from(event: PushProgramEvent) -> PipelineSM<PushProgramState> {
        PipelineSM {
            settings: event.settings,
            state: PushProgramState { plan: event.plan },
        }
    }
}

impl From<ResetDeviceEvent> for PipelineSM<ResetState> {
    fn from(event: ResetDeviceEvent) -> PipelineSM<ResetState> {
        PipelineSM {
            settings: event.settings,
            state: ResetState {},
        }
    }
}

impl From<DoneEvent> for PipelineSM<DoneState> {
    fn from(event: DoneEvent) -> PipelineSM<DoneState> {
        PipelineSM {
            settings: event.settings,
            state: DoneState {
                with_error: event.with_errors,
                should_exit: false,
            },
        }
    }
}
impl From<ExitEvent> for PipelineSM<DoneState> {
    fn from(event: ExitEvent) -> PipelineSM<DoneState> {
        PipelineSM {
            settings: event.settings,
            state: DoneState {
                with_error: event.with_error,
                should_exit: true,
            },
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::backend::BackendError;
    use crate::SettingsBuilder;

    /// Records every call in order; individual operations can be told to
    /// fail.
    struct FakeBackend {
        calls: Rc<RefCell<Vec<String>>>,
        fail_mkdir: bool,
        fail_put_runtime: bool,
        fail_put_program: bool,
        fail_reset: bool,
    }
    impl FakeBackend {
        fn new(calls: Rc<RefCell<Vec<String>>>) -> Self {
            FakeBackend {
                calls,
                fail_mkdir: false,
                fail_put_runtime: false,
                fail_put_program: false,
                fail_reset: false,
            }
        }

        fn fail(&self, op: &str) -> Result<(), BackendError> {
            Err(BackendError {
                command: format!("ampy --port TEST {}", op),
                detail: "simulated failure".into(),
            })
        }
    }
    impl DeviceBackend for FakeBackend {
        fn ensure_remote_dir(&mut self, remote: &str) -> Result<(), BackendError> {
            self.calls.borrow_mut().push(format!("mkdir {}", remote));
            if self.fail_mkdir {
                return self.fail("mkdir");
            }
            Ok(())
        }

        fn put_file(&mut self, local: &Path, remote: &str) -> Result<(), BackendError> {
            self.calls
                .borrow_mut()
                .push(format!("put {} {}", local.display(), remote));
            let is_runtime = remote.starts_with("/lib");
            if (is_runtime && self.fail_put_runtime) || (!is_runtime && self.fail_put_program) {
                return self.fail("put");
            }
            Ok(())
        }

        fn reset_device(&mut self) -> Result<(), BackendError> {
            self.calls.borrow_mut().push("reset".into());
            if self.fail_reset {
                return self.fail("reset");
            }
            Ok(())
        }
    }

    struct FakeLink {
        calls: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }
    impl ControlLink for FakeLink {
        fn interrupt_and_reboot(&mut self, _settings: &Settings) -> Result<(), serialport::Error> {
            self.calls.borrow_mut().push("interrupt".into());
            if self.fail {
                return Err(serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "port unreachable",
                ));
            }
            Ok(())
        }
    }

    /// Settings pointing at real scratch files, with the settle delays
    /// zeroed so the tests don't sleep.
    fn scratch_settings(tag: &str) -> Settings {
        let dir = std::env::temp_dir();
        let program = dir.join(format!("micropush-{}-main.py", tag));
        let runtime = dir.join(format!("micropush-{}-boardio.py", tag));
        fs::write(&program, "print('hi')\n").unwrap();
        fs::write(&runtime, "# runtime\n").unwrap();
        SettingsBuilder::new()
            .path("TEST_PORT")
            .program_file(program.to_str().unwrap())
            .runtime_file(runtime.to_str().unwrap())
            .reconnect_settle(Duration::from_millis(0))
            .finalize()
    }

    fn run_pipeline(settings: Settings, backend: FakeBackend, link: FakeLink) -> i8 {
        let mut pipeline = factory_with(settings, Box::new(backend), Box::new(link));
        pipeline.run()
    }

    #[test]
    fn full_run_walks_every_step_in_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let settings = scratch_settings("full");
        let runtime_remote = TransferPlan::new(&settings).runtime.1;

        let status = run_pipeline(
            settings.clone(),
            FakeBackend::new(Rc::clone(&calls)),
            FakeLink {
                calls: Rc::clone(&calls),
                fail: false,
            },
        );

        assert_eq!(status, 0);
        let calls = calls.borrow();
        assert_eq!(calls[0], "interrupt");
        assert_eq!(calls[1], "mkdir /lib");
        assert_eq!(calls[2], format!("put {} {}", settings.runtime_file, runtime_remote));
        assert_eq!(calls[3], format!("put {} /main.py", settings.program_file));
        assert_eq!(calls[4], "reset");
        assert_eq!(calls.len(), 5);
    }

    #[test]
    fn interrupt_failure_is_not_fatal() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let status = run_pipeline(
            scratch_settings("noserial"),
            FakeBackend::new(Rc::clone(&calls)),
            FakeLink {
                calls: Rc::clone(&calls),
                fail: true,
            },
        );

        // The board may already be at its prompt; the transfers decide.
        assert_eq!(status, 0);
        assert!(calls.borrow().iter().any(|c| c == "reset"));
    }

    #[test]
    fn existing_remote_dir_is_tolerated() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut backend = FakeBackend::new(Rc::clone(&calls));
        backend.fail_mkdir = true;

        let status = run_pipeline(
            scratch_settings("mkdir"),
            backend,
            FakeLink {
                calls: Rc::clone(&calls),
                fail: false,
            },
        );

        assert_eq!(status, 0);
        assert!(calls.borrow().iter().any(|c| c == "reset"));
    }

    #[test]
    fn runtime_push_failure_stops_before_the_program() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut backend = FakeBackend::new(Rc::clone(&calls));
        backend.fail_put_runtime = true;

        let status = run_pipeline(
            scratch_settings("runtimefail"),
            backend,
            FakeLink {
                calls: Rc::clone(&calls),
                fail: false,
            },
        );

        assert_eq!(status, 1);
        let calls = calls.borrow();
        assert!(!calls.iter().any(|c| c.ends_with("/main.py")));
        assert!(!calls.iter().any(|c| c == "reset"));
    }

    #[test]
    fn program_push_failure_skips_the_reset() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut backend = FakeBackend::new(Rc::clone(&calls));
        backend.fail_put_program = true;

        let status = run_pipeline(
            scratch_settings("programfail"),
            backend,
            FakeLink {
                calls: Rc::clone(&calls),
                fail: false,
            },
        );

        assert_eq!(status, 1);
        let calls = calls.borrow();
        // The runtime went through, then the run aborted with no reset and
        // no rollback.
        assert!(calls.iter().any(|c| c.contains("/lib/")));
        assert!(!calls.iter().any(|c| c == "reset"));
    }

    #[test]
    fn reset_failure_is_fatal() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut backend = FakeBackend::new(Rc::clone(&calls));
        backend.fail_reset = true;

        let status = run_pipeline(
            scratch_settings("resetfail"),
            backend,
            FakeLink {
                calls: Rc::clone(&calls),
                fail: false,
            },
        );

        assert_eq!(status, 1);
    }

    #[test]
    fn missing_program_file_fails_before_any_device_interaction() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let settings = SettingsBuilder::new()
            .path("TEST_PORT")
            .program_file("/definitely/not/here/main.py")
            .reconnect_settle(Duration::from_millis(0))
            .finalize();

        let status = run_pipeline(
            settings,
            FakeBackend::new(Rc::clone(&calls)),
            FakeLink {
                calls: Rc::clone(&calls),
                fail: false,
            },
        );

        assert_eq!(status, 1);
        assert!(calls.borrow().is_empty());
    }
}
