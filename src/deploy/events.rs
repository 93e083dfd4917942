//! Events for the `micropush` deployment pipeline state machine.
//!
//! This module is private and restricted to the [`deploy`](crate::deploy)
//! scope. The public interface of the deployment pipeline state machine is
//! provided by [`deploy`](crate::deploy).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an
//! overview of states, events and transitions.

use super::states::TransferPlan;
use crate::Settings;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Event fired once the local artifacts have passed the pre-checks,
/// triggering the transition to [`InterruptState`](super::states).
///
/// Carries the [`TransferPlan`] built from the settings; the plan travels
/// with every subsequent transition until all of its entries are pushed.
#[derive(Debug)]
pub(crate) struct StartInterruptEvent {
    pub settings: Settings,
    pub plan: TransferPlan,
}

/// Event fired after the interrupt/soft-reboot attempt, whatever its
/// outcome, triggering the transition to
/// [`PrepareDirState`](super::states).
#[derive(Debug)]
pub(crate) struct PrepareDirEvent {
    pub settings: Settings,
    pub plan: TransferPlan,
}

/// Event fired once the remote library directory is known to exist,
/// triggering the transition to [`PushRuntimeState`](super::states).
#[derive(Debug)]
pub(crate) struct PushRuntimeEvent {
    pub settings: Settings,
    pub plan: TransferPlan,
}

/// Event fired once the runtime support file is on the board, triggering
/// the transition to [`PushProgramState`](super::states).
#[derive(Debug)]
pub(crate) struct PushProgramEvent {
    pub settings: Settings,
    pub plan: TransferPlan,
}

/// Event fired once the program file is on the board, triggering the
/// transition to [`ResetState`](super::states).
#[derive(Debug)]
pub(crate) struct ResetDeviceEvent {
    pub settings: Settings,
}

/// Event fired when the deployment pipeline completes and is about to
/// terminate. It triggers a transition to the `Done` state.
///
/// This event can happen at any state, due to normal completion or to a
/// fatal transfer failure.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub settings: Settings,
    /// When `true`, indicates an abnormal completion caused by an error.
    pub with_errors: bool,
}

/// The last event that can be triggered in the deployment pipeline state
/// machine, causing the event loop to terminate with an `exit status`,
/// handing control back to the caller that started it.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub settings: Settings,
    pub with_error: bool,
}

// Events enum =================================================================

/// Events that can be triggered within the deployment pipeline state machine
/// of `micropush`.
///
/// Each possible value holds an `event`, which in turn may hold additional
/// data for the state transition. Such data is passed by the origin state for
/// potential use by the target state.
#[derive(Debug)]
pub(crate) enum Event {
    StartInterrupt(StartInterruptEvent),
    PrepareDir(PrepareDirEvent),
    PushRuntime(PushRuntimeEvent),
    PushProgram(PushProgramEvent),
    ResetDevice(ResetDeviceEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
