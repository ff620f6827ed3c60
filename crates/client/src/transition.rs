//! Pure state transition function for the reconnection supervisor
//!
//! All connection lifecycle decisions live here as a pure, synchronous
//! function: `transition(state, input, timing) -> (state, effects)`.
//! No IO, no async, no timers. The supervisor actor executes the effects.

use std::time::Duration;

use livesync_connector_core::{AttemptId, TransportError};
use livesync_protocol::ConnectionState;

use crate::watchdog::{Liveness, Verdict};

pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_CONNECTED: &str = "Connected - waiting for data";
pub const STATUS_DISCONNECTED: &str = "Disconnected";
pub const STATUS_NO_HEARTBEAT: &str = "No heartbeat - connection may be dead";

/// Status shown while a reconnect delay is pending.
pub fn reconnecting_status(delay: Duration) -> String {
    format!("Reconnecting in {}s...", delay.as_secs_f64())
}

/// Delays the supervisor schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub reconnect_delay: Duration,
    pub watchdog_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            watchdog_timeout: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisorState: pure data snapshot of the supervisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorState {
    pub phase: ConnectionState,
    pub status: String,
    /// Auto-reconnect permitted. Cleared only by an explicit disconnect.
    pub run_flag: bool,
    /// Set by the first start; collapses concurrent start triggers.
    pub started: bool,
    /// Id of the most recent attempt. Events tagged otherwise are stale.
    pub attempt: AttemptId,
    pub handle_open: bool,
    pub reconnect_pending: Option<AttemptId>,
    pub liveness: Liveness,
    pub frames_received: u64,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self {
            phase: ConnectionState::Disconnected,
            status: STATUS_DISCONNECTED.to_string(),
            run_flag: false,
            started: false,
            attempt: 0,
            handle_open: false,
            reconnect_pending: None,
            liveness: Liveness::default(),
            frames_received: 0,
        }
    }
}

impl SupervisorState {
    fn is_current(&self, attempt: AttemptId) -> bool {
        self.handle_open && attempt == self.attempt
    }
}

// ---------------------------------------------------------------------------
// Input: commands, transport events and timer expirations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start,
    Disconnect,
    Opened { attempt: AttemptId },
    Frame { attempt: AttemptId, frame: String },
    TransportError { attempt: AttemptId, error: TransportError },
    ReconnectDue { attempt: AttemptId },
    WatchdogExpired { attempt: AttemptId },
}

// ---------------------------------------------------------------------------
// Effect: side effects for the actor to execute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenTransport { attempt: AttemptId },
    CloseTransport,
    ScheduleReconnect { attempt: AttemptId, delay: Duration },
    CancelReconnect,
    ArmWatchdog { attempt: AttemptId, delay: Duration },
    CancelWatchdog,
    /// Hand the frame to the decode pipeline.
    Decode(String),
}

// ---------------------------------------------------------------------------
// The transition function
// ---------------------------------------------------------------------------

pub fn transition(
    mut state: SupervisorState,
    input: Input,
    timing: &Timing,
) -> (SupervisorState, Vec<Effect>) {
    let mut effects = Vec::new();

    match input {
        Input::Start => {
            if !state.started {
                state.started = true;
                state.run_flag = true;
                connect(&mut state, &mut effects);
            }
        }

        Input::Disconnect => {
            state.run_flag = false;
            state.started = false;
            if state.handle_open {
                state.handle_open = false;
                effects.push(Effect::CloseTransport);
            }
            if state.reconnect_pending.take().is_some() {
                effects.push(Effect::CancelReconnect);
            }
            if state.liveness.is_armed() {
                state.liveness.disarm();
                effects.push(Effect::CancelWatchdog);
            }
            state.phase = ConnectionState::Disconnected;
            state.status = STATUS_DISCONNECTED.to_string();
        }

        Input::Opened { attempt } => {
            if state.is_current(attempt) && state.phase != ConnectionState::Connected {
                state.phase = ConnectionState::Connected;
                state.status = STATUS_CONNECTED.to_string();
                state.liveness.arm(attempt);
                effects.push(Effect::ArmWatchdog {
                    attempt,
                    delay: timing.watchdog_timeout,
                });
            }
        }

        Input::Frame { attempt, frame } => {
            if state.is_current(attempt) {
                state.frames_received += 1;
                state.liveness.observe_frame();
                effects.push(Effect::Decode(frame));
            }
        }

        Input::TransportError { attempt, .. } => {
            if state.is_current(attempt) {
                state.handle_open = false;
                effects.push(Effect::CloseTransport);
                if state.liveness.is_armed() {
                    state.liveness.disarm();
                    effects.push(Effect::CancelWatchdog);
                }

                if state.run_flag {
                    state.phase = ConnectionState::Reconnecting;
                    state.status = reconnecting_status(timing.reconnect_delay);
                    state.reconnect_pending = Some(attempt);
                    effects.push(Effect::ScheduleReconnect {
                        attempt,
                        delay: timing.reconnect_delay,
                    });
                } else {
                    state.phase = ConnectionState::Disconnected;
                    state.status = STATUS_DISCONNECTED.to_string();
                }
            }
        }

        Input::ReconnectDue { attempt } => {
            if state.reconnect_pending == Some(attempt) {
                state.reconnect_pending = None;
                if state.run_flag && state.phase != ConnectionState::Connected {
                    connect(&mut state, &mut effects);
                }
            }
        }

        Input::WatchdogExpired { attempt } => {
            if state.liveness.check(attempt) == Verdict::Silent && state.is_current(attempt) {
                state.status = STATUS_NO_HEARTBEAT.to_string();
            }
        }
    }

    (state, effects)
}

/// Begin a new attempt unless a handle is already open.
fn connect(state: &mut SupervisorState, effects: &mut Vec<Effect>) {
    if state.handle_open {
        return;
    }
    state.attempt += 1;
    state.handle_open = true;
    if state.phase != ConnectionState::Reconnecting {
        state.phase = ConnectionState::Connecting;
    }
    state.status = STATUS_CONNECTING.to_string();
    effects.push(Effect::OpenTransport {
        attempt: state.attempt,
    });
}
