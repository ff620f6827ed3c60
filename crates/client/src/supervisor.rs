//! Reconnection supervisor actor
//!
//! Owns the connection slot, the run flag and both timers. Commands from
//! the session, transport events and timer expirations are serialized
//! through one task and fed to `transition`; the resulting effects are
//! executed here. Lock-free reads go through `ArcSwap`.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use livesync_connector_core::{
    create_event_channel, AttemptId, EventSink, StreamConnection, TaggedEvent, TransportEvent,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pipeline::FramePipeline;
use crate::store::Store;
use crate::transition::{transition, Effect, Input, SupervisorState, Timing};

/// Commands accepted by the supervisor actor
#[derive(Debug)]
pub enum SupervisorCommand {
    Start,
    Disconnect,
    Shutdown { reply: oneshot::Sender<()> },
}

#[derive(Debug, Clone, Copy)]
enum TimerFired {
    Reconnect(AttemptId),
    Watchdog(AttemptId),
}

/// Handle to a running supervisor (cheap to Clone).
#[derive(Clone)]
pub struct SupervisorHandle {
    command_tx: mpsc::Sender<SupervisorCommand>,
    snapshot: Arc<ArcSwap<SupervisorState>>,
}

impl SupervisorHandle {
    /// Spawn the actor. The returned task ends after `shutdown`.
    pub fn spawn(
        connection: StreamConnection,
        timing: Timing,
        store: Arc<Store>,
        pipeline: FramePipeline,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let snapshot = Arc::new(ArcSwap::from_pointee(SupervisorState::default()));
        let (events_tx, events_rx) = create_event_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        info!(
            component = "supervisor",
            event = "supervisor.spawned",
            transport = connection.transport_name(),
            url = %connection.url(),
            reconnect_delay_ms = timing.reconnect_delay.as_millis() as u64,
            watchdog_timeout_ms = timing.watchdog_timeout.as_millis() as u64,
        );

        let actor = Supervisor {
            state: SupervisorState::default(),
            timing,
            connection,
            events_tx,
            timer_tx,
            reconnect_timer: None,
            watchdog_timer: None,
            store,
            pipeline,
            snapshot: snapshot.clone(),
        };
        let task = tokio::spawn(actor.run(command_rx, events_rx, timer_rx));

        (
            Self {
                command_tx,
                snapshot,
            },
            task,
        )
    }

    /// Idempotent start. Concurrent triggers collapse to one connection.
    pub async fn start_if_not_running(&self) {
        self.send(SupervisorCommand::Start).await;
    }

    /// Stop auto-reconnect and close the connection.
    pub async fn disconnect(&self) {
        self.send(SupervisorCommand::Disconnect).await;
    }

    /// Disconnect and stop the actor, waiting for it to acknowledge.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        self.send(SupervisorCommand::Shutdown { reply }).await;
        let _ = done.await;
    }

    /// Lock-free snapshot read.
    pub fn snapshot(&self) -> Arc<SupervisorState> {
        self.snapshot.load_full()
    }

    async fn send(&self, cmd: SupervisorCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(
                component = "supervisor",
                event = "supervisor.channel_closed",
                "Supervisor channel closed, command dropped"
            );
        }
    }
}

struct Supervisor {
    state: SupervisorState,
    timing: Timing,
    connection: StreamConnection,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    reconnect_timer: Option<JoinHandle<()>>,
    watchdog_timer: Option<JoinHandle<()>>,
    store: Arc<Store>,
    pipeline: FramePipeline,
    snapshot: Arc<ArcSwap<SupervisorState>>,
}

impl Supervisor {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SupervisorCommand>,
        mut events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    ) {
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(SupervisorCommand::Start) => self.apply(Input::Start),
                    Some(SupervisorCommand::Disconnect) => self.apply(Input::Disconnect),
                    Some(SupervisorCommand::Shutdown { reply }) => {
                        self.apply(Input::Disconnect);
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.apply(Input::Disconnect);
                        break;
                    }
                },

                Some(tagged) = events_rx.recv() => {
                    let input = self.event_input(tagged);
                    self.apply(input);
                }

                Some(fired) = timer_rx.recv() => {
                    let input = match fired {
                        TimerFired::Reconnect(attempt) => {
                            self.reconnect_timer = None;
                            Input::ReconnectDue { attempt }
                        }
                        TimerFired::Watchdog(attempt) => {
                            self.watchdog_timer = None;
                            Input::WatchdogExpired { attempt }
                        }
                    };
                    self.apply(input);
                }
            }
        }

        debug!(component = "supervisor", event = "supervisor.stopped");
    }

    fn event_input(&self, tagged: TaggedEvent) -> Input {
        let attempt = tagged.attempt;
        match tagged.event {
            TransportEvent::Open => {
                info!(
                    component = "supervisor",
                    event = "supervisor.transport_open",
                    attempt,
                );
                Input::Opened { attempt }
            }
            TransportEvent::Message(frame) => Input::Frame { attempt, frame },
            TransportEvent::Error(error) => {
                warn!(
                    component = "supervisor",
                    event = "supervisor.transport_error",
                    attempt,
                    current_attempt = self.state.attempt,
                    error = %error,
                );
                Input::TransportError { attempt, error }
            }
        }
    }

    fn apply(&mut self, input: Input) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = transition(state, input, &self.timing);
        self.state = state;

        for effect in effects {
            self.execute(effect);
        }
        self.publish();
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport { attempt } => {
                let sink = EventSink::new(attempt, self.events_tx.clone());
                if self.connection.open(sink) {
                    info!(
                        component = "supervisor",
                        event = "supervisor.connecting",
                        attempt,
                        transport = self.connection.transport_name(),
                    );
                }
            }
            Effect::CloseTransport => {
                if self.connection.close() {
                    info!(
                        component = "supervisor",
                        event = "supervisor.transport_closed",
                        attempt = self.state.attempt,
                        frames_received = self.state.frames_received,
                    );
                }
            }
            Effect::ScheduleReconnect { attempt, delay } => {
                info!(
                    component = "supervisor",
                    event = "supervisor.reconnect_scheduled",
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                );
                let timer = self.schedule(delay, TimerFired::Reconnect(attempt));
                replace_timer(&mut self.reconnect_timer, Some(timer));
            }
            Effect::CancelReconnect => {
                replace_timer(&mut self.reconnect_timer, None);
            }
            Effect::ArmWatchdog { attempt, delay } => {
                let timer = self.schedule(delay, TimerFired::Watchdog(attempt));
                replace_timer(&mut self.watchdog_timer, Some(timer));
            }
            Effect::CancelWatchdog => {
                replace_timer(&mut self.watchdog_timer, None);
            }
            Effect::Decode(frame) => {
                if !self.pipeline.submit(frame) {
                    warn!(
                        component = "supervisor",
                        event = "supervisor.pipeline_closed",
                        "Decode pipeline closed, frame dropped"
                    );
                }
            }
        }
    }

    fn schedule(&self, delay: Duration, fired: TimerFired) -> JoinHandle<()> {
        let tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fired);
        })
    }

    fn publish(&self) {
        self.snapshot.store(Arc::new(self.state.clone()));
        if self
            .store
            .set_connection(self.state.phase, &self.state.status)
        {
            info!(
                component = "supervisor",
                event = "supervisor.status",
                phase = %self.state.phase,
                status = %self.state.status,
                attempt = self.state.attempt,
            );
        }
    }
}

fn replace_timer(slot: &mut Option<JoinHandle<()>>, timer: Option<JoinHandle<()>>) {
    if let Some(previous) = std::mem::replace(slot, timer) {
        previous.abort();
    }
}
