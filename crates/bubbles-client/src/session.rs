//! Client session: the single owner of all mutable client state.
//!
//! The session holds the entity store, the grid, the connection
//! supervisor, the render surface, and the current stream handle. Every
//! input (user commands, stream events, poll results, scheduled
//! reconnects) arrives as a [`SessionEvent`] on one channel and is handled
//! to completion before the next one, so no locks are needed and updates
//! are applied strictly in arrival order.
//!
//! Stream events carry the epoch of the connection that produced them.
//! Anything from an older epoch is dropped, which is what keeps a torn-down
//! connection from leaking updates into the state of its successor.

use std::num::NonZeroU32;
use std::time::Duration;

use bubbles_types::{InfoSummary, StreamMessage};
use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::grid::Grid;
use crate::poller::ActivityOutcome;
use crate::reconciler::Reconciler;
use crate::store::EntityStore;
use crate::supervisor::{
    ConnectDecision, ConnectionState, LossAction, ReconnectPolicy, Supervisor,
};
use crate::surface::{Region, RenderSurface};
use crate::transport::{Connector, StreamHandle};

/// Capacity of the session event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Create the session event channel.
pub fn channel() -> (mpsc::Sender<SessionEvent>, mpsc::Receiver<SessionEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// User-facing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Open a fresh stream, tearing down the current one.
    Connect,
    /// Close the stream and clear all state.
    Disconnect,
    /// Disconnect and end the session loop.
    Shutdown,
}

/// What a transport observed on its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The handshake completed.
    Opened,
    /// One text frame arrived.
    Frame(String),
    /// The stream ended cleanly.
    Closed,
    /// The stream failed.
    Failed(String),
}

/// Everything the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user command.
    Command(Command),
    /// A reconnect scheduled after the stream of `epoch` was lost.
    Reconnect {
        /// Epoch that was current when the reconnect was scheduled.
        epoch: u64,
    },
    /// A transport event.
    Stream {
        /// Epoch of the stream that produced the event.
        epoch: u64,
        /// The event itself.
        event: StreamEvent,
    },
    /// A liveness poll result.
    Activity(ActivityOutcome),
}

/// Whether the session loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep processing events.
    Continue,
    /// The session was shut down.
    Stop,
}

/// Owner of the store, grid, supervisor, surface, and stream.
pub struct ClientSession<S> {
    surface: S,
    store: EntityStore,
    grid: Grid,
    supervisor: Supervisor,
    connector: Connector,
    stream: Option<StreamHandle>,
    events: mpsc::Sender<SessionEvent>,
}

impl<S: RenderSurface> ClientSession<S> {
    /// Create a disconnected session.
    ///
    /// `events` is the sending half of the channel the session will be run
    /// on; transports and reconnect timers report through it.
    pub fn new(
        surface: S,
        connector: Connector,
        policy: ReconnectPolicy,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            surface,
            store: EntityStore::new(),
            grid: Grid::new(),
            supervisor: Supervisor::new(policy),
            connector,
            stream: None,
            events,
        }
    }

    /// Process events until a [`Command::Shutdown`] arrives, then return
    /// the session for inspection.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> Self {
        info!("session started");
        while let Some(event) = events.recv().await {
            if self.handle(event) == Flow::Stop {
                break;
            }
        }
        self.close_stream();
        info!("session stopped");
        self
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: SessionEvent) -> Flow {
        let flow = match event {
            SessionEvent::Command(Command::Connect) => {
                self.connect();
                Flow::Continue
            }
            SessionEvent::Command(Command::Disconnect) => {
                self.disconnect();
                Flow::Continue
            }
            SessionEvent::Command(Command::Shutdown) => {
                self.disconnect();
                Flow::Stop
            }
            SessionEvent::Reconnect { epoch } => {
                if self.supervisor.reconnect_due(epoch) {
                    info!(epoch, "automatic reconnect");
                    self.connect();
                } else {
                    debug!(epoch, "scheduled reconnect no longer due");
                }
                Flow::Continue
            }
            SessionEvent::Stream { epoch, event } => {
                self.on_stream(epoch, event);
                Flow::Continue
            }
            SessionEvent::Activity(outcome) => {
                self.on_activity(&outcome);
                Flow::Continue
            }
        };
        self.surface.present();
        flow
    }

    /// Open a fresh stream unless a handshake is already in flight.
    ///
    /// The previous stream is torn down and every piece of entity and grid
    /// state is cleared before the new stream is opened.
    pub fn connect(&mut self) -> ConnectDecision {
        let decision = self.supervisor.request_connect();
        if let ConnectDecision::Proceed { epoch } = decision {
            self.close_stream();
            self.clear_state();
            self.stream = Some(self.connector.open(epoch, self.events.clone()));
        }
        decision
    }

    /// Close the stream and clear all state.
    pub fn disconnect(&mut self) {
        self.supervisor.disconnect();
        self.close_stream();
        self.clear_state();
    }

    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    fn clear_state(&mut self) {
        self.store.clear();
        self.grid.clear();
        self.surface.reset();
        self.surface.write_text(Region::Info, "");
        self.surface.write_text(Region::Error, "");
    }

    fn on_stream(&mut self, epoch: u64, event: StreamEvent) {
        if !self.supervisor.is_current(epoch) {
            debug!(
                epoch,
                current = self.supervisor.epoch(),
                "stale stream event ignored"
            );
            return;
        }
        match event {
            StreamEvent::Opened => {
                self.supervisor.on_opened(epoch);
            }
            StreamEvent::Frame(text) => self.on_frame(&text),
            StreamEvent::Closed => self.on_lost(epoch, None),
            StreamEvent::Failed(reason) => self.on_lost(epoch, Some(reason)),
        }
    }

    fn on_lost(&mut self, epoch: u64, reason: Option<String>) {
        let action = self.supervisor.on_lost(epoch);
        if action == LossAction::Stale {
            return;
        }
        self.stream = None;
        self.clear_state();
        match reason {
            Some(reason) => {
                warn!(epoch, error = %reason, "stream lost");
                let err = ClientError::Transport(reason);
                self.surface.write_text(Region::Error, &format!("stream: {err}"));
            }
            None => info!(epoch, "stream closed"),
        }
        if let LossAction::Reconnect(delay) = action {
            self.schedule_reconnect(epoch, delay);
        }
    }

    fn schedule_reconnect(&self, epoch: u64, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(epoch, "no async runtime, automatic reconnect skipped");
            return;
        };
        let events = self.events.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(SessionEvent::Reconnect { epoch }).await.is_err() {
                debug!(epoch, "session gone before reconnect");
            }
        });
        info!(epoch, delay = ?delay, "reconnect scheduled");
    }

    fn on_frame(&mut self, text: &str) {
        let message = match StreamMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                self.report_bad_frame(&ClientError::from(e));
                return;
            }
        };

        if let Some(info) = &message.info {
            self.surface.write_text(Region::Info, &info.readout());
        }

        match message.entity_update() {
            Ok(Some(update)) => {
                let id = update.id().clone();
                let outcome =
                    Reconciler::new(&mut self.store, &self.grid, &mut self.surface).apply(update);
                debug!(bubble_id = %id, ?outcome, "update applied");
            }
            Ok(None) => self.on_configuration(message.info.as_ref()),
            Err(e) => self.report_bad_frame(&ClientError::from(e)),
        }
    }

    fn on_configuration(&mut self, info: Option<&InfoSummary>) {
        let Some(size) = info.and_then(|i| i.grid_size).and_then(NonZeroU32::new) else {
            warn!("configuration frame without a positive grid size, rebuild skipped");
            return;
        };
        self.grid.rebuild(size, &mut self.surface);
        let dropped = Reconciler::new(&mut self.store, &self.grid, &mut self.surface).reattach_all();
        info!(size = size.get(), kept = self.store.len(), dropped, "grid configured");
    }

    fn report_bad_frame(&mut self, err: &ClientError) {
        warn!(error = %err, "malformed frame discarded");
        self.surface.write_text(Region::Error, &format!("stream: {err}"));
    }

    fn on_activity(&mut self, outcome: &ActivityOutcome) {
        self.surface.write_text(Region::Activity, &outcome.readout(&Local));
        if let Some(text) = outcome.error_text() {
            self.surface.write_text(Region::Error, &text);
        }
    }

    /// A command handle for this session.
    pub fn session_handle(&self) -> SessionHandle {
        SessionHandle::new(self.events.clone())
    }

    /// The render surface.
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the render surface.
    pub const fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// The entity store.
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The current grid.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Connection state.
    pub const fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Epoch of the most recent connection attempt.
    pub const fn epoch(&self) -> u64 {
        self.supervisor.epoch()
    }

    /// Consume the session and return its surface.
    pub fn into_surface(mut self) -> S {
        self.close_stream();
        self.surface
    }
}

/// Cloneable handle for sending commands to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Wrap the sending half of a session channel.
    pub const fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        Self { events }
    }

    /// Ask the session to connect.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.command(Command::Connect).await
    }

    /// Ask the session to disconnect.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Disconnect).await
    }

    /// Ask the session to stop.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.command(Command::Shutdown).await
    }

    /// Send a command.
    pub async fn command(&self, command: Command) -> Result<(), ClientError> {
        self.events
            .send(SessionEvent::Command(command))
            .await
            .map_err(|_send_err| ClientError::SessionClosed)
    }

    /// A sender for background tasks reporting into the session.
    pub fn sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events.clone()
    }
}
