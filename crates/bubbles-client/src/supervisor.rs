//! Connection lifecycle state machine.
//!
//! ```text
//! Disconnected --connect--> Connecting --opened--> Connected
//!      ^                        |                     |
//!      +------ closed/failed ---+---------------------+
//! ```
//!
//! Every accepted connect request allocates a new epoch. Stream events
//! carry the epoch of the connection that produced them, so events from a
//! torn-down connection are recognised and dropped. A connect request while
//! a handshake is in flight is refused.

use std::time::Duration;

use tracing::{debug, info};

/// Lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No stream is open or opening.
    #[default]
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// The stream is open and delivering frames.
    Connected,
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// What to do after the stream is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay disconnected until asked to connect again.
    #[default]
    Manual,
    /// Reconnect with exponential backoff.
    Backoff {
        /// Delay before the first attempt.
        initial: Duration,
        /// Upper bound for the doubled delay.
        max: Duration,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (zero-based), or
    /// `None` under [`Manual`](Self::Manual).
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Manual => None,
            Self::Backoff { initial, max } => {
                let factor = 1_u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }
}

/// Result of a connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDecision {
    /// A handshake is already in flight; nothing was done.
    AlreadyConnecting,
    /// Tear down the previous connection and open a new one with this epoch.
    Proceed {
        /// Epoch allocated to the new connection.
        epoch: u64,
    },
}

/// Result of a stream loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossAction {
    /// The event belongs to a torn-down connection; nothing changed.
    Stale,
    /// The live connection is gone; stay disconnected.
    StayDisconnected,
    /// The live connection is gone; reconnect after the delay.
    Reconnect(Duration),
}

/// Tracks connection state, the current epoch, and reconnect attempts.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    state: ConnectionState,
    epoch: u64,
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Supervisor {
    /// A disconnected supervisor at epoch 0.
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            policy,
            attempts: 0,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Epoch of the most recent connection attempt.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether an event tagged with `epoch` belongs to the live connection.
    pub const fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    /// Handle a connect request.
    pub fn request_connect(&mut self) -> ConnectDecision {
        if self.state == ConnectionState::Connecting {
            debug!(epoch = self.epoch, "connect ignored, handshake in flight");
            return ConnectDecision::AlreadyConnecting;
        }
        self.epoch = self.epoch.wrapping_add(1);
        self.state = ConnectionState::Connecting;
        info!(epoch = self.epoch, "connecting");
        ConnectDecision::Proceed { epoch: self.epoch }
    }

    /// The stream for `epoch` finished its handshake. Returns `false` for
    /// stale epochs.
    pub fn on_opened(&mut self, epoch: u64) -> bool {
        if !self.is_current(epoch) || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        info!(epoch, "connected");
        true
    }

    /// The stream for `epoch` closed or failed.
    ///
    /// Stale epochs (and losses while already disconnected) change
    /// nothing. Otherwise the state drops to `Disconnected` and the
    /// reconnect policy decides what happens next.
    pub fn on_lost(&mut self, epoch: u64) -> LossAction {
        if !self.is_current(epoch) || self.state == ConnectionState::Disconnected {
            return LossAction::Stale;
        }
        self.state = ConnectionState::Disconnected;
        match self.policy.delay(self.attempts) {
            Some(delay) => {
                self.attempts = self.attempts.saturating_add(1);
                LossAction::Reconnect(delay)
            }
            None => LossAction::StayDisconnected,
        }
    }

    /// Manual disconnect. Invalidates the current epoch so late events and
    /// pending reconnects are dropped.
    pub fn disconnect(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.state = ConnectionState::Disconnected;
        self.attempts = 0;
        info!(epoch = self.epoch, "disconnected");
    }

    /// Whether a reconnect scheduled at `epoch` should still run.
    pub fn reconnect_due(&self, epoch: u64) -> bool {
        self.is_current(epoch) && self.state == ConnectionState::Disconnected
    }
}
