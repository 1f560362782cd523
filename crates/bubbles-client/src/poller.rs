//! Liveness poller.
//!
//! A fixed-interval loop that asks the server when it was last active and
//! forwards the answer to the session as [`SessionEvent::Activity`]. The
//! loop does not care whether the stream is connected, and a failed poll
//! never stops it. The next poll starts one interval after the previous
//! one finished.
//!
//! Cancellation is explicit: [`PollerHandle::stop`] interrupts both the
//! wait and any in-flight request, then joins the task.

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::activity::ActivitySource;
use crate::session::SessionEvent;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// The server reported its last activity.
    Fresh(DateTime<Utc>),
    /// The poll failed; the reason is shown to the user.
    Unavailable(String),
}

impl ActivityOutcome {
    /// Text for the activity region, rendered in the given time zone.
    /// Empty when the poll failed.
    pub fn readout<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: Display,
    {
        match self {
            Self::Fresh(at) => format!(
                "last server activity: {}",
                at.with_timezone(tz).format("%H:%M:%S")
            ),
            Self::Unavailable(_) => String::new(),
        }
    }

    /// Text for the error region, `None` when the poll succeeded.
    pub fn error_text(&self) -> Option<String> {
        match self {
            Self::Fresh(_) => None,
            Self::Unavailable(reason) => Some(format!("activity: {reason}")),
        }
    }
}

/// Fixed-interval activity poller.
#[derive(Debug, Clone)]
pub struct LivenessPoller {
    source: ActivitySource,
    interval: Duration,
}

impl LivenessPoller {
    /// Poll `source` every `interval`.
    pub const fn new(source: ActivitySource, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Start polling in a background task that reports into `sink`.
    pub fn spawn(self, sink: mpsc::Sender<SessionEvent>) -> PollerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(sink, stop_rx));
        PollerHandle {
            stop: stop_tx,
            task,
        }
    }

    /// Poll until stopped or until the session channel closes. Returns the
    /// number of completed polls.
    async fn run(self, sink: mpsc::Sender<SessionEvent>, mut stop: watch::Receiver<bool>) -> u64 {
        info!(interval = ?self.interval, "liveness poller started");
        let mut polls: u64 = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = stop.changed() => break,
                result = self.source.last_activity() => match result {
                    Ok(response) => response.timestamp().map_or_else(
                        || ActivityOutcome::Unavailable(format!(
                            "timestamp {} out of range",
                            response.last_activity
                        )),
                        ActivityOutcome::Fresh,
                    ),
                    Err(e) => {
                        debug!(error = %e, "activity poll failed");
                        ActivityOutcome::Unavailable(e.to_string())
                    }
                },
            };
            polls = polls.saturating_add(1);

            if sink.send(SessionEvent::Activity(outcome)).await.is_err() {
                debug!("session gone, liveness poller stopping");
                break;
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
        info!(polls, "liveness poller stopped");
        polls
    }
}

/// Running poller.
#[derive(Debug)]
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl PollerHandle {
    /// Stop the loop, interrupting any in-flight request, and wait for it.
    /// Returns the number of completed polls.
    pub async fn stop(self) -> u64 {
        // Sending fails only if the task already exited.
        let _ = self.stop.send(true);
        self.task.await.unwrap_or(0)
    }

    /// Whether the loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
