//! Client-side synchronization engine for the Bubbles live grid.
//!
//! The crate keeps a render surface in step with a remote bubble server:
//!
//! - **Stream transport** (`/ws`) delivering one JSON frame per bubble
//!   update, opened and supervised by the [`ClientSession`]
//! - **Reconciler** turning each update into the minimal set of surface
//!   mutations against the [`EntityStore`]
//! - **Grid initializer** (re)building the cell space from configuration
//!   frames
//! - **Liveness poller** asking `api/activity` for the server's last
//!   activity on a fixed interval, independent of the stream
//!
//! # Architecture
//!
//! One session task owns every piece of mutable state and consumes a single
//! [`tokio::sync::mpsc`] channel of [`SessionEvent`]s. Transport and poller
//! tasks only ever send into that channel, tagging stream events with a
//! connection epoch so that events from a torn-down connection are dropped.
//!
//! Drawing is delegated to a [`RenderSurface`]. The in-memory [`Scene`]
//! is the surface used by the terminal viewer and by tests.

pub mod activity;
pub mod config;
pub mod error;
pub mod grid;
pub mod poller;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod surface;
pub mod transport;

// Re-export primary types for convenience.
pub use activity::{ActivitySource, HttpActivitySource, ScriptedActivitySource};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use grid::Grid;
pub use poller::{ActivityOutcome, LivenessPoller, PollerHandle};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use session::{ClientSession, Command, Flow, SessionEvent, SessionHandle, StreamEvent};
pub use store::{EntityRecord, EntityStore};
pub use supervisor::{ConnectDecision, ConnectionState, ReconnectPolicy, Supervisor};
pub use surface::{CellId, NodeId, RecordingSurface, Region, RenderSurface, Scene, SurfaceCall};
pub use transport::{Connector, MemoryConnector, MemoryStream, StreamHandle, WsConnector};
