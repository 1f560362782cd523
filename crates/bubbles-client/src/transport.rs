//! Stream transports.
//!
//! A connector opens one stream per connection epoch and forwards what it
//! receives into the session channel as [`SessionEvent::Stream`] events
//! tagged with that epoch. Transports never touch session state.
//!
//! Uses enum dispatch like the activity sources: the session holds one
//! [`Connector`] and calls [`Connector::open`] on every accepted connect.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::session::{SessionEvent, StreamEvent};

// ---------------------------------------------------------------------------
// Stream handle
// ---------------------------------------------------------------------------

/// Owner of one open (or opening) stream.
///
/// Dropping the handle aborts the reader task, so replacing or discarding
/// it is enough to tear the connection down.
#[derive(Debug)]
pub struct StreamHandle {
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Handle owning a spawned reader task.
    pub const fn spawned(epoch: u64, task: JoinHandle<()>) -> Self {
        Self {
            epoch,
            task: Some(task),
        }
    }

    /// Handle for a stream driven from outside (no task to abort).
    pub const fn detached(epoch: u64) -> Self {
        Self { epoch, task: None }
    }

    /// Epoch of the stream.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Abort the reader task, if any.
    pub fn close(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(epoch = self.epoch, "stream task aborted");
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

// ---------------------------------------------------------------------------
// Connector dispatch
// ---------------------------------------------------------------------------

/// The transport a session opens streams with.
#[derive(Debug, Clone)]
pub enum Connector {
    /// WebSocket transport for a real server.
    WebSocket(WsConnector),
    /// In-process transport driven through [`MemoryStream`] handles.
    Memory(MemoryConnector),
}

impl Connector {
    /// Open a stream for `epoch` that reports into `sink`.
    pub fn open(&self, epoch: u64, sink: mpsc::Sender<SessionEvent>) -> StreamHandle {
        match self {
            Self::WebSocket(ws) => ws.open(epoch, sink),
            Self::Memory(mem) => mem.open(epoch, sink),
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// Opens WebSocket streams with `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Connector for the given `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The stream URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn open(&self, epoch: u64, sink: mpsc::Sender<SessionEvent>) -> StreamHandle {
        let url = self.url.clone();
        let task = tokio::spawn(async move {
            read_stream(url, epoch, sink).await;
        });
        StreamHandle::spawned(epoch, task)
    }
}

/// Connect, then forward every text frame until the stream ends or the
/// session stops listening.
async fn read_stream(url: String, epoch: u64, sink: mpsc::Sender<SessionEvent>) {
    let send = |event: StreamEvent| {
        let sink = sink.clone();
        async move { sink.send(SessionEvent::Stream { epoch, event }).await.is_ok() }
    };

    let mut ws = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(epoch, url = %url, error = %e, "stream connect failed");
            send(StreamEvent::Failed(format!("connect to {url} failed: {e}"))).await;
            return;
        }
    };
    if !send(StreamEvent::Opened).await {
        return;
    }

    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if !send(StreamEvent::Frame(text.as_str().to_owned())).await {
                    debug!(epoch, "session gone, stream reader stopping");
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                debug!(epoch, ?frame, "server closed stream");
                break;
            }
            Ok(Message::Binary(_)) => {
                debug!(epoch, "binary frame ignored");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(epoch, error = %e, "stream read failed");
                send(StreamEvent::Failed(e.to_string())).await;
                return;
            }
        }
    }
    send(StreamEvent::Closed).await;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process connector. Every `open` hands a [`MemoryStream`] to the
/// receiver returned by [`MemoryConnector::new`], whose holder then plays
/// the server.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    opened: mpsc::UnboundedSender<MemoryStream>,
}

impl MemoryConnector {
    /// Create a connector and the receiver of the streams it opens.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryStream>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (Self { opened }, rx)
    }

    fn open(&self, epoch: u64, sink: mpsc::Sender<SessionEvent>) -> StreamHandle {
        if self.opened.send(MemoryStream { epoch, sink }).is_err() {
            debug!(epoch, "memory stream opened with nobody listening");
        }
        StreamHandle::detached(epoch)
    }
}

/// Server side of one in-memory stream.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    epoch: u64,
    sink: mpsc::Sender<SessionEvent>,
}

impl MemoryStream {
    /// Epoch the session allocated to this stream.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Complete the handshake.
    pub async fn open(&self) -> bool {
        self.emit(StreamEvent::Opened).await
    }

    /// Deliver one text frame.
    pub async fn frame(&self, text: impl Into<String>) -> bool {
        self.emit(StreamEvent::Frame(text.into())).await
    }

    /// Close the stream cleanly.
    pub async fn close(&self) -> bool {
        self.emit(StreamEvent::Closed).await
    }

    /// Fail the stream with a transport error.
    pub async fn fail(&self, reason: impl Into<String>) -> bool {
        self.emit(StreamEvent::Failed(reason.into())).await
    }

    async fn emit(&self, event: StreamEvent) -> bool {
        self.sink
            .send(SessionEvent::Stream {
                epoch: self.epoch,
                event,
            })
            .await
            .is_ok()
    }
}
