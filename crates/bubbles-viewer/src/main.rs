//! Terminal viewer for the Bubbles live grid.
//!
//! The viewer connects to a bubble server, mirrors its grid in a text
//! rendering on stdout, and takes `connect` / `disconnect` / `quit`
//! commands on stdin. Logs go to stderr so they do not interleave with
//! the grid.
//!
//! # Architecture
//!
//! ```text
//! WebSocket stream ──┐
//! Liveness poller  ──┼──> ClientSession ──> TerminalSurface ──> stdout
//! stdin commands   ──┘
//! ```
//!
//! Every input funnels into one session task, which owns the grid, the
//! entity store, and the connection state.

mod commands;
mod config;
mod error;
mod terminal;

use bubbles_client::session;
use bubbles_client::{
    ActivitySource, ClientSession, Connector, HttpActivitySource, LivenessPoller, SessionHandle,
    WsConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{Input, USAGE};
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::terminal::TerminalSurface;

/// Application entry point.
///
/// Initializes logging, loads configuration, starts the session and the
/// liveness poller, then serves stdin commands until `quit`, end of input,
/// or Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the session fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("bubbles-viewer starting");

    let config = ViewerConfig::load()?;
    info!(
        stream_url = config.client.server.stream_url(),
        activity_url = config.client.server.activity_url(),
        liveness_interval_ms = config.client.liveness.interval_ms,
        reconnect = config.client.reconnect.enabled,
        "configuration loaded"
    );

    run(config).await?;

    info!("bubbles-viewer stopped");
    Ok(())
}

/// Wire the session, poller, and command loop together and run them.
async fn run(config: ViewerConfig) -> Result<(), ViewerError> {
    let mut surface = TerminalSurface::new(std::io::stdout(), config.viewer.frame_interval());
    if !config.viewer.clear_screen {
        surface = surface.without_clearing();
    }

    let (tx, rx) = session::channel();
    let session = ClientSession::new(
        surface,
        Connector::WebSocket(WsConnector::new(config.client.server.stream_url())),
        config.client.reconnect.policy(),
        tx,
    );
    let handle = session.session_handle();
    let session_task = tokio::spawn(session.run(rx));

    let source = HttpActivitySource::new(
        config.client.server.activity_url(),
        config.client.liveness.request_timeout(),
    )?;
    let poller = LivenessPoller::new(ActivitySource::Http(source), config.client.liveness.interval())
        .spawn(handle.sender());

    if config.viewer.connect_on_start {
        handle.connect().await?;
    }

    let outcome = serve_commands(&handle).await;

    let polls = poller.stop().await;
    // The session may already be gone if the command loop failed on it.
    let _ = handle.shutdown().await;
    let session = session_task
        .await
        .map_err(|e| ViewerError::Task(e.to_string()))?;
    session.into_surface().flush();
    info!(polls, "session closed");

    outcome
}

/// Read commands from stdin until `quit`, end of input, or Ctrl-C.
async fn serve_commands(handle: &SessionHandle) -> Result<(), ViewerError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("{USAGE}");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupted");
                return Ok(());
            }
        };
        let Some(line) = line else {
            info!("end of input");
            return Ok(());
        };

        match commands::parse(&line) {
            Input::Empty => {}
            Input::Session(command) => {
                info!(?command, "operator command");
                handle.command(command).await?;
            }
            Input::Quit => return Ok(()),
            Input::Help => eprintln!("{USAGE}"),
            Input::Unknown(word) => {
                warn!(input = word, "unknown command");
                eprintln!("{USAGE}");
            }
        }
    }
}
