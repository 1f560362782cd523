//! Integration tests for the client session.
//!
//! Streams are played through the in-memory connector, so every test is
//! deterministic. Synchronous tests feed events straight into
//! [`ClientSession::handle`]; async tests run the real session loop.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use bubbles_client::{
    ActivityOutcome, ActivitySource, CellId, ClientSession, ConnectDecision, ConnectionState,
    Connector, LivenessPoller, MemoryConnector, MemoryStream, RecordingSurface, Region,
    ReconnectPolicy, Scene, ScriptedActivitySource, SessionEvent, StreamEvent, SurfaceCall,
    session,
};
use bubbles_types::BubbleId;
use tokio::sync::mpsc;

use common::{bubble_frame, config_frame, finish_frame, is_node_call, node};

type TestSession = ClientSession<RecordingSurface<Scene>>;

fn new_session(
    policy: ReconnectPolicy,
) -> (
    TestSession,
    mpsc::UnboundedReceiver<MemoryStream>,
    mpsc::Receiver<SessionEvent>,
) {
    let (connector, streams) = MemoryConnector::new();
    let (tx, rx) = session::channel();
    let session = ClientSession::new(
        RecordingSurface::new(Scene::new()),
        Connector::Memory(connector),
        policy,
        tx,
    );
    (session, streams, rx)
}

fn frame(epoch: u64, text: &str) -> SessionEvent {
    SessionEvent::Stream {
        epoch,
        event: StreamEvent::Frame(text.to_owned()),
    }
}

fn opened(epoch: u64) -> SessionEvent {
    SessionEvent::Stream {
        epoch,
        event: StreamEvent::Opened,
    }
}

/// Epoch allocated by an accepted connect request.
fn accepted(decision: ConnectDecision) -> u64 {
    assert!(matches!(decision, ConnectDecision::Proceed { .. }));
    match decision {
        ConnectDecision::Proceed { epoch } => epoch,
        ConnectDecision::AlreadyConnecting => 0,
    }
}

/// Connect, open the stream, and apply a configuration frame.
fn connected_with_grid(session: &mut TestSession, size: u32) -> u64 {
    let epoch = accepted(session.connect());
    session.handle(opened(epoch));
    session.handle(frame(epoch, &config_frame(size)));
    session.surface_mut().take_calls();
    epoch
}

// =============================================================================
// Reconciliation through the session
// =============================================================================

#[test]
fn three_by_three_lifecycle_scenario() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = accepted(session.connect());
    session.handle(opened(epoch));
    session.handle(frame(epoch, &config_frame(3)));

    let cells: Vec<CellId> = session.surface().inner().cell_ids();
    let expected: Vec<CellId> = (0..3)
        .flat_map(|r| (0..3).map(move |c| CellId::new(r, c)))
        .collect();
    assert_eq!(cells, expected);
    assert_eq!(
        cells.first().map(ToString::to_string).as_deref(),
        Some("cell_0_0")
    );

    // Create "a" at (1,2), visible.
    session.surface_mut().take_calls();
    session.handle(frame(epoch, &bubble_frame("a", 1, 2, "rare", false)));
    let calls = session.surface_mut().take_calls();
    assert!(calls.contains(&SurfaceCall::CreateNode {
        node: node("a"),
        classes: "bubble bubble-rare".to_owned(),
    }));
    assert!(calls.contains(&SurfaceCall::Attach {
        node: node("a"),
        cell: CellId::new(1, 2),
    }));
    assert!(!calls.iter().any(|c| matches!(c, SurfaceCall::AddFlag { .. })));

    // Same position, now invisible: only the flag changes.
    session.handle(frame(epoch, &bubble_frame("a", 1, 2, "rare", true)));
    let node_calls: Vec<SurfaceCall> = session
        .surface_mut()
        .take_calls()
        .into_iter()
        .filter(is_node_call)
        .collect();
    assert_eq!(
        node_calls,
        vec![SurfaceCall::AddFlag {
            node: node("a"),
            flag: "invisible".to_owned(),
        }]
    );
    let scene = session.surface().inner();
    assert_eq!(scene.children(CellId::new(1, 2)), &[node("a")]);
    assert!(scene.node(&node("a")).unwrap().has_class("invisible"));

    // Finish: detached exactly once, store empty.
    session.handle(frame(epoch, &finish_frame("a")));
    let calls = session.surface_mut().take_calls();
    assert_eq!(
        calls.iter().filter(|c| matches!(c, SurfaceCall::Detach(_))).count(),
        1
    );
    assert!(session.store().is_empty());
    assert!(session.surface().inner().children(CellId::new(1, 2)).is_empty());
}

#[test]
fn stale_finish_is_a_no_op() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);

    session.handle(frame(epoch, &finish_frame("ghost")));
    assert!(session.store().is_empty());
    assert_eq!(session.surface().count(is_node_call), 0);
}

#[test]
fn identical_update_causes_no_node_calls() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);
    session.handle(frame(epoch, &bubble_frame("a", 0, 1, "common", true)));
    session.surface_mut().take_calls();

    session.handle(frame(epoch, &bubble_frame("a", 0, 1, "common", true)));
    assert_eq!(session.surface().count(is_node_call), 0);
    assert_eq!(session.store().len(), 1);
}

#[test]
fn at_most_one_record_per_id() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 4);
    for (row, column) in [(0, 0), (1, 1), (2, 2), (3, 3)] {
        session.handle(frame(epoch, &bubble_frame("a", row, column, "dark", false)));
    }
    assert_eq!(session.store().len(), 1);
    let record = session.store().get(&BubbleId::from("a")).unwrap();
    assert_eq!(record.attachment, Some(CellId::new(3, 3)));
    assert_eq!(
        session
            .surface()
            .count(|c| matches!(c, SurfaceCall::CreateNode { .. })),
        1
    );
}

#[test]
fn grid_rebuild_reattaches_and_drops_out_of_range() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);
    session.handle(frame(epoch, &bubble_frame("inside", 0, 0, "light", false)));
    session.handle(frame(epoch, &bubble_frame("outside", 2, 2, "dark", false)));

    session.handle(frame(epoch, &config_frame(2)));
    let scene = session.surface().inner();
    assert_eq!(scene.cell_ids().len(), 4);
    assert_eq!(scene.children(CellId::new(0, 0)), &[node("inside")]);
    assert!(!session.store().contains(&BubbleId::from("outside")));
    assert_eq!(
        session.store().get(&BubbleId::from("inside")).unwrap().attachment,
        Some(CellId::new(0, 0))
    );
}

#[test]
fn live_update_without_position_is_reported() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);
    session.handle(frame(epoch, r#"{"info":{"seed":"1","total_bubbles":1},"bubble":{"id":"a"}}"#));

    assert!(session.store().is_empty());
    assert_eq!(
        session.surface().inner().text(Region::Error),
        "stream: frame error: bubble a has no position"
    );
}

#[test]
fn info_region_tracks_every_frame() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);
    session.handle(frame(epoch, &bubble_frame("a", 0, 0, "common", false)));
    assert_eq!(
        session.surface().inner().text(Region::Info),
        "seed: 1234 | total bubbles: 1"
    );
}

// =============================================================================
// Connection supervision
// =============================================================================

#[test]
fn connect_while_connecting_opens_nothing() {
    let (mut session, mut streams, _rx) = new_session(ReconnectPolicy::Manual);
    session.connect();
    assert_eq!(session.connect(), ConnectDecision::AlreadyConnecting);

    assert_eq!(streams.try_recv().map(|s| s.epoch()).ok(), Some(1));
    assert!(streams.try_recv().is_err());
    assert_eq!(session.state(), ConnectionState::Connecting);
}

#[test]
fn reconnect_clears_state_before_new_stream_frames() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let old = connected_with_grid(&mut session, 3);
    session.handle(frame(old, &bubble_frame("a", 1, 1, "common", false)));
    assert_eq!(session.store().len(), 1);

    let new = accepted(session.connect());
    assert!(session.store().is_empty());
    assert!(session.surface().inner().is_empty());
    assert_eq!(session.surface().inner().text(Region::Info), "");
    assert!(session.surface().calls().contains(&SurfaceCall::Reset));

    // A late frame from the old stream must not resurrect anything.
    session.handle(frame(old, &bubble_frame("a", 1, 1, "common", false)));
    assert!(session.store().is_empty());

    session.handle(opened(new));
    session.handle(frame(new, &config_frame(3)));
    session.handle(frame(new, &bubble_frame("b", 2, 0, "common", false)));
    assert_eq!(session.store().len(), 1);
    assert!(session.store().contains(&BubbleId::from("b")));
}

#[test]
fn clean_close_clears_state_without_error() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);
    session.handle(frame(epoch, &bubble_frame("a", 1, 1, "common", false)));

    session.handle(SessionEvent::Stream {
        epoch,
        event: StreamEvent::Closed,
    });
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(session.store().is_empty());
    assert_eq!(session.grid().size(), None);
    assert_eq!(session.surface().inner().text(Region::Error), "");
}

#[test]
fn disconnect_clears_info_and_error() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    let epoch = connected_with_grid(&mut session, 3);
    session.handle(frame(epoch, "not json"));
    assert!(!session.surface().inner().text(Region::Error).is_empty());

    session.disconnect();
    let scene = session.surface().inner();
    assert_eq!(scene.text(Region::Info), "");
    assert_eq!(scene.text(Region::Error), "");
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

// =============================================================================
// Session loop
// =============================================================================

#[tokio::test]
async fn run_loop_applies_stream_in_order() {
    let (session, mut streams, rx) = new_session(ReconnectPolicy::Manual);
    let handle = session.session_handle();
    let task = tokio::spawn(session.run(rx));

    handle.connect().await.unwrap();
    let stream = streams.recv().await.unwrap();
    assert!(stream.open().await);
    assert!(stream.frame(config_frame(3)).await);
    assert!(stream.frame(bubble_frame("a", 1, 2, "common", false)).await);
    assert!(stream.frame(bubble_frame("a", 1, 2, "common", true)).await);
    assert!(stream.frame(finish_frame("a")).await);
    handle.shutdown().await.unwrap();

    let session = task.await.unwrap();
    let calls = session.surface().calls();
    let node_calls: Vec<&SurfaceCall> = calls.iter().filter(|c| is_node_call(c)).collect();
    assert_eq!(
        node_calls,
        vec![
            &SurfaceCall::CreateNode {
                node: node("a"),
                classes: "bubble bubble-common".to_owned(),
            },
            &SurfaceCall::Attach {
                node: node("a"),
                cell: CellId::new(1, 2),
            },
            &SurfaceCall::AddFlag {
                node: node("a"),
                flag: "invisible".to_owned(),
            },
            &SurfaceCall::Detach(node("a")),
            &SurfaceCall::Release(node("a")),
        ]
    );
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(handle.connect().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn automatic_reconnect_after_loss() {
    let (session, mut streams, rx) = new_session(ReconnectPolicy::Backoff {
        initial: Duration::from_millis(500),
        max: Duration::from_secs(5),
    });
    let handle = session.session_handle();
    let task = tokio::spawn(session.run(rx));

    handle.connect().await.unwrap();
    let first = streams.recv().await.unwrap();
    first.open().await;
    first.frame(config_frame(3)).await;
    let lost_at = tokio::time::Instant::now();
    first.fail("connection reset").await;

    let second = streams.recv().await.unwrap();
    assert!(lost_at.elapsed() >= Duration::from_millis(500));
    assert!(second.epoch() > first.epoch());

    // Frames from the dead stream are ignored; the new one works.
    first.frame(bubble_frame("ghost", 0, 0, "common", false)).await;
    second.open().await;
    second.frame(config_frame(2)).await;
    second.frame(bubble_frame("b", 1, 1, "common", false)).await;
    handle.shutdown().await.unwrap();

    let session = task.await.unwrap();
    let created: Vec<&SurfaceCall> = session
        .surface()
        .calls()
        .iter()
        .filter(|c| matches!(c, SurfaceCall::CreateNode { .. }))
        .collect();
    assert_eq!(
        created,
        vec![&SurfaceCall::CreateNode {
            node: node("b"),
            classes: "bubble bubble-common".to_owned(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn manual_disconnect_cancels_scheduled_reconnect() {
    let (session, mut streams, rx) = new_session(ReconnectPolicy::Backoff {
        initial: Duration::from_millis(500),
        max: Duration::from_secs(5),
    });
    let handle = session.session_handle();
    let task = tokio::spawn(session.run(rx));

    handle.connect().await.unwrap();
    let stream = streams.recv().await.unwrap();
    stream.open().await;
    stream.close().await;
    handle.disconnect().await.unwrap();

    let next = tokio::time::timeout(Duration::from_secs(10), streams.recv()).await;
    assert!(next.is_err(), "no stream may be opened after a manual disconnect");

    handle.shutdown().await.unwrap();
    let session = task.await.unwrap();
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn poller_keeps_reporting_while_disconnected() {
    let (session, _streams, rx) = new_session(ReconnectPolicy::Manual);
    let handle = session.session_handle();
    let task = tokio::spawn(session.run(rx));

    let source = ActivitySource::Scripted(ScriptedActivitySource::new([
        Ok(1_700_000_000_000),
        Err("request failed: connection refused".to_owned()),
        Ok(1_700_000_002_000),
    ]));
    let poller = LivenessPoller::new(source, Duration::from_millis(2000)).spawn(handle.sender());

    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(poller.stop().await, 3);
    handle.shutdown().await.unwrap();

    let session = task.await.unwrap();
    let activity: Vec<String> = session
        .surface()
        .calls()
        .iter()
        .filter_map(|c| match c {
            SurfaceCall::WriteText {
                region: Region::Activity,
                text,
            } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(activity.len(), 3);
    assert!(activity.first().unwrap().starts_with("last server activity: "));
    assert_eq!(activity.get(1).map(String::as_str), Some(""));
    assert!(activity.get(2).unwrap().starts_with("last server activity: "));
    assert!(session.surface().calls().contains(&SurfaceCall::WriteText {
        region: Region::Error,
        text: "activity: status request error: request failed: connection refused".to_owned(),
    }));
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[test]
fn activity_outcome_round_trip_through_session() {
    let (mut session, _streams, _rx) = new_session(ReconnectPolicy::Manual);
    session.handle(SessionEvent::Activity(ActivityOutcome::Unavailable(
        "server returned 503 Service Unavailable".to_owned(),
    )));
    assert_eq!(
        session.surface().inner().text(Region::Error),
        "activity: server returned 503 Service Unavailable"
    );
}
