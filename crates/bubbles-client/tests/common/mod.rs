//! Shared helpers for the bubbles-client integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use bubbles_client::{
    CellId, NodeId, RecordingSurface, Region, RenderSurface, Scene, SurfaceCall,
};
use bubbles_types::BubbleId;
use serde_json::json;
use tokio::sync::mpsc;

// =============================================================================
// Frames
// =============================================================================

/// A configuration frame for a `size x size` grid.
pub fn config_frame(size: u32) -> String {
    json!({
        "bubble": null,
        "info": { "seed": "1234", "grid_size": size, "total_bubbles": 0 }
    })
    .to_string()
}

/// A live bubble update.
pub fn bubble_frame(id: &str, row: u32, column: u32, rarity: &str, invisible: bool) -> String {
    json!({
        "info": { "seed": "1234", "total_bubbles": 1 },
        "bubble": {
            "id": id,
            "pos": { "row": row, "column": column },
            "rarity": rarity,
            "is_invisible": invisible,
            "is_finish": false
        }
    })
    .to_string()
}

/// A finished update as the server sends it.
pub fn finish_frame(id: &str) -> String {
    json!({
        "info": { "seed": "1234", "total_bubbles": 0 },
        "bubble": { "id": id, "is_finish": true }
    })
    .to_string()
}

/// Node id of a bubble.
pub fn node(id: &str) -> NodeId {
    NodeId::for_bubble(&BubbleId::from(id))
}

/// Whether a call mutates a node (as opposed to cells or text).
pub fn is_node_call(call: &SurfaceCall) -> bool {
    matches!(
        call,
        SurfaceCall::CreateNode { .. }
            | SurfaceCall::Attach { .. }
            | SurfaceCall::Detach(_)
            | SurfaceCall::Release(_)
            | SurfaceCall::AddFlag { .. }
            | SurfaceCall::RemoveFlag { .. }
    )
}

// =============================================================================
// Probe surface
// =============================================================================

/// What the session had drawn when it finished handling one event.
#[derive(Debug, Clone)]
pub struct ProbeFrame {
    /// Every call since the session started.
    pub calls: Vec<SurfaceCall>,
    /// The scene after the event.
    pub scene: Scene,
}

/// Surface that publishes a [`ProbeFrame`] every time the session presents,
/// so tests can watch a session running in another task.
pub struct Probe {
    inner: RecordingSurface<Scene>,
    frames: mpsc::UnboundedSender<ProbeFrame>,
}

impl Probe {
    /// Create a probe and the receiver of its frames.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProbeFrame>) {
        let (frames, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: RecordingSurface::new(Scene::new()),
                frames,
            },
            rx,
        )
    }

    /// The journal behind the probe.
    pub fn recording(&self) -> &RecordingSurface<Scene> {
        &self.inner
    }
}

impl RenderSurface for Probe {
    fn create_node(&mut self, node: &NodeId, classes: &str) {
        self.inner.create_node(node, classes);
    }
    fn attach(&mut self, node: &NodeId, cell: CellId) {
        self.inner.attach(node, cell);
    }
    fn detach(&mut self, node: &NodeId) {
        self.inner.detach(node);
    }
    fn release_node(&mut self, node: &NodeId) {
        self.inner.release_node(node);
    }
    fn add_flag(&mut self, node: &NodeId, flag: &str) {
        self.inner.add_flag(node, flag);
    }
    fn remove_flag(&mut self, node: &NodeId, flag: &str) {
        self.inner.remove_flag(node, flag);
    }
    fn clear_cells(&mut self) {
        self.inner.clear_cells();
    }
    fn set_dimensions(&mut self, rows: u32, columns: u32) {
        self.inner.set_dimensions(rows, columns);
    }
    fn create_cell(&mut self, cell: CellId) {
        self.inner.create_cell(cell);
    }
    fn write_text(&mut self, region: Region, text: &str) {
        self.inner.write_text(region, text);
    }
    fn reset(&mut self) {
        self.inner.reset();
    }
    fn present(&mut self) {
        let _ = self.frames.send(ProbeFrame {
            calls: self.inner.calls().to_vec(),
            scene: self.inner.inner().clone(),
        });
    }
}

/// Wait (up to five seconds) for the first frame matching `pred`.
pub async fn wait_for(
    frames: &mut mpsc::UnboundedReceiver<ProbeFrame>,
    pred: impl Fn(&ProbeFrame) -> bool,
) -> ProbeFrame {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let frame = frames.recv().await.unwrap();
            if pred(&frame) {
                return frame;
            }
        }
    })
    .await
    .unwrap()
}
