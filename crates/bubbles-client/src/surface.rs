//! Render surface abstraction and the in-memory [`Scene`].
//!
//! The client never draws anything itself. Every visual mutation goes
//! through the [`RenderSurface`] trait: nodes addressed by a stable
//! [`NodeId`], cells addressed by a [`CellId`], presentation flags, layout
//! dimensions, and three text regions.
//!
//! Two implementations ship with the crate:
//!
//! - [`Scene`] keeps a complete in-memory model of the grid and can print
//!   itself as text.
//! - [`RecordingSurface`] wraps another surface and journals every call,
//!   which is what the reconciliation tests assert against.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use bubbles_types::{BubbleId, Position};

/// Presentation flag toggled on invisible bubbles.
pub const INVISIBLE_FLAG: &str = "invisible";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Address of one grid cell. Displays as `cell_<row>_<column>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId {
    /// Zero-based row index.
    pub row: u32,
    /// Zero-based column index.
    pub column: u32,
}

impl CellId {
    /// Create a cell address.
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl From<Position> for CellId {
    fn from(pos: Position) -> Self {
        Self::new(pos.row, pos.column)
    }
}

impl core::fmt::Display for CellId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cell_{}_{}", self.row, self.column)
    }
}

/// Address of a visual node. Bubble nodes are named `bubble_<id>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    /// The node that renders the given bubble.
    pub fn for_bubble(id: &BubbleId) -> Self {
        Self(format!("bubble_{id}"))
    }

    /// Borrow the node name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named text regions of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    /// Server seed and bubble count readout.
    Info,
    /// Last server activity readout.
    Activity,
    /// Shared one-line error indicator.
    Error,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Capability to create, place, and style visual nodes on a grid.
///
/// Implementations must tolerate calls for unknown nodes or cells by
/// ignoring them; the client logs its own inconsistencies.
pub trait RenderSurface {
    /// Create a detached node carrying the given whitespace-separated
    /// classes. An existing node with the same id is replaced.
    fn create_node(&mut self, node: &NodeId, classes: &str);

    /// Append a node under a cell, removing it from its previous parent.
    fn attach(&mut self, node: &NodeId, cell: CellId);

    /// Remove a node from its current parent cell.
    fn detach(&mut self, node: &NodeId);

    /// Forget a node that will never be referenced again.
    fn release_node(&mut self, node: &NodeId);

    /// Add a presentation flag to a node.
    fn add_flag(&mut self, node: &NodeId, flag: &str);

    /// Remove a presentation flag from a node.
    fn remove_flag(&mut self, node: &NodeId, flag: &str);

    /// Remove every cell. Nodes attached to them become detached.
    fn clear_cells(&mut self);

    /// Set the row and column counts of the grid container.
    fn set_dimensions(&mut self, rows: u32, columns: u32);

    /// Append one cell to the grid container.
    fn create_cell(&mut self, cell: CellId);

    /// Replace the text of a region.
    fn write_text(&mut self, region: Region, text: &str);

    /// Empty the grid container: no cells, no nodes, no dimensions.
    /// Text regions are left alone.
    fn reset(&mut self);

    /// Flush pending mutations to the output device, if there is one.
    fn present(&mut self) {}
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// A node held by the [`Scene`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneNode {
    /// Presentation classes and flags.
    pub classes: BTreeSet<String>,
    /// Cell the node is attached to, if any.
    pub parent: Option<CellId>,
}

impl SceneNode {
    /// Whether the node carries the given class or flag.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

/// In-memory render surface.
///
/// Cells keep their children in attachment order. Text regions start out
/// empty.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    rows: u32,
    columns: u32,
    cells: BTreeMap<CellId, Vec<NodeId>>,
    nodes: HashMap<NodeId, SceneNode>,
    regions: BTreeMap<Region, String>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout dimensions as `(rows, columns)`.
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.columns)
    }

    /// All cell addresses in row-major order.
    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells.keys().copied().collect()
    }

    /// Whether a cell exists.
    pub fn has_cell(&self, cell: CellId) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Children of a cell in attachment order. Empty for unknown cells.
    pub fn children(&self, cell: CellId) -> &[NodeId] {
        self.cells.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Look up a node.
    pub fn node(&self, node: &NodeId) -> Option<&SceneNode> {
        self.nodes.get(node)
    }

    /// Number of nodes the scene still holds, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Current text of a region (empty if never written).
    pub fn text(&self, region: Region) -> &str {
        self.regions.get(&region).map_or("", String::as_str)
    }

    /// Whether the grid holds no cells and no nodes.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.nodes.is_empty()
    }

    /// Render the grid and the text regions as plain text.
    ///
    /// Each cell prints one glyph for its first visible bubble: `o` common,
    /// `L` light, `D` dark, `?` other. A cell holding only invisible
    /// bubbles prints `,` and an empty cell prints `.`.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for row in 0..self.rows {
            for column in 0..self.columns {
                out.push(self.glyph(CellId::new(row, column)));
            }
            out.push('\n');
        }
        for (label, region) in [
            ("info", Region::Info),
            ("activity", Region::Activity),
            ("error", Region::Error),
        ] {
            let text = self.text(region);
            if !text.is_empty() {
                let _ = writeln!(out, "{label}: {text}");
            }
        }
        out
    }

    fn glyph(&self, cell: CellId) -> char {
        let children = self.children(cell);
        if children.is_empty() {
            return '.';
        }
        children
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|node| !node.has_class(INVISIBLE_FLAG))
            .map_or(',', |node| {
                if node.has_class("bubble-common") {
                    'o'
                } else if node.has_class("bubble-light") {
                    'L'
                } else if node.has_class("bubble-dark") {
                    'D'
                } else {
                    '?'
                }
            })
    }

    fn unlink(&mut self, node: &NodeId) {
        let parent = self.nodes.get_mut(node).and_then(|n| n.parent.take());
        if let Some(children) = parent.and_then(|cell| self.cells.get_mut(&cell)) {
            children.retain(|child| child != node);
        }
    }
}

impl RenderSurface for Scene {
    fn create_node(&mut self, node: &NodeId, classes: &str) {
        self.unlink(node);
        let classes = classes.split_whitespace().map(ToOwned::to_owned).collect();
        self.nodes.insert(node.clone(), SceneNode { classes, parent: None });
    }

    fn attach(&mut self, node: &NodeId, cell: CellId) {
        if !self.nodes.contains_key(node) {
            return;
        }
        let Some(children) = self.cells.get_mut(&cell) else {
            return;
        };
        children.push(node.clone());
        let previous = self
            .nodes
            .get_mut(node)
            .and_then(|n| n.parent.replace(cell));
        if let Some(old) = previous.and_then(|prev| self.cells.get_mut(&prev)) {
            // A node is only ever listed once, so re-attaching to the same
            // cell keeps the freshly pushed entry at the end.
            if let Some(index) = old.iter().position(|child| child == node) {
                old.remove(index);
            }
        }
    }

    fn detach(&mut self, node: &NodeId) {
        self.unlink(node);
    }

    fn release_node(&mut self, node: &NodeId) {
        self.unlink(node);
        self.nodes.remove(node);
    }

    fn add_flag(&mut self, node: &NodeId, flag: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.classes.insert(flag.to_owned());
        }
    }

    fn remove_flag(&mut self, node: &NodeId, flag: &str) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.classes.remove(flag);
        }
    }

    fn clear_cells(&mut self) {
        self.cells.clear();
        for node in self.nodes.values_mut() {
            node.parent = None;
        }
    }

    fn set_dimensions(&mut self, rows: u32, columns: u32) {
        self.rows = rows;
        self.columns = columns;
    }

    fn create_cell(&mut self, cell: CellId) {
        self.cells.entry(cell).or_default();
    }

    fn write_text(&mut self, region: Region, text: &str) {
        self.regions.insert(region, text.to_owned());
    }

    fn reset(&mut self) {
        self.rows = 0;
        self.columns = 0;
        self.cells.clear();
        self.nodes.clear();
    }
}

// ---------------------------------------------------------------------------
// Recording decorator
// ---------------------------------------------------------------------------

/// One journaled [`RenderSurface`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    /// [`RenderSurface::create_node`]
    CreateNode {
        /// Node created.
        node: NodeId,
        /// Classes given.
        classes: String,
    },
    /// [`RenderSurface::attach`]
    Attach {
        /// Node attached.
        node: NodeId,
        /// Target cell.
        cell: CellId,
    },
    /// [`RenderSurface::detach`]
    Detach(NodeId),
    /// [`RenderSurface::release_node`]
    Release(NodeId),
    /// [`RenderSurface::add_flag`]
    AddFlag {
        /// Node flagged.
        node: NodeId,
        /// Flag added.
        flag: String,
    },
    /// [`RenderSurface::remove_flag`]
    RemoveFlag {
        /// Node unflagged.
        node: NodeId,
        /// Flag removed.
        flag: String,
    },
    /// [`RenderSurface::clear_cells`]
    ClearCells,
    /// [`RenderSurface::set_dimensions`]
    SetDimensions {
        /// Row count.
        rows: u32,
        /// Column count.
        columns: u32,
    },
    /// [`RenderSurface::create_cell`]
    CreateCell(CellId),
    /// [`RenderSurface::write_text`]
    WriteText {
        /// Region written.
        region: Region,
        /// New text.
        text: String,
    },
    /// [`RenderSurface::reset`]
    Reset,
}

/// Surface decorator that journals every call before forwarding it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface<S> {
    inner: S,
    calls: Vec<SurfaceCall>,
}

impl<S: RenderSurface> RecordingSurface<S> {
    /// Wrap a surface.
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Vec::new(),
        }
    }

    /// Calls recorded so far, oldest first.
    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    /// Drain the journal.
    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of recorded calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    /// The wrapped surface.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: RenderSurface> RenderSurface for RecordingSurface<S> {
    fn create_node(&mut self, node: &NodeId, classes: &str) {
        self.calls.push(SurfaceCall::CreateNode {
            node: node.clone(),
            classes: classes.to_owned(),
        });
        self.inner.create_node(node, classes);
    }

    fn attach(&mut self, node: &NodeId, cell: CellId) {
        self.calls.push(SurfaceCall::Attach {
            node: node.clone(),
            cell,
        });
        self.inner.attach(node, cell);
    }

    fn detach(&mut self, node: &NodeId) {
        self.calls.push(SurfaceCall::Detach(node.clone()));
        self.inner.detach(node);
    }

    fn release_node(&mut self, node: &NodeId) {
        self.calls.push(SurfaceCall::Release(node.clone()));
        self.inner.release_node(node);
    }

    fn add_flag(&mut self, node: &NodeId, flag: &str) {
        self.calls.push(SurfaceCall::AddFlag {
            node: node.clone(),
            flag: flag.to_owned(),
        });
        self.inner.add_flag(node, flag);
    }

    fn remove_flag(&mut self, node: &NodeId, flag: &str) {
        self.calls.push(SurfaceCall::RemoveFlag {
            node: node.clone(),
            flag: flag.to_owned(),
        });
        self.inner.remove_flag(node, flag);
    }

    fn clear_cells(&mut self) {
        self.calls.push(SurfaceCall::ClearCells);
        self.inner.clear_cells();
    }

    fn set_dimensions(&mut self, rows: u32, columns: u32) {
        self.calls.push(SurfaceCall::SetDimensions { rows, columns });
        self.inner.set_dimensions(rows, columns);
    }

    fn create_cell(&mut self, cell: CellId) {
        self.calls.push(SurfaceCall::CreateCell(cell));
        self.inner.create_cell(cell);
    }

    fn write_text(&mut self, region: Region, text: &str) {
        self.calls.push(SurfaceCall::WriteText {
            region,
            text: text.to_owned(),
        });
        self.inner.write_text(region, text);
    }

    fn reset(&mut self) {
        self.calls.push(SurfaceCall::Reset);
        self.inner.reset();
    }

    fn present(&mut self) {
        self.inner.present();
    }
}
