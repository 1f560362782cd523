//! Diff-based reconciliation of bubble updates.
//!
//! Each update is compared against the stored record and only the
//! differences reach the render surface:
//!
//! - unknown id, finished: nothing happens
//! - unknown id, live: a node is created, placed, and flagged if invisible
//! - known id, finished: the node is detached and the record dropped
//! - known id, live: the node moves only if the position changed, and the
//!   `invisible` flag toggles only if visibility changed
//!
//! A position outside the current grid leaves the node detached until a
//! later update (or a grid rebuild) brings it back into range.

use bubbles_types::{BubbleId, BubbleState, EntityUpdate};
use tracing::{debug, warn};

use crate::grid::Grid;
use crate::store::{EntityRecord, EntityStore};
use crate::surface::{CellId, INVISIBLE_FLAG, NodeId, RenderSurface};

/// What [`Reconciler::apply`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Finished update for an unknown id. Nothing changed.
    Ignored,
    /// A new record and node were created.
    Created,
    /// An existing record was replaced.
    Updated {
        /// The node was re-parented.
        moved: bool,
        /// The `invisible` flag was toggled.
        visibility_changed: bool,
    },
    /// The record was removed and its node detached.
    Removed,
}

/// Borrowed view over the store, grid, and surface for one reconciliation
/// step.
pub struct Reconciler<'a, S> {
    store: &'a mut EntityStore,
    grid: &'a Grid,
    surface: &'a mut S,
}

impl<'a, S: RenderSurface> Reconciler<'a, S> {
    /// Borrow the state one update needs.
    pub const fn new(store: &'a mut EntityStore, grid: &'a Grid, surface: &'a mut S) -> Self {
        Self {
            store,
            grid,
            surface,
        }
    }

    /// Apply one update, issuing only the surface calls it requires.
    pub fn apply(&mut self, update: EntityUpdate) -> ReconcileOutcome {
        match update {
            EntityUpdate::Finish(id) => self.finish(&id),
            EntityUpdate::Upsert(state) => self.upsert(state),
        }
    }

    fn finish(&mut self, id: &BubbleId) -> ReconcileOutcome {
        let Some(record) = self.store.remove(id) else {
            debug!(bubble_id = %id, "finish for unknown bubble ignored");
            return ReconcileOutcome::Ignored;
        };
        if record.attachment.is_some() {
            self.surface.detach(&record.node);
        }
        self.surface.release_node(&record.node);
        debug!(bubble_id = %id, "bubble removed");
        ReconcileOutcome::Removed
    }

    fn upsert(&mut self, state: BubbleState) -> ReconcileOutcome {
        let (mut record, moved, visibility_changed, created) = match self.store.remove(&state.id)
        {
            Some(mut existing) => {
                let moved = existing.state.position != state.position;
                let visibility_changed = existing.state.is_invisible != state.is_invisible;
                existing.state = state;
                (existing, moved, visibility_changed, false)
            }
            None => {
                let node = NodeId::for_bubble(&state.id);
                self.surface
                    .create_node(&node, &state.rarity.presentation_class());
                let visibility_changed = state.is_invisible;
                let record = EntityRecord {
                    state,
                    node,
                    attachment: None,
                };
                (record, true, visibility_changed, true)
            }
        };

        if moved {
            self.place(&mut record);
        }
        if visibility_changed {
            if record.state.is_invisible {
                self.surface.add_flag(&record.node, INVISIBLE_FLAG);
            } else {
                self.surface.remove_flag(&record.node, INVISIBLE_FLAG);
            }
        }
        self.store.insert(record);

        if created {
            ReconcileOutcome::Created
        } else {
            ReconcileOutcome::Updated {
                moved,
                visibility_changed,
            }
        }
    }

    /// Attach a record's node under the cell of its position, or detach it
    /// when that cell is not part of the grid.
    fn place(&mut self, record: &mut EntityRecord) {
        let cell = CellId::from(record.state.position);
        if self.grid.contains(cell) {
            self.surface.attach(&record.node, cell);
            record.attachment = Some(cell);
        } else {
            if record.attachment.take().is_some() {
                self.surface.detach(&record.node);
            }
            warn!(
                bubble_id = %record.state.id,
                row = cell.row,
                column = cell.column,
                "bubble position outside grid, node left detached"
            );
        }
    }

    /// Re-parent every stored node after a grid rebuild.
    ///
    /// Records whose position fell outside the new grid are dropped along
    /// with their nodes. Returns how many were dropped.
    pub fn reattach_all(&mut self) -> usize {
        let grid = self.grid;
        let dropped = self
            .store
            .drain_where(|record| !grid.contains(CellId::from(record.state.position)));
        for record in &dropped {
            if record.attachment.is_some() {
                self.surface.detach(&record.node);
            }
            self.surface.release_node(&record.node);
            debug!(bubble_id = %record.state.id, "bubble dropped by grid rebuild");
        }
        for record in self.store.iter_mut() {
            let cell = CellId::from(record.state.position);
            self.surface.attach(&record.node, cell);
            record.attachment = Some(cell);
        }
        dropped.len()
    }
}
