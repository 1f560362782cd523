//! Grid initializer: builds the addressable cell space.
//!
//! The grid is always square. A rebuild wipes the cells on the surface and
//! recreates them row by row, so the same size always yields the same cell
//! identifiers. The entity store is not touched here.

use std::num::NonZeroU32;

use tracing::debug;

use crate::surface::{CellId, RenderSurface};

/// The cell space the reconciler attaches nodes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grid {
    size: Option<NonZeroU32>,
}

impl Grid {
    /// A grid with no cells.
    pub const fn new() -> Self {
        Self { size: None }
    }

    /// Side length of the current grid, `None` before the first rebuild.
    pub const fn size(&self) -> Option<NonZeroU32> {
        self.size
    }

    /// Clear the surface's cells and create `size x size` new ones in
    /// row-major order.
    pub fn rebuild<S: RenderSurface>(&mut self, size: NonZeroU32, surface: &mut S) {
        surface.clear_cells();
        surface.set_dimensions(size.get(), size.get());
        for row in 0..size.get() {
            for column in 0..size.get() {
                surface.create_cell(CellId::new(row, column));
            }
        }
        self.size = Some(size);
        debug!(size = size.get(), "grid rebuilt");
    }

    /// Whether a cell exists in the current grid.
    pub fn contains(&self, cell: CellId) -> bool {
        self.size
            .is_some_and(|size| cell.row < size.get() && cell.column < size.get())
    }

    /// Every cell of the current grid in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + use<> {
        let size = self.size.map_or(0, NonZeroU32::get);
        (0..size).flat_map(move |row| (0..size).map(move |column| CellId::new(row, column)))
    }

    /// Forget the cell space. The surface is reset separately.
    pub const fn clear(&mut self) {
        self.size = None;
    }
}
