//! Terminal rendering of the grid.
//!
//! [`TerminalSurface`] keeps a [`Scene`] and redraws it as text whenever the
//! session presents a change. Redraws are throttled to one per frame
//! interval; a change held back by the throttle is drawn at the next
//! present after the interval has passed (the liveness poller guarantees
//! one every few seconds).

use std::io::Write;
use std::time::{Duration, Instant};

use bubbles_client::{CellId, NodeId, Region, RenderSurface, Scene};
use tracing::warn;

/// Clears the screen and homes the cursor.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// A [`RenderSurface`] that draws the scene to a text writer.
pub struct TerminalSurface<W: Write> {
    scene: Scene,
    out: W,
    frame_interval: Duration,
    last_drawn: Option<Instant>,
    dirty: bool,
    clear: bool,
}

impl<W: Write> TerminalSurface<W> {
    /// Draw to `out` at most once per `frame_interval`, clearing the
    /// screen before each redraw.
    pub fn new(out: W, frame_interval: Duration) -> Self {
        Self {
            scene: Scene::new(),
            out,
            frame_interval,
            last_drawn: None,
            dirty: false,
            clear: true,
        }
    }

    /// Append each redraw instead of clearing the screen first.
    #[must_use]
    pub const fn without_clearing(mut self) -> Self {
        self.clear = false;
        self
    }

    /// Whether there are changes not yet drawn.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Draw pending changes now, ignoring the throttle.
    pub fn flush(&mut self) {
        if self.is_dirty() {
            self.draw();
        }
    }

    #[cfg(test)]
    fn into_writer(self) -> W {
        self.out
    }

    fn draw(&mut self) {
        let mut text = String::new();
        if self.clear {
            text.push_str(CLEAR_SCREEN);
        }
        text.push_str(&self.scene.render_text());

        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "failed to draw grid");
        }
        self.dirty = false;
        self.last_drawn = Some(Instant::now());
    }

    fn throttled(&self) -> bool {
        self.last_drawn
            .is_some_and(|at| at.elapsed() < self.frame_interval)
    }
}

impl<W: Write> RenderSurface for TerminalSurface<W> {
    fn create_node(&mut self, node: &NodeId, classes: &str) {
        self.scene.create_node(node, classes);
        self.dirty = true;
    }

    fn attach(&mut self, node: &NodeId, cell: CellId) {
        self.scene.attach(node, cell);
        self.dirty = true;
    }

    fn detach(&mut self, node: &NodeId) {
        self.scene.detach(node);
        self.dirty = true;
    }

    fn release_node(&mut self, node: &NodeId) {
        self.scene.release_node(node);
        self.dirty = true;
    }

    fn add_flag(&mut self, node: &NodeId, flag: &str) {
        self.scene.add_flag(node, flag);
        self.dirty = true;
    }

    fn remove_flag(&mut self, node: &NodeId, flag: &str) {
        self.scene.remove_flag(node, flag);
        self.dirty = true;
    }

    fn clear_cells(&mut self) {
        self.scene.clear_cells();
        self.dirty = true;
    }

    fn set_dimensions(&mut self, rows: u32, columns: u32) {
        self.scene.set_dimensions(rows, columns);
        self.dirty = true;
    }

    fn create_cell(&mut self, cell: CellId) {
        self.scene.create_cell(cell);
        self.dirty = true;
    }

    fn write_text(&mut self, region: Region, text: &str) {
        if self.scene.text(region) != text {
            self.scene.write_text(region, text);
            self.dirty = true;
        }
    }

    fn reset(&mut self) {
        self.scene.reset();
        self.dirty = true;
    }

    fn present(&mut self) {
        if self.dirty && !self.throttled() {
            self.draw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(interval: Duration) -> TerminalSurface<Vec<u8>> {
        TerminalSurface::new(Vec::new(), interval).without_clearing()
    }

    fn output(surface: TerminalSurface<Vec<u8>>) -> String {
        String::from_utf8_lossy(&surface.into_writer()).into_owned()
    }

    #[test]
    fn present_draws_pending_changes() {
        let mut s = surface(Duration::ZERO);
        s.set_dimensions(1, 2);
        s.create_cell(CellId::new(0, 0));
        s.create_cell(CellId::new(0, 1));
        let node = NodeId("bubble_a".to_owned());
        s.create_node(&node, "bubble bubble-dark");
        s.attach(&node, CellId::new(0, 1));
        assert!(s.is_dirty());

        s.present();
        assert!(!s.is_dirty());
        assert!(output(s).starts_with(".D\n"));
    }

    #[test]
    fn present_without_changes_draws_nothing() {
        let mut s = surface(Duration::ZERO);
        s.present();
        assert!(output(s).is_empty());
    }

    #[test]
    fn unchanged_text_does_not_mark_dirty() {
        let mut s = surface(Duration::ZERO);
        s.write_text(Region::Error, "");
        assert!(!s.is_dirty());
        s.write_text(Region::Error, "stream: closed");
        assert!(s.is_dirty());
    }

    #[test]
    fn throttle_holds_back_second_redraw() {
        let mut s = surface(Duration::from_secs(3600));
        s.write_text(Region::Info, "seed: 1 | total bubbles: 0");
        s.present();
        s.write_text(Region::Info, "seed: 1 | total bubbles: 1");
        s.present();
        assert!(s.is_dirty());

        s.flush();
        assert!(!s.is_dirty());
        let text = output(s);
        assert_eq!(text.matches("info: ").count(), 2);
        assert!(text.ends_with("info: seed: 1 | total bubbles: 1\n"));
    }

    #[test]
    fn clearing_prefixes_escape_sequence() {
        let mut s = TerminalSurface::new(Vec::new(), Duration::ZERO);
        s.reset();
        s.present();
        assert!(output(s).starts_with(CLEAR_SCREEN));
    }
}
