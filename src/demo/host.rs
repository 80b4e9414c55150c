// src/demo/host.rs
//! Page capabilities the demo drives. Injected so the orchestrator holds no
//! global state and can be exercised without a browser.

use crate::item::TrendingItem;
use crate::terminal::OutputKind;

use super::DemoEnd;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollPos {
    pub x: f64,
    pub y: f64,
}

impl ScrollPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: ScrollPos, t: f64) -> ScrollPos {
        ScrollPos {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Cubic ease-in-out on `t` in 0..=1 (clamped).
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

pub trait PageHost: Send + Sync {
    /// Suppress (true) or restore (false) user-driven scrolling.
    fn set_scroll_locked(&self, locked: bool);
    fn scroll_position(&self) -> ScrollPos;
    fn scroll_to(&self, pos: ScrollPos);
    /// Scroll position that puts `element` at the viewport center, if it exists.
    fn centering_position(&self, element: &str) -> Option<ScrollPos>;
    fn focus(&self, element: &str);
}

/// Where an item shown by the demo came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Cached,
    Live,
    Assistant,
}

/// The fake terminal the demo types into.
pub trait DemoSurface: Send + Sync {
    fn set_input(&self, text: &str);
    fn submit(&self, command: &str);
    fn print(&self, line: &str, kind: OutputKind);
    fn show_item(&self, item: &TrendingItem, provenance: Provenance);
    fn finished(&self, end: DemoEnd);
}
