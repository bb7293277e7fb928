//! Render adapter contract.

use crate::shapes::Element;

/// Consumer of the board's element list.
///
/// `redraw` receives every element in board order after each board change,
/// local or remote. Implementations redraw the whole surface and must be
/// idempotent.
pub trait Renderer {
    fn redraw(&mut self, elements: &[&Element]);
}

/// Renderer that draws nothing and counts redraw requests.
#[derive(Debug, Default)]
pub struct NullRenderer {
    redraws: usize,
    last_len: usize,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of redraws requested so far.
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Element count of the most recent redraw.
    pub fn last_len(&self) -> usize {
        self.last_len
    }
}

impl Renderer for NullRenderer {
    fn redraw(&mut self, elements: &[&Element]) {
        self.redraws += 1;
        self.last_len = elements.len();
    }
}
