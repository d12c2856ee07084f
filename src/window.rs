/// Number of leading backing-list rows currently revealed.
///
/// The window always indexes the unfiltered backing list. Filtering narrows
/// within the revealed prefix and never reveals more rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalWindow {
    revealed: usize,
    backing_len: usize,
}

impl IncrementalWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// First load: reveal `initial` rows, or the whole list if shorter.
    pub fn initialize(&mut self, backing_len: usize, initial: usize) {
        self.backing_len = backing_len;
        self.revealed = initial.min(backing_len);
    }

    /// Reveal up to `k` more rows. Returns whether anything changed.
    pub fn grow_by(&mut self, k: usize) -> bool {
        let next = self.revealed.saturating_add(k).min(self.backing_len);
        let changed = next != self.revealed;
        self.revealed = next;
        changed
    }

    /// Replace the backing length and reveal `n` rows, clamped.
    pub fn reset_to(&mut self, n: usize, backing_len: usize) {
        self.backing_len = backing_len;
        self.revealed = n.min(backing_len);
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn backing_len(&self) -> usize {
        self.backing_len
    }

    pub fn is_exhausted(&self) -> bool {
        self.revealed >= self.backing_len
    }
}

/// Scroll-proximity trigger: true once the scrolled offset comes within
/// `threshold` of the bottom of the rendered content.
pub fn near_bottom(scroll_top: f64, content_height: f64, threshold: f64) -> bool {
    scroll_top > content_height - threshold
}
