//! Set of card ids marked for bulk actions.
//!
//! Ids are kept even when the card they name has since disappeared from the
//! backing list. The list state filters them out before a bulk delete.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectGesture {
    /// Plain click / Space: flip membership of one id.
    Single,
    /// Shift-click: select the run between the last toggled id and this one.
    Range,
}

#[derive(Debug, Default, Clone)]
pub struct SelectionSet {
    items: BTreeSet<String>,
    anchor: Option<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle `id`. For a range gesture, `order` is the list of ids as
    /// currently displayed; every id between the anchor and `id` becomes
    /// selected. When the anchor is not displayed the gesture degrades to a
    /// single toggle.
    pub fn toggle(&mut self, id: &str, gesture: SelectGesture, order: &[&str]) {
        if gesture == SelectGesture::Range {
            let span = self.anchor.as_deref().and_then(|anchor| {
                let from = order.iter().position(|x| *x == anchor)?;
                let to = order.iter().position(|x| *x == id)?;
                Some((from.min(to), from.max(to)))
            });
            if let Some((lo, hi)) = span {
                for x in &order[lo..=hi] {
                    self.items.insert((*x).to_string());
                }
                self.anchor = Some(id.to_string());
                return;
            }
        }

        if !self.items.remove(id) {
            self.items.insert(id.to_string());
        }
        self.anchor = Some(id.to_string());
    }

    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = ids.into_iter().map(Into::into).collect();
        self.anchor = None;
    }

    pub fn select_none(&mut self) {
        self.items.clear();
        self.anchor = None;
    }

    pub fn has(&self, id: &str) -> bool {
        self.items.contains(id)
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().cloned().collect()
    }
}
