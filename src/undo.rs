//! Process-wide "which modal is open" marker consulted by the undo shortcut.
//!
//! Screens whose edits are not part of the undo history hold an
//! [`UndoScope`] while open. The scope clears the marker when dropped, so an
//! early return or a panic still re-enables undo.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::debug;

pub const MANAGE_CREDIT_CARDS: &str = "manage-credit-cards";

#[derive(Debug, Clone, Default)]
pub struct UndoState {
    active_modal: Arc<Mutex<Option<String>>>,
}

impl UndoState {
    /// Handle to the state shared by the whole process.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<UndoState> = OnceLock::new();
        GLOBAL.get_or_init(UndoState::default).clone()
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a usable marker.
        self.active_modal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_active_modal(&self, name: Option<&str>) {
        *self.slot() = name.map(str::to_string);
    }

    pub fn active_modal(&self) -> Option<String> {
        self.slot().clone()
    }

    pub fn undo_allowed(&self) -> bool {
        self.slot().is_none()
    }
}

/// Holds the active-modal marker for as long as it lives.
#[derive(Debug)]
pub struct UndoScope {
    state: UndoState,
}

impl UndoScope {
    pub fn enter(state: UndoState, marker: &str) -> Self {
        state.set_active_modal(Some(marker));
        debug!(marker, "undo suppressed");
        Self { state }
    }

    pub fn set(&self, marker: &str) {
        self.state.set_active_modal(Some(marker));
    }

    pub fn clear(&self) {
        self.state.set_active_modal(None);
    }
}

impl Drop for UndoScope {
    fn drop(&mut self) {
        self.clear();
        debug!("undo restored");
    }
}
