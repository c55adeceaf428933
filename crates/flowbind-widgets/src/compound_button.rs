//! Two-state buttons (checkbox, switch, toggle).

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSlot, Widget, WidgetSlot};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A checkable button.
#[derive(Debug)]
pub struct CompoundButton {
    id: String,
    attachment: LifecycleScope,
    checked: Mutex<bool>,
    on_checked_change: ListenerSlot<bool>,
}

impl CompoundButton {
    /// Create an attached, unchecked button.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            checked: Mutex::new(false),
            on_checked_change: ListenerSlot::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(button = %self.id, "Compound button detached");
        self.attachment.cancel();
    }

    /// Current state.
    pub fn is_checked(&self) -> bool {
        *self.checked.lock()
    }

    /// Set the state. The listener only hears actual changes.
    pub fn set_checked(&self, checked: bool) {
        let previous = std::mem::replace(&mut *self.checked.lock(), checked);
        if previous != checked && !self.attachment.is_cancelled() {
            self.on_checked_change.fire(checked);
        }
    }

    /// Flip the state.
    pub fn toggle(&self) {
        let next = !self.is_checked();
        self.set_checked(next);
    }

    /// Checked-change listener slot.
    pub fn checked_change_slot(&self) -> &ListenerSlot<bool> {
        &self.on_checked_change
    }
}

impl Widget for CompoundButton {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Checked state changes, starting with the current state.
pub fn checked_changes(
    button: &Arc<CompoundButton>,
) -> EventAdapter<WidgetSlot<CompoundButton, bool>, bool> {
    let current = button.clone();
    EventAdapter::new(
        WidgetSlot::new(
            button.clone(),
            "checked_changes",
            CompoundButton::checked_change_slot,
        ),
        |checked| checked,
    )
    .with_initial_value(move || current.is_checked())
}
