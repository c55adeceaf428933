//! Pull-to-refresh layouts.

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSlot, Widget, WidgetSlot};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A layout that refreshes when pulled down.
#[derive(Debug)]
pub struct SwipeRefreshLayout {
    id: String,
    attachment: LifecycleScope,
    refreshing: Mutex<bool>,
    on_refresh: ListenerSlot<()>,
}

impl SwipeRefreshLayout {
    /// Create an attached, idle layout.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            refreshing: Mutex::new(false),
            on_refresh: ListenerSlot::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(swipe_refresh = %self.id, "Swipe refresh layout detached");
        self.attachment.cancel();
    }

    /// Whether the refresh indicator is showing.
    pub fn is_refreshing(&self) -> bool {
        *self.refreshing.lock()
    }

    /// Show or hide the indicator. Never notifies the listener.
    pub fn set_refreshing(&self, refreshing: bool) {
        *self.refreshing.lock() = refreshing;
    }

    /// Simulate the pull gesture. Ignored while a refresh is running.
    pub fn pull(&self) {
        {
            let mut refreshing = self.refreshing.lock();
            if *refreshing || self.attachment.is_cancelled() {
                return;
            }
            *refreshing = true;
        }
        self.on_refresh.fire(());
    }

    /// Refresh listener slot.
    pub fn refresh_slot(&self) -> &ListenerSlot<()> {
        &self.on_refresh
    }
}

impl Widget for SwipeRefreshLayout {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Refresh gestures.
pub fn refreshes(
    layout: &Arc<SwipeRefreshLayout>,
) -> EventAdapter<WidgetSlot<SwipeRefreshLayout, ()>, ()> {
    EventAdapter::new(
        WidgetSlot::new(layout.clone(), "refreshes", SwipeRefreshLayout::refresh_slot),
        |()| (),
    )
}
