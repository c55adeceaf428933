//! Recycler views: scroll deltas and scroll state.

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSet, Widget, WidgetSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Scroll state of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollState {
    /// Not scrolling.
    #[default]
    Idle,
    /// Dragged by the user.
    Dragging,
    /// Animating to a final position.
    Settling,
}

/// Raw scroll listener callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCallback {
    /// `onScrolled(dx, dy)`
    Scrolled {
        /// Horizontal delta
        dx: i32,
        /// Vertical delta
        dy: i32,
    },
    /// `onScrollStateChanged(state)`
    StateChanged(ScrollState),
}

/// The list scrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecyclerViewScrollEvent {
    /// Horizontal delta
    pub dx: i32,
    /// Vertical delta
    pub dy: i32,
}

/// Keep scroll deltas.
pub fn scroll_event(callback: ScrollCallback) -> Option<RecyclerViewScrollEvent> {
    match callback {
        ScrollCallback::Scrolled { dx, dy } => Some(RecyclerViewScrollEvent { dx, dy }),
        ScrollCallback::StateChanged(_) => None,
    }
}

/// Keep state changes.
pub fn scroll_state(callback: ScrollCallback) -> Option<ScrollState> {
    match callback {
        ScrollCallback::StateChanged(state) => Some(state),
        ScrollCallback::Scrolled { .. } => None,
    }
}

/// A scrolling list.
#[derive(Debug)]
pub struct RecyclerView {
    id: String,
    attachment: LifecycleScope,
    state: Mutex<ScrollState>,
    scroll_listeners: ListenerSet<ScrollCallback>,
}

impl RecyclerView {
    /// Create an attached, idle list.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            state: Mutex::new(ScrollState::Idle),
            scroll_listeners: ListenerSet::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(recycler_view = %self.id, "Recycler view detached");
        self.attachment.cancel();
    }

    /// Current scroll state.
    pub fn scroll_state(&self) -> ScrollState {
        *self.state.lock()
    }

    /// Change the scroll state, notifying on change.
    pub fn set_scroll_state(&self, state: ScrollState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            self.notify(ScrollCallback::StateChanged(state));
        }
    }

    /// Scroll by a delta.
    pub fn scroll_by(&self, dx: i32, dy: i32) {
        self.notify(ScrollCallback::Scrolled { dx, dy });
    }

    /// Simulate a fling: drag, scroll through `deltas`, settle, stop.
    pub fn fling(&self, deltas: &[(i32, i32)]) {
        self.set_scroll_state(ScrollState::Dragging);
        for &(dx, dy) in deltas {
            self.scroll_by(dx, dy);
        }
        self.set_scroll_state(ScrollState::Settling);
        self.set_scroll_state(ScrollState::Idle);
    }

    fn notify(&self, callback: ScrollCallback) {
        if !self.attachment.is_cancelled() {
            self.scroll_listeners.fire(callback);
        }
    }

    /// Scroll listener set.
    pub fn scroll_listeners(&self) -> &ListenerSet<ScrollCallback> {
        &self.scroll_listeners
    }
}

impl Widget for RecyclerView {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Adapter over the scroll listener set.
pub type RecyclerViewAdapter<E> = EventAdapter<WidgetSet<RecyclerView, ScrollCallback>, E>;

/// Scroll deltas.
pub fn scroll_events(view: &Arc<RecyclerView>) -> RecyclerViewAdapter<RecyclerViewScrollEvent> {
    EventAdapter::filter_map(
        WidgetSet::new(view.clone(), "scroll_events", RecyclerView::scroll_listeners),
        scroll_event,
    )
}

/// Scroll state transitions.
pub fn scroll_state_changes(view: &Arc<RecyclerView>) -> RecyclerViewAdapter<ScrollState> {
    EventAdapter::filter_map(
        WidgetSet::new(
            view.clone(),
            "scroll_state_changes",
            RecyclerView::scroll_listeners,
        ),
        scroll_state,
    )
}
