//! Drawer layouts: open/closed state per gravity.

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSet, Widget, WidgetSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Edge a drawer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    /// Leading edge.
    Start,
    /// Trailing edge.
    End,
}

/// Raw drawer listener callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawerCallback {
    /// The drawer finished opening.
    Opened(Gravity),
    /// The drawer finished closing.
    Closed(Gravity),
    /// The drawer moved; `offset` is in `0.0..=1.0`.
    Slide {
        /// Which drawer
        gravity: Gravity,
        /// Visible fraction
        offset: f32,
    },
}

/// Open state of the drawer with `gravity`, ignoring other drawers and
/// slide callbacks.
pub fn drawer_open_state(callback: DrawerCallback, gravity: Gravity) -> Option<bool> {
    match callback {
        DrawerCallback::Opened(g) if g == gravity => Some(true),
        DrawerCallback::Closed(g) if g == gravity => Some(false),
        _ => None,
    }
}

/// A layout with slide-in drawers.
#[derive(Debug)]
pub struct DrawerLayout {
    id: String,
    attachment: LifecycleScope,
    open: Mutex<BTreeSet<Gravity>>,
    drawer_listeners: ListenerSet<DrawerCallback>,
}

impl DrawerLayout {
    /// Create an attached layout with every drawer closed.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            open: Mutex::new(BTreeSet::new()),
            drawer_listeners: ListenerSet::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(drawer_layout = %self.id, "Drawer layout detached");
        self.attachment.cancel();
    }

    /// Whether the drawer with `gravity` is open.
    pub fn is_drawer_open(&self, gravity: Gravity) -> bool {
        self.open.lock().contains(&gravity)
    }

    /// Open a drawer: slide then opened. No-op if already open.
    pub fn open_drawer(&self, gravity: Gravity) {
        if !self.open.lock().insert(gravity) {
            return;
        }
        self.notify(DrawerCallback::Slide {
            gravity,
            offset: 1.0,
        });
        self.notify(DrawerCallback::Opened(gravity));
    }

    /// Close a drawer: slide then closed. No-op if already closed.
    pub fn close_drawer(&self, gravity: Gravity) {
        if !self.open.lock().remove(&gravity) {
            return;
        }
        self.notify(DrawerCallback::Slide {
            gravity,
            offset: 0.0,
        });
        self.notify(DrawerCallback::Closed(gravity));
    }

    fn notify(&self, callback: DrawerCallback) {
        if !self.attachment.is_cancelled() {
            self.drawer_listeners.fire(callback);
        }
    }

    /// Drawer listener set.
    pub fn drawer_listeners(&self) -> &ListenerSet<DrawerCallback> {
        &self.drawer_listeners
    }
}

impl Widget for DrawerLayout {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Open state of one drawer, starting with its current state.
pub fn drawer_state_changes(
    layout: &Arc<DrawerLayout>,
    gravity: Gravity,
) -> EventAdapter<WidgetSet<DrawerLayout, DrawerCallback>, bool> {
    let current = layout.clone();
    EventAdapter::filter_map(
        WidgetSet::new(
            layout.clone(),
            "drawer_state_changes",
            DrawerLayout::drawer_listeners,
        ),
        move |callback| drawer_open_state(callback, gravity),
    )
    .with_initial_value(move || current.is_drawer_open(gravity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbind_core::{BufferPolicy, TryRecvError};

    #[test]
    fn test_open_state_filters_gravity() {
        assert_eq!(
            drawer_open_state(DrawerCallback::Opened(Gravity::Start), Gravity::Start),
            Some(true)
        );
        assert_eq!(
            drawer_open_state(DrawerCallback::Opened(Gravity::End), Gravity::Start),
            None
        );
        assert_eq!(
            drawer_open_state(
                DrawerCallback::Slide {
                    gravity: Gravity::Start,
                    offset: 0.5
                },
                Gravity::Start
            ),
            None
        );
    }

    #[test]
    fn test_drawer_state_changes() {
        let layout = DrawerLayout::new("main");
        let scope = LifecycleScope::new("activity");
        let mut channel = drawer_state_changes(&layout, Gravity::Start)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        layout.open_drawer(Gravity::End);
        layout.open_drawer(Gravity::Start);
        layout.open_drawer(Gravity::Start);
        layout.close_drawer(Gravity::Start);

        assert_eq!(channel.try_recv(), Ok(false));
        assert_eq!(channel.try_recv(), Ok(true));
        assert_eq!(channel.try_recv(), Ok(false));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_initial_reflects_open_drawer() {
        let layout = DrawerLayout::new("main");
        layout.open_drawer(Gravity::End);
        let scope = LifecycleScope::new("activity");
        let mut channel = drawer_state_changes(&layout, Gravity::End)
            .channel(&scope, BufferPolicy::Conflated)
            .unwrap();

        assert_eq!(channel.try_recv(), Ok(true));
    }
}
