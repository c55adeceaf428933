//! Base view: clicks, long clicks, focus and scroll position.

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSlot, Widget, WidgetSlot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Raw scroll callback arguments: `(scroll_x, scroll_y, old_scroll_x, old_scroll_y)`.
pub type ScrollArgs = (i32, i32, i32, i32);

/// A view's scroll position changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewScrollChangeEvent {
    /// New horizontal scroll origin
    pub scroll_x: i32,
    /// New vertical scroll origin
    pub scroll_y: i32,
    /// Previous horizontal scroll origin
    pub old_scroll_x: i32,
    /// Previous vertical scroll origin
    pub old_scroll_y: i32,
}

/// Package scroll callback arguments.
pub fn scroll_change_event(args: ScrollArgs) -> ViewScrollChangeEvent {
    let (scroll_x, scroll_y, old_scroll_x, old_scroll_y) = args;
    ViewScrollChangeEvent {
        scroll_x,
        scroll_y,
        old_scroll_x,
        old_scroll_y,
    }
}

#[derive(Debug, Default)]
struct ViewState {
    focused: bool,
    scroll: (i32, i32),
}

/// A plain view.
#[derive(Debug)]
pub struct View {
    id: String,
    attachment: LifecycleScope,
    state: Mutex<ViewState>,
    on_click: ListenerSlot<()>,
    on_long_click: ListenerSlot<()>,
    on_focus_change: ListenerSlot<bool>,
    on_scroll_change: ListenerSlot<ScrollArgs>,
}

impl View {
    /// Create an attached view.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            state: Mutex::new(ViewState::default()),
            on_click: ListenerSlot::new(),
            on_long_click: ListenerSlot::new(),
            on_focus_change: ListenerSlot::new(),
            on_scroll_change: ListenerSlot::new(),
        })
    }

    /// View id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Detach from the window. Every binding on this view ends.
    pub fn detach(&self) {
        debug!(view = %self.id, "View detached");
        self.attachment.cancel();
    }

    /// Whether the view is still attached.
    pub fn is_attached(&self) -> bool {
        !self.attachment.is_cancelled()
    }

    /// Simulate a click. Returns whether a listener received it.
    pub fn perform_click(&self) -> bool {
        self.is_attached() && self.on_click.fire(())
    }

    /// Simulate a long click. Returns whether it was consumed.
    pub fn perform_long_click(&self) -> bool {
        self.is_attached() && self.on_long_click.fire(())
    }

    /// Current focus.
    pub fn is_focused(&self) -> bool {
        self.state.lock().focused
    }

    /// Change focus, notifying the listener on change.
    pub fn set_focused(&self, focused: bool) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.focused, focused) != focused
        };
        if changed && self.is_attached() {
            self.on_focus_change.fire(focused);
        }
    }

    /// Current scroll origin.
    pub fn scroll_position(&self) -> (i32, i32) {
        self.state.lock().scroll
    }

    /// Scroll to an absolute position.
    pub fn scroll_to(&self, x: i32, y: i32) {
        let (old_x, old_y) = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.scroll, (x, y))
        };
        if (old_x, old_y) != (x, y) && self.is_attached() {
            self.on_scroll_change.fire((x, y, old_x, old_y));
        }
    }

    /// Click listener slot.
    pub fn click_slot(&self) -> &ListenerSlot<()> {
        &self.on_click
    }

    /// Long-click listener slot.
    pub fn long_click_slot(&self) -> &ListenerSlot<()> {
        &self.on_long_click
    }

    /// Focus-change listener slot.
    pub fn focus_change_slot(&self) -> &ListenerSlot<bool> {
        &self.on_focus_change
    }

    /// Scroll-change listener slot.
    pub fn scroll_change_slot(&self) -> &ListenerSlot<ScrollArgs> {
        &self.on_scroll_change
    }
}

impl Widget for View {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Adapter over one of a view's listener slots.
pub type ViewAdapter<A, E> = EventAdapter<WidgetSlot<View, A>, E>;

/// Clicks on the view.
pub fn clicks(view: &Arc<View>) -> ViewAdapter<(), ()> {
    EventAdapter::new(
        WidgetSlot::new(view.clone(), "clicks", View::click_slot),
        |()| (),
    )
}

/// Long clicks. `handled` decides whether each long click is consumed;
/// unconsumed long clicks are not emitted.
pub fn long_clicks(
    view: &Arc<View>,
    handled: impl Fn() -> bool + Send + Sync + 'static,
) -> ViewAdapter<(), ()> {
    EventAdapter::new(
        WidgetSlot::new(view.clone(), "long_clicks", View::long_click_slot),
        |()| (),
    )
    .with_handled(move |_| handled())
}

/// Focus changes, starting with the current focus.
pub fn focus_changes(view: &Arc<View>) -> ViewAdapter<bool, bool> {
    let current = view.clone();
    EventAdapter::new(
        WidgetSlot::new(view.clone(), "focus_changes", View::focus_change_slot),
        |focused| focused,
    )
    .with_initial_value(move || current.is_focused())
}

/// Scroll position changes.
pub fn scroll_changes(view: &Arc<View>) -> ViewAdapter<ScrollArgs, ViewScrollChangeEvent> {
    EventAdapter::new(
        WidgetSlot::new(view.clone(), "scroll_changes", View::scroll_change_slot),
        scroll_change_event,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbind_core::{BufferPolicy, Error, TryRecvError};

    #[test]
    fn test_scroll_mapping_is_value_for_value() {
        assert_eq!(
            scroll_change_event((10, 20, 1, 2)),
            ViewScrollChangeEvent {
                scroll_x: 10,
                scroll_y: 20,
                old_scroll_x: 1,
                old_scroll_y: 2,
            }
        );
    }

    #[test]
    fn test_clicks() {
        let view = View::new("button");
        let scope = LifecycleScope::new("screen");
        let mut channel = clicks(&view)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        assert!(view.perform_click());
        assert!(view.perform_click());
        assert_eq!(channel.try_recv(), Ok(()));
        assert_eq!(channel.try_recv(), Ok(()));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));

        scope.cancel();
        assert!(!view.perform_click());
    }

    #[test]
    fn test_long_click_handled_flag() {
        let view = View::new("item");
        let scope = LifecycleScope::new("screen");
        let consume = Arc::new(Mutex::new(false));
        let flag = consume.clone();
        let mut channel = long_clicks(&view, move || *flag.lock())
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        assert!(!view.perform_long_click());
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));

        *consume.lock() = true;
        assert!(view.perform_long_click());
        assert_eq!(channel.try_recv(), Ok(()));
    }

    #[test]
    fn test_focus_changes_start_with_current() {
        let view = View::new("field");
        view.set_focused(true);
        let scope = LifecycleScope::new("screen");
        let mut channel = focus_changes(&view)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        view.set_focused(true);
        view.set_focused(false);
        assert_eq!(channel.try_recv(), Ok(true));
        assert_eq!(channel.try_recv(), Ok(false));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_scroll_changes() {
        let view = View::new("pane");
        let scope = LifecycleScope::new("screen");
        let mut channel = scroll_changes(&view)
            .channel(&scope, BufferPolicy::Conflated)
            .unwrap();

        view.scroll_to(0, 10);
        view.scroll_to(0, 30);
        assert_eq!(
            channel.try_recv(),
            Ok(ViewScrollChangeEvent {
                scroll_x: 0,
                scroll_y: 30,
                old_scroll_x: 0,
                old_scroll_y: 10,
            })
        );
    }

    #[test]
    fn test_detached_view_rejects_binding() {
        let view = View::new("gone");
        view.detach();
        assert!(!view.is_attached());
        assert!(matches!(
            clicks(&view).channel(&LifecycleScope::new("screen"), BufferPolicy::Conflated),
            Err(Error::WidgetUnavailable(name)) if name == "gone.clicks"
        ));
    }
}
