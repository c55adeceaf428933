//! Text views: content changes and IME editor actions.

use flowbind_core::{
    EventAdapter, LifecycleScope, ListenerSet, ListenerSlot, Widget, WidgetSet, WidgetSlot,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// IME action ids.
pub mod ime {
    /// No specific action.
    pub const ACTION_UNSPECIFIED: i32 = 0;
    /// Go to the target of the text.
    pub const ACTION_GO: i32 = 2;
    /// Run a search.
    pub const ACTION_SEARCH: i32 = 3;
    /// Send the text.
    pub const ACTION_SEND: i32 = 4;
    /// Move to the next field.
    pub const ACTION_NEXT: i32 = 5;
    /// Done editing.
    pub const ACTION_DONE: i32 = 6;
}

/// Raw text watcher callback arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    /// Full text after the change
    pub text: String,
    /// Offset of the changed region
    pub start: usize,
    /// Length of the replaced region
    pub before: usize,
    /// Length of the inserted region
    pub count: usize,
}

/// The text of a view changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChangeEvent {
    /// Full text after the change
    pub text: String,
    /// Offset of the changed region
    pub start: usize,
    /// Length of the replaced region
    pub before: usize,
    /// Length of the inserted region
    pub count: usize,
}

/// An IME action was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorActionEvent {
    /// One of the [`ime`] action ids
    pub action_id: i32,
}

/// Package text watcher arguments.
pub fn text_change_event(change: TextChange) -> TextChangeEvent {
    TextChangeEvent {
        text: change.text,
        start: change.start,
        before: change.before,
        count: change.count,
    }
}

/// Package an editor action.
pub fn editor_action_event(action_id: i32) -> EditorActionEvent {
    EditorActionEvent { action_id }
}

/// Editable text view.
#[derive(Debug)]
pub struct TextView {
    id: String,
    attachment: LifecycleScope,
    text: Mutex<String>,
    watchers: ListenerSet<TextChange>,
    on_editor_action: ListenerSlot<i32>,
}

impl TextView {
    /// Create an attached, empty text view.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            text: Mutex::new(String::new()),
            watchers: ListenerSet::new(),
            on_editor_action: ListenerSlot::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(text_view = %self.id, "Text view detached");
        self.attachment.cancel();
    }

    /// Current text.
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    /// Replace the whole text.
    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        let before = {
            let mut current = self.text.lock();
            let before = current.chars().count();
            *current = text.clone();
            before
        };
        let count = text.chars().count();
        self.notify(TextChange {
            text,
            start: 0,
            before,
            count,
        });
    }

    /// Append text at the end, as typing would.
    pub fn append(&self, suffix: &str) {
        let change = {
            let mut current = self.text.lock();
            let start = current.chars().count();
            current.push_str(suffix);
            TextChange {
                text: current.clone(),
                start,
                before: 0,
                count: suffix.chars().count(),
            }
        };
        self.notify(change);
    }

    fn notify(&self, change: TextChange) {
        if !self.attachment.is_cancelled() {
            self.watchers.fire(change);
        }
    }

    /// Perform an IME action. Returns whether a listener consumed it.
    pub fn on_editor_action(&self, action_id: i32) -> bool {
        !self.attachment.is_cancelled() && self.on_editor_action.fire(action_id)
    }

    /// Text watcher set.
    pub fn text_watchers(&self) -> &ListenerSet<TextChange> {
        &self.watchers
    }

    /// Editor action listener slot.
    pub fn editor_action_slot(&self) -> &ListenerSlot<i32> {
        &self.on_editor_action
    }
}

impl Widget for TextView {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Text content, starting with the current text.
pub fn text_changes(view: &Arc<TextView>) -> EventAdapter<WidgetSet<TextView, TextChange>, String> {
    let current = view.clone();
    EventAdapter::new(
        WidgetSet::new(view.clone(), "text_changes", TextView::text_watchers),
        |change: TextChange| change.text,
    )
    .with_initial_value(move || current.text())
}

/// Detailed text changes.
pub fn text_change_events(
    view: &Arc<TextView>,
) -> EventAdapter<WidgetSet<TextView, TextChange>, TextChangeEvent> {
    EventAdapter::new(
        WidgetSet::new(view.clone(), "text_change_events", TextView::text_watchers),
        text_change_event,
    )
}

/// Editor actions. Only actions matching `handled` are consumed and emitted.
pub fn editor_actions(
    view: &Arc<TextView>,
    handled: impl Fn(&EditorActionEvent) -> bool + Send + Sync + 'static,
) -> EventAdapter<WidgetSlot<TextView, i32>, EditorActionEvent> {
    EventAdapter::new(
        WidgetSlot::new(view.clone(), "editor_actions", TextView::editor_action_slot),
        editor_action_event,
    )
    .with_handled(handled)
}
