//! Seek bars: progress changes and tracking touches.

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSlot, Widget, WidgetSlot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Callback of a seek bar change listener. Also the domain event: the
/// callback arguments are emitted as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeekBarChangeEvent {
    /// Progress moved.
    ProgressChanged {
        /// New progress
        progress: i32,
        /// Whether the user moved it
        from_user: bool,
    },
    /// The user touched the thumb.
    StartTracking,
    /// The user released the thumb.
    StopTracking,
}

/// Keep only progress values, optionally only those made by the user.
pub fn progress_of(event: SeekBarChangeEvent, user_only: bool) -> Option<i32> {
    match event {
        SeekBarChangeEvent::ProgressChanged {
            progress,
            from_user,
        } if from_user || !user_only => Some(progress),
        _ => None,
    }
}

/// A seek bar over `0..=max`.
#[derive(Debug)]
pub struct SeekBar {
    id: String,
    attachment: LifecycleScope,
    max: i32,
    progress: Mutex<i32>,
    on_change: ListenerSlot<SeekBarChangeEvent>,
}

impl SeekBar {
    /// Create an attached seek bar at progress 0.
    pub fn new(id: impl Into<String>, max: i32) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            max: max.max(0),
            progress: Mutex::new(0),
            on_change: ListenerSlot::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(seek_bar = %self.id, "Seek bar detached");
        self.attachment.cancel();
    }

    /// Upper bound of the progress.
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Current progress.
    pub fn progress(&self) -> i32 {
        *self.progress.lock()
    }

    /// Set progress programmatically. Clamped to `0..=max`.
    pub fn set_progress(&self, progress: i32) {
        self.update(progress, false);
    }

    /// Simulate a user drag ending at `progress`.
    pub fn drag_to(&self, progress: i32) {
        self.notify(SeekBarChangeEvent::StartTracking);
        self.update(progress, true);
        self.notify(SeekBarChangeEvent::StopTracking);
    }

    fn update(&self, progress: i32, from_user: bool) {
        let progress = progress.clamp(0, self.max);
        let previous = std::mem::replace(&mut *self.progress.lock(), progress);
        if previous != progress {
            self.notify(SeekBarChangeEvent::ProgressChanged {
                progress,
                from_user,
            });
        }
    }

    fn notify(&self, event: SeekBarChangeEvent) {
        if !self.attachment.is_cancelled() {
            self.on_change.fire(event);
        }
    }

    /// Change listener slot.
    pub fn change_slot(&self) -> &ListenerSlot<SeekBarChangeEvent> {
        &self.on_change
    }
}

impl Widget for SeekBar {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Adapter over the seek bar change slot.
pub type SeekBarAdapter<E> = EventAdapter<WidgetSlot<SeekBar, SeekBarChangeEvent>, E>;

/// Every change callback.
pub fn change_events(bar: &Arc<SeekBar>) -> SeekBarAdapter<SeekBarChangeEvent> {
    EventAdapter::new(
        WidgetSlot::new(bar.clone(), "change_events", SeekBar::change_slot),
        |event| event,
    )
}

/// Progress values from any source, starting with the current progress.
pub fn progress_changes(bar: &Arc<SeekBar>) -> SeekBarAdapter<i32> {
    let current = bar.clone();
    EventAdapter::filter_map(
        WidgetSlot::new(bar.clone(), "progress_changes", SeekBar::change_slot),
        |event| progress_of(event, false),
    )
    .with_initial_value(move || current.progress())
}

/// Progress values moved by the user only.
pub fn user_progress_changes(bar: &Arc<SeekBar>) -> SeekBarAdapter<i32> {
    EventAdapter::filter_map(
        WidgetSlot::new(bar.clone(), "user_progress_changes", SeekBar::change_slot),
        |event| progress_of(event, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbind_core::{BufferPolicy, TryRecvError};

    #[test]
    fn test_progress_of() {
        let by_code = SeekBarChangeEvent::ProgressChanged {
            progress: 4,
            from_user: false,
        };
        assert_eq!(progress_of(by_code, false), Some(4));
        assert_eq!(progress_of(by_code, true), None);
        assert_eq!(progress_of(SeekBarChangeEvent::StartTracking, false), None);
    }

    #[test]
    fn test_drag_emits_tracking_sequence() {
        let bar = SeekBar::new("volume", 10);
        let scope = LifecycleScope::new("player");
        let mut channel = change_events(&bar)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        bar.drag_to(7);
        assert_eq!(channel.try_recv(), Ok(SeekBarChangeEvent::StartTracking));
        assert_eq!(
            channel.try_recv(),
            Ok(SeekBarChangeEvent::ProgressChanged {
                progress: 7,
                from_user: true
            })
        );
        assert_eq!(channel.try_recv(), Ok(SeekBarChangeEvent::StopTracking));
    }

    #[test]
    fn test_progress_changes_clamp_and_start_with_current() {
        let bar = SeekBar::new("brightness", 100);
        bar.set_progress(40);
        let scope = LifecycleScope::new("display");
        let mut channel = progress_changes(&bar)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        bar.set_progress(250);
        bar.drag_to(-5);
        assert_eq!(channel.try_recv(), Ok(40));
        assert_eq!(channel.try_recv(), Ok(100));
        assert_eq!(channel.try_recv(), Ok(0));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_user_progress_ignores_programmatic_changes() {
        let bar = SeekBar::new("seek", 60);
        let scope = LifecycleScope::new("player");
        let mut channel = user_progress_changes(&bar)
            .channel(&scope, BufferPolicy::Unbounded)
            .unwrap();

        bar.set_progress(10);
        bar.drag_to(30);
        assert_eq!(channel.try_recv(), Ok(30));
        assert_eq!(channel.try_recv(), Err(TryRecvError::Empty));
    }
}
