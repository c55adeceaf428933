//! Lifecycle owners (screens, fragments) and their events.
//!
//! A [`LifecycleOwner`] is both a source of lifecycle events and the scope
//! other bindings are usually tied to: its [`scope`](LifecycleOwner::scope)
//! is cancelled when the owner is destroyed, after observers have seen
//! [`LifecycleEvent::OnDestroy`].

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSet, Widget, WidgetSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle states, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Destroyed; terminal.
    Destroyed,
    /// Constructed, not yet created.
    Initialized,
    /// Created, not visible.
    Created,
    /// Visible.
    Started,
    /// In the foreground.
    Resumed,
}

/// Lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Initialized -> Created
    OnCreate,
    /// Created -> Started
    OnStart,
    /// Started -> Resumed
    OnResume,
    /// Resumed -> Started
    OnPause,
    /// Started -> Created
    OnStop,
    /// Created -> Destroyed
    OnDestroy,
}

impl LifecycleEvent {
    /// State the owner is in after this event.
    pub fn target_state(&self) -> LifecycleState {
        match self {
            LifecycleEvent::OnCreate | LifecycleEvent::OnStop => LifecycleState::Created,
            LifecycleEvent::OnStart | LifecycleEvent::OnPause => LifecycleState::Started,
            LifecycleEvent::OnResume => LifecycleState::Resumed,
            LifecycleEvent::OnDestroy => LifecycleState::Destroyed,
        }
    }

    /// State the owner must be in for this event to be valid.
    pub fn source_state(&self) -> LifecycleState {
        match self {
            LifecycleEvent::OnCreate => LifecycleState::Initialized,
            LifecycleEvent::OnStart | LifecycleEvent::OnDestroy => LifecycleState::Created,
            LifecycleEvent::OnResume | LifecycleEvent::OnStop => LifecycleState::Started,
            LifecycleEvent::OnPause => LifecycleState::Resumed,
        }
    }
}

/// A component with a lifecycle.
#[derive(Debug)]
pub struct LifecycleOwner {
    id: String,
    scope: LifecycleScope,
    state: Mutex<LifecycleState>,
    observers: ListenerSet<LifecycleEvent>,
}

impl LifecycleOwner {
    /// Create an owner in the `Initialized` state.
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            scope: LifecycleScope::new(format!("{}.lifecycle", id)),
            id,
            state: Mutex::new(LifecycleState::Initialized),
            observers: ListenerSet::new(),
        })
    }

    /// Scope cancelled when the owner is destroyed.
    pub fn scope(&self) -> LifecycleScope {
        self.scope.clone()
    }

    /// Current state.
    pub fn current_state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Whether the owner is at least in `state`.
    pub fn is_at_least(&self, state: LifecycleState) -> bool {
        self.current_state() >= state
    }

    /// Apply a transition. Returns `false`, leaving the state unchanged, if
    /// the event is not valid from the current state.
    pub fn handle_event(&self, event: LifecycleEvent) -> bool {
        {
            let mut state = self.state.lock();
            if *state != event.source_state() {
                warn!(owner = %self.id, ?event, state = ?*state, "Invalid lifecycle transition");
                return false;
            }
            *state = event.target_state();
        }
        debug!(owner = %self.id, ?event, "Lifecycle transition");
        self.observers.fire(event);
        if event == LifecycleEvent::OnDestroy {
            self.scope.cancel();
        }
        true
    }

    /// Walk forward to `Resumed`.
    pub fn resume(&self) {
        for event in [
            LifecycleEvent::OnCreate,
            LifecycleEvent::OnStart,
            LifecycleEvent::OnResume,
        ] {
            if self.current_state() == event.source_state() {
                self.handle_event(event);
            }
        }
    }

    /// Walk down to `Destroyed` from any live state.
    pub fn destroy(&self) {
        for event in [
            LifecycleEvent::OnPause,
            LifecycleEvent::OnStop,
            LifecycleEvent::OnDestroy,
        ] {
            if self.current_state() == event.source_state() {
                self.handle_event(event);
            }
        }
        if self.current_state() == LifecycleState::Initialized {
            *self.state.lock() = LifecycleState::Destroyed;
            self.scope.cancel();
        }
    }

    /// Observer set.
    pub fn observers(&self) -> &ListenerSet<LifecycleEvent> {
        &self.observers
    }
}

impl Widget for LifecycleOwner {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.scope
    }
}

/// Lifecycle events of the owner.
pub fn events(
    owner: &Arc<LifecycleOwner>,
) -> EventAdapter<WidgetSet<LifecycleOwner, LifecycleEvent>, LifecycleEvent> {
    EventAdapter::new(
        WidgetSet::new(owner.clone(), "events", LifecycleOwner::observers),
        |event| event,
    )
}
