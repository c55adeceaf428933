//! Broadcast receivers.
//!
//! A [`BroadcastHub`] plays the role of the application context: receivers
//! registered with it hear every sent [`Intent`], and an [`IntentFilter`]
//! narrows a binding to the actions it cares about.

use flowbind_core::{EventAdapter, LifecycleScope, ListenerSet, Widget, WidgetSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// A broadcast message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Action name, e.g. `"android.intent.action.BATTERY_LOW"`
    pub action: String,
    /// Extra key/value payload
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl Intent {
    /// Intent with no extras.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: BTreeMap::new(),
        }
    }

    /// Add an extra.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Look up an extra.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }
}

/// Set of actions a receiver accepts. An empty filter accepts nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFilter {
    actions: Vec<String>,
}

impl IntentFilter {
    /// Filter accepting one action.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            actions: vec![action.into()],
        }
    }

    /// Accept another action.
    pub fn add_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Whether `intent` passes the filter.
    pub fn matches(&self, intent: &Intent) -> bool {
        self.actions.iter().any(|action| *action == intent.action)
    }
}

/// Application-wide broadcast dispatcher.
#[derive(Debug)]
pub struct BroadcastHub {
    name: String,
    attachment: LifecycleScope,
    receivers: ListenerSet<Intent>,
}

impl BroadcastHub {
    /// Create a running hub.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.context", name)),
            name,
            receivers: ListenerSet::new(),
        })
    }

    /// Stop the hub; every receiver binding ends.
    pub fn shutdown(&self) {
        debug!(hub = %self.name, receivers = self.receivers.len(), "Broadcast hub shutting down");
        self.attachment.cancel();
    }

    /// Deliver an intent to every registered receiver. Returns whether any
    /// receiver accepted it.
    pub fn send(&self, intent: Intent) -> bool {
        if self.attachment.is_cancelled() {
            return false;
        }
        trace!(hub = %self.name, action = %intent.action, "Sending broadcast");
        self.receivers.fire(intent)
    }

    /// Receiver set.
    pub fn receivers(&self) -> &ListenerSet<Intent> {
        &self.receivers
    }
}

impl Widget for BroadcastHub {
    fn widget_name(&self) -> &str {
        &self.name
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Intents matching `filter`.
pub fn receive(
    hub: &Arc<BroadcastHub>,
    filter: IntentFilter,
) -> EventAdapter<WidgetSet<BroadcastHub, Intent>, Intent> {
    EventAdapter::filter_map(
        WidgetSet::new(hub.clone(), "receive", BroadcastHub::receivers),
        move |intent: Intent| filter.matches(&intent).then_some(intent),
    )
}
