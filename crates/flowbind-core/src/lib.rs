//! # Flowbind Core
//!
//! Adapts listener-style UI callbacks into lifecycle-scoped event sources.
//!
//! A widget exposes a listener slot (`set_on_click`) or a listener set
//! (`add_on_scroll` / `remove_on_scroll`). An [`EventAdapter`] binds one of
//! these to a [`Scope`] and delivers the mapped events in one of three
//! styles: a sequential callback, a buffered channel, or a lazy stream.
//! When the scope ends or the widget is detached the listener is
//! unregistered and nothing more is delivered.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ Widget listener │───▶│  EventAdapter    │───▶│  EventBuffer    │
//! │ (slot or set)   │    │ (map, handled,   │    │ (policy,        │
//! │                 │    │  scope checks)   │    │  overflow)      │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//!         ▲                       │                       │
//!         │                       ▼                       ▼
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ LifecycleScope  │◀───│ Teardown (once)  │    │ Callback task / │
//! │ attachment      │    │                  │    │ Channel/Stream  │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod buffer;
pub mod config;
pub mod error;
pub mod scope;
pub mod slot;

pub use adapter::{
    BindingId, BindingState, CallbackHandle, Delivery, DeliveryMode, EventAdapter, EventChannel,
    EventSource, EventStream, HandledPredicate, InitialValue, Mapper,
};
pub use buffer::{BufferPolicy, BufferStats, EventBuffer, OverflowPolicy, PushOutcome};
pub use config::AdapterConfig;
pub use error::{Error, Result, TryRecvError};
pub use scope::{Cleanup, CleanupKey, LifecycleScope, Scope};
pub use slot::{
    ListenerSet, ListenerSlot, ListenerSource, NativeListener, RegistrationId, Widget, WidgetSet,
    WidgetSlot,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        BufferPolicy, Delivery, EventAdapter, EventChannel, EventStream, LifecycleScope,
        ListenerSet, ListenerSlot, ListenerSource, OverflowPolicy, Scope, Widget, WidgetSet,
        WidgetSlot,
    };
}
