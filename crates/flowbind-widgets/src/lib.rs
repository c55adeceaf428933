//! # Flowbind Widgets
//!
//! An in-process widget model exposing the registration primitives of a
//! listener-based UI toolkit, plus one binding constructor per widget event.
//!
//! Each module follows the same layout: the widget, its domain events, the
//! pure mapping from raw callback arguments to those events, and functions
//! returning a configured [`EventAdapter`](flowbind_core::EventAdapter).
//!
//! ```ignore
//! let button = CompoundButton::new("wifi");
//! let scope = LifecycleScope::new("settings");
//! let mut states = compound_button::checked_changes(&button)
//!     .channel(&scope, BufferPolicy::Conflated)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod broadcast;
pub mod compound_button;
pub mod date_picker;
pub mod drawer_layout;
pub mod lifecycle;
pub mod recycler_view;
pub mod seek_bar;
pub mod swipe_refresh;
pub mod text_view;
pub mod view;

pub use broadcast::{BroadcastHub, Intent, IntentFilter};
pub use compound_button::CompoundButton;
pub use date_picker::{DateChangedEvent, DatePicker};
pub use drawer_layout::{DrawerCallback, DrawerLayout, Gravity};
pub use lifecycle::{LifecycleEvent, LifecycleOwner, LifecycleState};
pub use recycler_view::{RecyclerView, RecyclerViewScrollEvent, ScrollCallback, ScrollState};
pub use seek_bar::{SeekBar, SeekBarChangeEvent};
pub use swipe_refresh::SwipeRefreshLayout;
pub use text_view::{EditorActionEvent, TextChange, TextChangeEvent, TextView};
pub use view::{View, ViewScrollChangeEvent};
