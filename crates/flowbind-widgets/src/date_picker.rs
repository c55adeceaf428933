//! Date pickers.

use chrono::{Datelike, NaiveDate};
use flowbind_core::{EventAdapter, LifecycleScope, ListenerSlot, Widget, WidgetSlot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw date-changed callback arguments: `(year, month, day)`, month 1-based.
pub type DateArgs = (i32, u32, u32);

/// The selected date changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateChangedEvent {
    /// Year
    pub year: i32,
    /// Month, 1-based
    pub month: u32,
    /// Day of month
    pub day: u32,
}

impl DateChangedEvent {
    /// The selected date as a calendar date.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl From<NaiveDate> for DateChangedEvent {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Package date-changed arguments.
pub fn date_changed_event(args: DateArgs) -> DateChangedEvent {
    let (year, month, day) = args;
    DateChangedEvent { year, month, day }
}

/// A calendar date picker.
#[derive(Debug)]
pub struct DatePicker {
    id: String,
    attachment: LifecycleScope,
    date: Mutex<NaiveDate>,
    on_date_changed: ListenerSlot<DateArgs>,
}

impl DatePicker {
    /// Create an attached picker showing `date`.
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Arc<Self> {
        let id = id.into();
        Arc::new(Self {
            attachment: LifecycleScope::new(format!("{}.attachment", id)),
            id,
            date: Mutex::new(date),
            on_date_changed: ListenerSlot::new(),
        })
    }

    /// Detach from the window.
    pub fn detach(&self) {
        debug!(date_picker = %self.id, "Date picker detached");
        self.attachment.cancel();
    }

    /// Selected date.
    pub fn date(&self) -> NaiveDate {
        *self.date.lock()
    }

    /// Select a date. Returns `false` for an invalid calendar date.
    pub fn update_date(&self, year: i32, month: u32, day: u32) -> bool {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            warn!(date_picker = %self.id, year, month, day, "Ignoring invalid date");
            return false;
        };
        let previous = std::mem::replace(&mut *self.date.lock(), date);
        if previous != date && !self.attachment.is_cancelled() {
            self.on_date_changed.fire((year, month, day));
        }
        true
    }

    /// Date-changed listener slot.
    pub fn date_changed_slot(&self) -> &ListenerSlot<DateArgs> {
        &self.on_date_changed
    }
}

impl Widget for DatePicker {
    fn widget_name(&self) -> &str {
        &self.id
    }

    fn attachment(&self) -> &LifecycleScope {
        &self.attachment
    }
}

/// Selected dates, starting with the current selection.
pub fn date_changes(
    picker: &Arc<DatePicker>,
) -> EventAdapter<WidgetSlot<DatePicker, DateArgs>, DateChangedEvent> {
    let current = picker.clone();
    EventAdapter::new(
        WidgetSlot::new(picker.clone(), "date_changes", DatePicker::date_changed_slot),
        date_changed_event,
    )
    .with_initial_value(move || DateChangedEvent::from(current.date()))
}
