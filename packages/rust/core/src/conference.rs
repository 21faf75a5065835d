//! Conference-season detection.

use chrono::{Datelike, NaiveDate};
use signalwatch_shared::ConferenceWindow;

/// Yearly conference windows. Evaluation depends only on month and day.
#[derive(Debug, Clone)]
pub struct ConferenceCalendar {
    windows: Vec<ConferenceWindow>,
}

impl ConferenceCalendar {
    pub fn new(windows: Vec<ConferenceWindow>) -> Self {
        Self { windows }
    }

    /// Whether `date` falls inside any window, bounds inclusive.
    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.active_window(date).is_some()
    }

    /// The first window containing `date`.
    pub fn active_window(&self, date: NaiveDate) -> Option<&ConferenceWindow> {
        let day = (date.month(), date.day());
        self.windows.iter().find(|w| contains(w, day))
    }
}

fn contains(window: &ConferenceWindow, day: (u32, u32)) -> bool {
    let start = (window.start_month, window.start_day);
    let end = (window.end_month, window.end_day);
    if start <= end {
        start <= day && day <= end
    } else {
        // Wraps over new year.
        day >= start || day <= end
    }
}
