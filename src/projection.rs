//! Trailing-window, day-of-week seasonal projection of daily ticket counts.
//!
//! The reference window is the 28 days strictly before the range start. Each
//! projected day takes the mean daily count observed on the same weekday in
//! that window, rounded half-to-even.

use chrono::{Datelike, Duration, NaiveDate};
use log::debug;
use std::collections::BTreeMap;

use crate::types::{DailyProjection, RecordSet};
use crate::util::{average, date_span, round_count};

pub const REFERENCE_WINDOW_DAYS: i64 = 28;

/// Which slice of history fed the weekday means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceWindow {
    /// `[range_start - 28d, range_start)`.
    Trailing,
    /// The projected range itself, used when the trailing window is empty.
    /// This makes the projection partly self-referential; it is an
    /// approximation for the first weeks of a deployment.
    Fallback,
    /// Nothing to learn from; the projection is all zeros.
    Empty,
}

impl ReferenceWindow {
    /// Whether `date` falls inside this window for `[range_start, range_end]`.
    pub fn contains(&self, date: NaiveDate, range_start: NaiveDate, range_end: NaiveDate) -> bool {
        match self {
            ReferenceWindow::Trailing => {
                // Near the calendar floor the window is clipped to whatever history exists.
                let window_start = range_start
                    .checked_sub_signed(Duration::days(REFERENCE_WINDOW_DAYS))
                    .unwrap_or(NaiveDate::MIN);
                date >= window_start && date < range_start
            }
            ReferenceWindow::Fallback => date >= range_start && date <= range_end,
            ReferenceWindow::Empty => false,
        }
    }
}

/// Weekday means learned from one reference window.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayProfile {
    /// Indexed Monday = 0 .. Sunday = 6; `None` when the weekday never occurs.
    pub by_weekday: [Option<f64>; 7],
    pub overall_mean: f64,
}

impl WeekdayProfile {
    fn from_daily_counts(counts: &BTreeMap<NaiveDate, usize>) -> Self {
        let mut buckets: [Vec<f64>; 7] = Default::default();
        for (date, count) in counts {
            buckets[date.weekday().num_days_from_monday() as usize].push(*count as f64);
        }
        let all: Vec<f64> = counts.values().map(|c| *c as f64).collect();
        let mut by_weekday = [None; 7];
        for (slot, bucket) in by_weekday.iter_mut().zip(buckets.iter()) {
            if !bucket.is_empty() {
                *slot = Some(average(bucket));
            }
        }
        Self {
            by_weekday,
            overall_mean: average(&all),
        }
    }

    pub fn expected(&self, date: NaiveDate) -> f64 {
        self.by_weekday[date.weekday().num_days_from_monday() as usize]
            .unwrap_or(self.overall_mean)
    }
}

/// Project `[range_start, range_end]` from `history`.
pub fn project(history: &RecordSet, range_start: NaiveDate, range_end: NaiveDate) -> DailyProjection {
    project_with_window(history, range_start, range_end).0
}

/// Same as [`project`], also reporting which reference window was used.
pub fn project_with_window(
    history: &RecordSet,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> (DailyProjection, ReferenceWindow) {
    let span = date_span(range_start, range_end);
    let (window, counts) = reference_window(history, range_start, range_end);
    if counts.is_empty() {
        return (
            DailyProjection::new(range_start, range_end, vec![0; span.len()]),
            window,
        );
    }
    debug!(
        "{} projection {}..{}: {:?} window over {} days",
        history.kind,
        range_start,
        range_end,
        window,
        counts.len()
    );

    let profile = WeekdayProfile::from_daily_counts(&counts);
    let values = span
        .iter()
        .map(|d| round_count(profile.expected(*d)))
        .collect();
    (DailyProjection::new(range_start, range_end, values), window)
}

/// Pick the reference window for `[range_start, range_end]` and count events
/// per date inside it. The trailing window wins whenever it holds any event.
pub fn reference_window(
    history: &RecordSet,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> (ReferenceWindow, BTreeMap<NaiveDate, usize>) {
    for window in [ReferenceWindow::Trailing, ReferenceWindow::Fallback] {
        let counts = daily_counts(history, |d| window.contains(d, range_start, range_end));
        if !counts.is_empty() {
            return (window, counts);
        }
    }
    (ReferenceWindow::Empty, BTreeMap::new())
}

/// Events per calendar date, for dates accepted by `keep`.
pub fn daily_counts<F>(records: &RecordSet, keep: F) -> BTreeMap<NaiveDate, usize>
where
    F: Fn(NaiveDate) -> bool,
{
    let mut counts = BTreeMap::new();
    for date in records.iter().map(|e| e.date()).filter(|d| keep(*d)) {
        *counts.entry(date).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordKind, TicketEvent};
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn history(per_day: &[(NaiveDate, usize)]) -> RecordSet {
        let mut events = Vec::new();
        for (date, n) in per_day {
            for i in 0..*n {
                let at = date.and_hms_opt(8 + (i % 10) as u32, 0, 0).unwrap();
                events.push(TicketEvent::new(at, "Campinas", "Reparo de Fibra"));
            }
        }
        RecordSet::new(RecordKind::Incoming, events)
    }

    #[test]
    fn empty_history_projects_zeros() {
        let (proj, window) =
            project_with_window(&RecordSet::empty(RecordKind::Incoming), ymd(2026, 3, 2), ymd(2026, 3, 8));
        assert_eq!(proj.values, vec![0; 7]);
        assert_eq!(proj.total, 0);
        assert_eq!(window, ReferenceWindow::Empty);
    }

    #[test]
    fn weekday_means_come_from_the_trailing_window() {
        // 2026-03-02 is a Monday. Four Mondays before it with 4, 6, 8, 10 events.
        let mondays: Vec<(NaiveDate, usize)> = (1..=4)
            .map(|w| (ymd(2026, 3, 2) - Duration::weeks(w), 2 + 2 * w as usize))
            .collect();
        let mut days = mondays.clone();
        // One Tuesday, and one Monday older than 28 days that must be ignored.
        days.push((ymd(2026, 2, 24), 3));
        days.push((ymd(2026, 1, 26), 100));
        let (proj, window) = project_with_window(&history(&days), ymd(2026, 3, 2), ymd(2026, 3, 4));
        assert_eq!(window, ReferenceWindow::Trailing);
        // Monday mean 7, Tuesday 3, Wednesday falls back to overall mean (7*4+3)/5 = 6.2.
        assert_eq!(proj.values, vec![7, 3, 6]);
        assert_eq!(proj.total, 16);
    }

    #[test]
    fn range_start_is_excluded_from_trailing_window() {
        let days = [(ymd(2026, 3, 1), 4), (ymd(2026, 3, 2), 50)];
        let proj = project(&history(&days), ymd(2026, 3, 2), ymd(2026, 3, 2));
        assert_eq!(proj.values, vec![4]);
    }

    #[test]
    fn falls_back_to_the_range_itself_without_prior_history() {
        let days = [(ymd(2026, 1, 5), 2), (ymd(2026, 1, 6), 5)];
        let (proj, window) = project_with_window(&history(&days), ymd(2026, 1, 5), ymd(2026, 1, 7));
        assert_eq!(window, ReferenceWindow::Fallback);
        // Mon 2, Tue 5, Wed -> overall 3.5 -> ties to even 4.
        assert_eq!(proj.values, vec![2, 5, 4]);
    }

    #[test]
    fn history_outside_both_windows_yields_zeros() {
        let days = [(ymd(2025, 6, 1), 9)];
        let (proj, window) = project_with_window(&history(&days), ymd(2026, 1, 5), ymd(2026, 1, 6));
        assert_eq!(window, ReferenceWindow::Empty);
        assert_eq!(proj.values, vec![0, 0]);
    }

    #[test]
    fn single_day_range_has_one_entry() {
        let days = [(ymd(2026, 2, 27), 3)];
        let proj = project(&history(&days), ymd(2026, 3, 1), ymd(2026, 3, 1));
        assert_eq!(proj.values.len(), 1);
        assert_eq!(proj.last(), 3);
    }

    #[test]
    fn range_at_the_calendar_floor_clips_the_window() {
        let start = NaiveDate::MIN + Duration::days(3);
        let days = [(NaiveDate::MIN + Duration::days(1), 1)];
        let (proj, window) = project_with_window(&history(&days), start, start);
        assert_eq!(window, ReferenceWindow::Trailing);
        assert_eq!(proj.values, vec![1]);

        let (proj, window) = project_with_window(&history(&[(start, 2)]), start, start);
        assert_eq!(window, ReferenceWindow::Fallback);
        assert_eq!(proj.values, vec![2]);
    }

    #[test]
    fn rounding_is_half_to_even() {
        // Mondays with 2 and 3 events: mean 2.5 -> 2. Tuesdays 3 and 4: 3.5 -> 4.
        let days = [
            (ymd(2026, 2, 16), 2),
            (ymd(2026, 2, 23), 3),
            (ymd(2026, 2, 17), 3),
            (ymd(2026, 2, 24), 4),
        ];
        let proj = project(&history(&days), ymd(2026, 3, 2), ymd(2026, 3, 3));
        assert_eq!(proj.values, vec![2, 4]);
    }
}
