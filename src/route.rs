//! Next-day backlog ("initial route") from projected flow and carried-over tickets.

use chrono::Duration;
use serde::Serialize;

use crate::filter::{apply, Selection};
use crate::types::{DailyProjection, RecordSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    /// Projected incoming for the range end plus leftovers from the prior day.
    pub load: i64,
    /// Projected completed plus cancelled for the range end.
    pub throughput: i64,
    /// `load - throughput`; positive means the backlog grows.
    pub balance: i64,
    pub leftover_prior_day: u64,
}

pub fn route_balance(
    proj_incoming_last: u64,
    proj_completed_last: u64,
    proj_cancelled_last: u64,
    leftover_count_prior_day: u64,
) -> i64 {
    (proj_incoming_last as i64 + leftover_count_prior_day as i64)
        - (proj_completed_last as i64 + proj_cancelled_last as i64)
}

/// Leftovers created on the day before the selection starts.
///
/// Region and category filters apply; the selection's date interval does not.
pub fn leftover_count_prior_day(leftover: &RecordSet, selection: &Selection) -> u64 {
    let Some(prior) = selection.start().checked_sub_signed(Duration::days(1)) else {
        return 0;
    };
    apply(leftover, selection, true)
        .iter()
        .filter(|e| e.date() == prior)
        .count() as u64
}

pub fn route_summary(
    incoming: &DailyProjection,
    completed: &DailyProjection,
    cancelled: &DailyProjection,
    leftover: &RecordSet,
    selection: &Selection,
) -> RouteSummary {
    let leftover_prior_day = leftover_count_prior_day(leftover, selection);
    let load = incoming.last() as i64 + leftover_prior_day as i64;
    let throughput = completed.last() as i64 + cancelled.last() as i64;
    RouteSummary {
        load,
        throughput,
        balance: route_balance(
            incoming.last(),
            completed.last(),
            cancelled.last(),
            leftover_prior_day,
        ),
        leftover_prior_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordKind, TicketEvent};
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn leftover(entries: &[(NaiveDate, &str)]) -> RecordSet {
        RecordSet::new(
            RecordKind::Leftover,
            entries
                .iter()
                .map(|(d, region)| {
                    TicketEvent::new(d.and_hms_opt(17, 30, 0).unwrap(), region, "Reparo de Fibra")
                })
                .collect(),
        )
    }

    #[test]
    fn balance_arithmetic() {
        assert_eq!(route_balance(50, 40, 5, 10), 15);
        assert_eq!(route_balance(0, 12, 3, 1), -14);
        assert_eq!(route_balance(0, 0, 0, 0), 0);
    }

    #[test]
    fn prior_day_leftovers_ignore_the_date_interval() {
        let set = leftover(&[
            (ymd(2026, 3, 1), "Campinas"),
            (ymd(2026, 3, 1), "Campinas"),
            (ymd(2026, 3, 1), "Sumaré"),
            (ymd(2026, 2, 28), "Campinas"),
            (ymd(2026, 3, 2), "Campinas"),
        ]);
        let sel = Selection::new(
            vec!["CAMPINAS".to_string()],
            vec![],
            ymd(2026, 3, 2),
            ymd(2026, 3, 5),
        )
        .unwrap();
        assert_eq!(leftover_count_prior_day(&set, &sel), 2);
    }

    #[test]
    fn no_prior_day_before_the_calendar_floor() {
        let set = leftover(&[(NaiveDate::MIN, "Campinas")]);
        let sel = Selection::all(NaiveDate::MIN, NaiveDate::MIN).unwrap();
        assert_eq!(leftover_count_prior_day(&set, &sel), 0);
    }

    #[test]
    fn summary_uses_the_last_projected_day() {
        let start = ymd(2026, 3, 2);
        let end = ymd(2026, 3, 3);
        let incoming = DailyProjection::new(start, end, vec![70, 50]);
        let completed = DailyProjection::new(start, end, vec![10, 40]);
        let cancelled = DailyProjection::new(start, end, vec![1, 5]);
        let set = leftover(&[(ymd(2026, 3, 1), "Campinas"); 10]);
        let sel = Selection::all(start, end).unwrap();

        let summary = route_summary(&incoming, &completed, &cancelled, &set, &sel);
        assert_eq!(summary.leftover_prior_day, 10);
        assert_eq!(summary.load, 60);
        assert_eq!(summary.throughput, 45);
        assert_eq!(summary.balance, 15);
    }

    #[test]
    fn empty_inputs_contribute_nothing() {
        let start = ymd(2026, 3, 2);
        let empty = DailyProjection::new(start, start, vec![]);
        let sel = Selection::all(start, start).unwrap();
        let summary = route_summary(
            &empty,
            &empty,
            &empty,
            &RecordSet::empty(RecordKind::Leftover),
            &sel,
        );
        assert_eq!(summary.balance, 0);
    }
}
