//! Realized volume against projection for one record kind.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::filter::{apply, Selection};
use crate::projection::{daily_counts, project};
use crate::types::{DailyProjection, RecordKind, RecordSet};
use crate::util::percent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub projected: u64,
    pub realized: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindReconciliation {
    pub kind: RecordKind,
    pub realized_total: u64,
    pub projected_total: u64,
    pub adherence_pct: f64,
    /// `realized - projected`; positive when realized exceeded projection.
    pub gap: i64,
    /// One point per date of the projection's date axis.
    pub daily: Vec<DailyPoint>,
    #[serde(skip)]
    pub projection: DailyProjection,
}

impl KindReconciliation {
    pub fn projected_series(&self) -> Vec<u64> {
        self.daily.iter().map(|p| p.projected).collect()
    }

    pub fn realized_series(&self) -> Vec<u64> {
        self.daily.iter().map(|p| p.realized).collect()
    }
}

pub fn adherence_pct(realized_total: u64, projected_total: u64) -> f64 {
    percent(realized_total as f64, projected_total as f64)
}

/// Compare a realized set for the range with its projection.
///
/// Realized counts are left-joined onto the projection's dates, so a realized
/// date outside the range never reaches the output series.
pub fn reconcile(realized: &RecordSet, projection: &DailyProjection) -> KindReconciliation {
    let (start, end) = (projection.start, projection.end);
    let in_range: BTreeMap<NaiveDate, usize> =
        daily_counts(realized, |d| d >= start && d <= end);
    let daily: Vec<DailyPoint> = projection
        .dates()
        .zip(projection.values.iter())
        .map(|(date, projected)| DailyPoint {
            date,
            projected: *projected,
            realized: in_range.get(&date).copied().unwrap_or(0) as u64,
        })
        .collect();

    let realized_total = in_range.values().sum::<usize>() as u64;
    let projected_total = projection.total;
    KindReconciliation {
        kind: realized.kind,
        realized_total,
        projected_total,
        adherence_pct: adherence_pct(realized_total, projected_total),
        gap: realized_total as i64 - projected_total as i64,
        daily,
        projection: projection.clone(),
    }
}

/// Filter, project and reconcile one kind for the current selection.
///
/// The projection learns from the region/category-filtered history with the
/// date interval ignored, so the trailing window can reach before the range.
pub fn reconcile_kind(records: &RecordSet, selection: &Selection) -> KindReconciliation {
    let history = apply(records, selection, true);
    let projection = project(&history, selection.start(), selection.end());
    let realized = apply(records, selection, false);
    reconcile(&realized, &projection)
}
