use crate::filter::{apply, Selection};
use crate::projection::reference_window;
use crate::reconcile::{reconcile_kind, KindReconciliation};
use crate::route::{route_summary, RouteSummary};
use crate::types::{
    AgingBucketRow, BreakdownRow, CityActionRow, DailyProjection, Dataset, HourlyRow,
    KindSummaryRow, ProjectionRow, RecordKind, RecordSet, TechnicianRow, TicketEvent,
    NOT_INFORMED,
};
use crate::util::{average, format_int, format_number, percent, round_count};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Tickets older than this many days are out of SLA.
pub const SLA_OVERDUE_DAYS: i64 = 2;

const OLDEST_TICKETS: usize = 10;

/// Cities listed in the action plan.
pub const ACTION_PLAN_CITIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SlaBucket {
    Fresh,
    Attention,
    Critical,
    Overdue,
}

impl SlaBucket {
    pub const ALL: [SlaBucket; 4] = [
        SlaBucket::Fresh,
        SlaBucket::Attention,
        SlaBucket::Critical,
        SlaBucket::Overdue,
    ];

    pub fn classify(age_days: i64) -> Self {
        match age_days {
            d if d <= 1 => SlaBucket::Fresh,
            2 => SlaBucket::Attention,
            3 => SlaBucket::Critical,
            _ => SlaBucket::Overdue,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlaBucket::Fresh => "0-24h",
            SlaBucket::Attention => "24-48h",
            SlaBucket::Critical => "48-72h",
            SlaBucket::Overdue => "+72h",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgedTicket {
    pub protocol: String,
    pub city: String,
    pub category: String,
    pub age_days: i64,
    pub pending_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingSummary {
    pub tickets: usize,
    pub avg_age_days: f64,
    pub overdue: usize,
    pub overdue_pct: f64,
    pub buckets: Vec<(SlaBucket, usize)>,
    /// Mean age per city, oldest first.
    pub by_city: Vec<(String, f64)>,
    pub oldest: Vec<AgedTicket>,
}

impl AgingSummary {
    pub fn bucket_rows(&self) -> Vec<AgingBucketRow> {
        self.buckets
            .iter()
            .map(|(bucket, n)| AgingBucketRow {
                bucket: bucket.label().to_string(),
                tickets: *n,
            })
            .collect()
    }
}

fn or_sentinel(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_INFORMED.to_string())
}

fn age_days(event: &TicketEvent, now: NaiveDateTime) -> i64 {
    (now - event.occurred_at).num_days()
}

/// Queue health of pending tickets at `now`.
pub fn aging_summary(pending: &RecordSet, now: NaiveDateTime) -> AgingSummary {
    let ages: Vec<(i64, &TicketEvent)> = pending.iter().map(|e| (age_days(e, now), e)).collect();

    let mut counts: BTreeMap<SlaBucket, usize> =
        SlaBucket::ALL.iter().map(|b| (*b, 0)).collect();
    let mut city_ages: HashMap<String, Vec<f64>> = HashMap::new();
    for (age, e) in &ages {
        *counts.entry(SlaBucket::classify(*age)).or_insert(0) += 1;
        city_ages
            .entry(or_sentinel(&e.city))
            .or_default()
            .push(*age as f64);
    }

    let all_ages: Vec<f64> = ages.iter().map(|(a, _)| *a as f64).collect();
    let overdue = ages.iter().filter(|(a, _)| *a > SLA_OVERDUE_DAYS).count();

    let mut by_city: Vec<(String, f64)> = city_ages
        .into_iter()
        .map(|(city, v)| (city, average(&v)))
        .collect();
    by_city.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut sorted = ages.clone();
    sorted.sort_by(|a, b| b.0.cmp(&a.0));
    let oldest = sorted
        .into_iter()
        .take(OLDEST_TICKETS)
        .map(|(age, e)| AgedTicket {
            protocol: or_sentinel(&e.protocol),
            city: or_sentinel(&e.city),
            category: e.category.clone(),
            age_days: age,
            pending_reason: or_sentinel(&e.reason),
        })
        .collect();

    AgingSummary {
        tickets: ages.len(),
        avg_age_days: average(&all_ages),
        overdue,
        overdue_pct: percent(overdue as f64, ages.len() as f64),
        buckets: counts.into_iter().collect(),
        by_city,
        oldest,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityStatus {
    Overloaded,
    Balanced,
    Idle,
}

impl CapacityStatus {
    pub fn from_occupancy(pct: f64) -> Self {
        if pct > 90.0 {
            CapacityStatus::Overloaded
        } else if pct < 60.0 {
            CapacityStatus::Idle
        } else {
            CapacityStatus::Balanced
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EfficiencySummary {
    pub technicians: usize,
    pub occupancy_pct: f64,
    pub success_rate_pct: f64,
    pub status: CapacityStatus,
    pub rows: Vec<TechnicianRow>,
}

/// Completed versus still-pending work per technician.
pub fn technician_efficiency(
    completed: &RecordSet,
    pending: &RecordSet,
    daily_target: u32,
) -> EfficiencySummary {
    #[derive(Default)]
    struct Acc {
        completed: usize,
        pending: usize,
    }
    let mut map: HashMap<String, Acc> = HashMap::new();
    for e in completed.iter() {
        map.entry(or_sentinel(&e.technician)).or_default().completed += 1;
    }
    for e in pending.iter() {
        map.entry(or_sentinel(&e.technician)).or_default().pending += 1;
    }

    let mut tmp: Vec<(f64, String, Acc)> = map
        .into_iter()
        .map(|(name, acc)| {
            let eff = percent(acc.completed as f64, (acc.completed + acc.pending) as f64);
            (eff, name, acc)
        })
        .collect();
    tmp.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let technicians = tmp.len();
    let done: usize = tmp.iter().map(|(_, _, a)| a.completed).sum();
    let visits: usize = tmp.iter().map(|(_, _, a)| a.completed + a.pending).sum();
    let capacity = technicians as f64 * daily_target as f64;
    let occupancy_pct = percent(visits as f64, capacity);

    let rows = tmp
        .into_iter()
        .map(|(eff, technician, acc)| TechnicianRow {
            technician,
            completed: acc.completed,
            pending: acc.pending,
            total: acc.completed + acc.pending,
            efficiency_pct: format_number(eff, 1),
        })
        .collect();

    EfficiencySummary {
        technicians,
        occupancy_pct,
        success_rate_pct: percent(done as f64, visits as f64),
        status: CapacityStatus::from_occupancy(occupancy_pct),
        rows,
    }
}

/// Volume per hour of day, all 24 hours present.
pub fn hourly_volume(records: &RecordSet) -> [usize; 24] {
    let mut hours = [0usize; 24];
    for e in records.iter() {
        hours[e.occurred_at.hour() as usize] += 1;
    }
    hours
}

pub fn hourly_rows(records: &RecordSet) -> Vec<HourlyRow> {
    let hours = hourly_volume(records);
    let peak = hours.iter().copied().max().unwrap_or(0);
    hours
        .iter()
        .enumerate()
        .map(|(h, v)| HourlyRow {
            hour: format!("{:02}h", h),
            volume: *v,
            peak: if *v == peak && peak > 0 {
                "Peak".to_string()
            } else {
                String::new()
            },
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Region,
    City,
    Category,
    Olt,
    Reason,
    Sector,
    Technician,
}

impl Attribute {
    fn value_of(&self, e: &TicketEvent) -> String {
        match self {
            Attribute::Region => e.region.clone(),
            Attribute::City => or_sentinel(&e.city),
            Attribute::Category => e.category.clone(),
            Attribute::Olt => or_sentinel(&e.olt),
            Attribute::Reason => or_sentinel(&e.reason),
            Attribute::Sector => or_sentinel(&e.sector),
            Attribute::Technician => or_sentinel(&e.technician),
        }
    }
}

/// Ticket count and share per attribute value, largest first.
pub fn breakdown(records: &RecordSet, attribute: Attribute) -> Vec<BreakdownRow> {
    let mut map: HashMap<String, usize> = HashMap::new();
    for e in records.iter() {
        *map.entry(attribute.value_of(e)).or_insert(0) += 1;
    }
    let total = records.len() as f64;
    let mut tmp: Vec<(String, usize)> = map.into_iter().collect();
    tmp.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tmp.into_iter()
        .map(|(value, count)| BreakdownRow {
            value,
            count,
            share_pct: format_number(percent(count as f64, total), 1),
        })
        .collect()
}

/// Cities furthest below their share of the projection, worst first.
///
/// Each city present in `realized` gets the part of `projection.total` that
/// matches its share of the reference window `history` learned from. The
/// share is its window count over the window's distinct dates, stretched to
/// the range length and scaled by `projection.total / (daily mean * days)`.
/// Cities missing from the window project zero.
pub fn city_action_plan(
    history: &RecordSet,
    realized: &RecordSet,
    projection: &DailyProjection,
) -> Vec<CityActionRow> {
    let (start, end) = (projection.start, projection.end);
    let (window, counts) = reference_window(history, start, end);

    let base_days = counts.len().max(1) as f64;
    let daily_mean = average(&counts.values().map(|c| *c as f64).collect::<Vec<_>>());
    let days = projection.values.len() as f64;
    let linear = daily_mean * days;
    let weight = if linear > 0.0 {
        projection.total as f64 / linear
    } else {
        1.0
    };

    let mut window_by_city: HashMap<String, usize> = HashMap::new();
    for e in history.iter().filter(|e| window.contains(e.date(), start, end)) {
        *window_by_city.entry(or_sentinel(&e.city)).or_insert(0) += 1;
    }
    let mut realized_by_city: HashMap<String, usize> = HashMap::new();
    for e in realized.iter().filter(|e| e.date() >= start && e.date() <= end) {
        *realized_by_city.entry(or_sentinel(&e.city)).or_insert(0) += 1;
    }

    let mut rows: Vec<CityActionRow> = realized_by_city
        .into_iter()
        .map(|(city, done)| {
            let in_window = window_by_city.get(&city).copied().unwrap_or(0) as f64;
            let projected = round_count(in_window / base_days * days * weight);
            CityActionRow {
                city,
                realized: done as u64,
                projected,
                gap: done as i64 - projected as i64,
                adherence_pct: format_number(percent(done as f64, projected as f64), 1),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.gap.cmp(&b.gap).then_with(|| a.city.cmp(&b.city)));
    rows.truncate(ACTION_PLAN_CITIES);
    debug!(
        "{} action plan {}..{}: weight {:.3} over {:?} window",
        realized.kind, start, end, weight, window
    );
    rows
}

/// Everything the overview page shows for one selection.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub incoming: KindReconciliation,
    pub completed: KindReconciliation,
    pub cancelled: KindReconciliation,
    pub route: RouteSummary,
    pub avg_leftover_age_days: f64,
}

impl Overview {
    pub fn kinds(&self) -> [&KindReconciliation; 3] {
        [&self.incoming, &self.completed, &self.cancelled]
    }
}

pub fn build_overview(data: &Dataset, selection: &Selection, now: NaiveDateTime) -> Overview {
    let incoming = reconcile_kind(&data.incoming, selection);
    let completed = reconcile_kind(&data.completed, selection);
    let cancelled = reconcile_kind(&data.cancelled, selection);
    let route = route_summary(
        &incoming.projection,
        &completed.projection,
        &cancelled.projection,
        &data.leftover,
        selection,
    );
    let pending = apply(&data.leftover, selection, true);
    let aging = aging_summary(&pending, now);
    debug!(
        "Overview {}..{}: route balance {} (load {}, throughput {})",
        selection.start(),
        selection.end(),
        route.balance,
        route.load,
        route.throughput
    );
    Overview {
        start: selection.start(),
        end: selection.end(),
        incoming,
        completed,
        cancelled,
        route,
        avg_leftover_age_days: aging.avg_age_days,
    }
}

pub fn kind_summary_rows(overview: &Overview) -> Vec<KindSummaryRow> {
    overview
        .kinds()
        .iter()
        .map(|k| KindSummaryRow {
            kind: k.kind.to_string(),
            realized: format_int(k.realized_total),
            projected: format_int(k.projected_total),
            adherence_pct: format_number(k.adherence_pct, 1),
            gap: format_number(k.gap as f64, 0),
        })
        .collect()
}

pub fn projection_rows(overview: &Overview) -> Vec<ProjectionRow> {
    overview
        .kinds()
        .iter()
        .flat_map(|k| {
            k.daily.iter().map(move |p| ProjectionRow {
                date: p.date.format("%d/%m/%Y").to_string(),
                weekday: p.date.format("%a").to_string(),
                kind: k.kind.to_string(),
                projected: p.projected,
                realized: p.realized,
            })
        })
        .collect()
}

/// Filtered sets used by the detail reports for one selection.
pub fn detail_sets(data: &Dataset, selection: &Selection) -> HashMap<RecordKind, RecordSet> {
    RecordKind::ALL
        .iter()
        .map(|kind| {
            let ignore_date = *kind == RecordKind::Leftover;
            (*kind, apply(data.get(*kind), selection, ignore_date))
        })
        .collect()
}
