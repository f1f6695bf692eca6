use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Fill value for a missing region, category or technician.
pub const NOT_INFORMED: &str = "Not Informed";

/// Selection marker that disables a categorical predicate.
pub const ALL_MARKER: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Incoming,
    Completed,
    Cancelled,
    Leftover,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Incoming,
        RecordKind::Completed,
        RecordKind::Cancelled,
        RecordKind::Leftover,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Incoming => "Incoming",
            RecordKind::Completed => "Completed",
            RecordKind::Cancelled => "Cancelled",
            RecordKind::Leftover => "Leftover",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One source row after header normalization (trimmed, lower-cased).
///
/// Every column is optional: each export carries a different subset, and the
/// loader decides per kind which timestamp column is authoritative.
#[derive(Debug, Default, Deserialize)]
pub struct RawRow {
    #[serde(default, rename = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, rename = "data_encerramento_prot")]
    pub closed_at: Option<String>,
    #[serde(default, rename = "regional")]
    pub region: Option<String>,
    #[serde(default, rename = "cidade")]
    pub city: Option<String>,
    #[serde(default, rename = "descrição", alias = "descricao")]
    pub description: Option<String>,
    #[serde(default, rename = "protocolo")]
    pub protocol: Option<String>,
    #[serde(default, rename = "nome do técnico", alias = "nome do tecnico")]
    pub technician: Option<String>,
    #[serde(default, rename = "olt")]
    pub olt: Option<String>,
    #[serde(default, rename = "motivo")]
    pub reason: Option<String>,
    #[serde(default, rename = "motivo da conclusão", alias = "motivo da conclusao")]
    pub closure_reason: Option<String>,
    #[serde(default, rename = "motivo do cancelamento")]
    pub cancel_reason: Option<String>,
    #[serde(default, rename = "setor que cancelou")]
    pub cancel_sector: Option<String>,
    #[serde(default, rename = "motivo da pendência", alias = "motivo da pendencia")]
    pub pending_reason: Option<String>,
}

/// A canonical ticket event. `occurred_at` is the creation time for
/// incoming and leftover tickets, the closure time otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketEvent {
    pub occurred_at: NaiveDateTime,
    pub region: String,
    pub category: String,
    pub city: Option<String>,
    pub protocol: Option<String>,
    pub technician: Option<String>,
    pub olt: Option<String>,
    pub reason: Option<String>,
    pub sector: Option<String>,
}

impl TicketEvent {
    pub fn new(occurred_at: NaiveDateTime, region: &str, category: &str) -> Self {
        Self {
            occurred_at,
            region: region.to_string(),
            category: category.to_string(),
            city: None,
            protocol: None,
            technician: None,
            olt: None,
            reason: None,
            sector: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.occurred_at.date()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub kind: RecordKind,
    pub events: Vec<TicketEvent>,
}

impl RecordSet {
    pub fn new(kind: RecordKind, events: Vec<TicketEvent>) -> Self {
        Self { kind, events }
    }

    pub fn empty(kind: RecordKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TicketEvent> {
        self.events.iter()
    }
}

/// The four canonical record sets handed to the core.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub incoming: RecordSet,
    pub completed: RecordSet,
    pub cancelled: RecordSet,
    pub leftover: RecordSet,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            incoming: RecordSet::empty(RecordKind::Incoming),
            completed: RecordSet::empty(RecordKind::Completed),
            cancelled: RecordSet::empty(RecordKind::Cancelled),
            leftover: RecordSet::empty(RecordKind::Leftover),
        }
    }
}

impl Dataset {
    pub fn get(&self, kind: RecordKind) -> &RecordSet {
        match kind {
            RecordKind::Incoming => &self.incoming,
            RecordKind::Completed => &self.completed,
            RecordKind::Cancelled => &self.cancelled,
            RecordKind::Leftover => &self.leftover,
        }
    }

    pub fn set(&mut self, records: RecordSet) {
        match records.kind {
            RecordKind::Incoming => self.incoming = records,
            RecordKind::Completed => self.completed = records,
            RecordKind::Cancelled => self.cancelled = records,
            RecordKind::Leftover => self.leftover = records,
        }
    }
}

/// Per-date integer expectation over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyProjection {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub values: Vec<u64>,
    pub total: u64,
}

impl DailyProjection {
    pub fn new(start: NaiveDate, end: NaiveDate, values: Vec<u64>) -> Self {
        let total = values.iter().sum();
        Self {
            start,
            end,
            values,
            total,
        }
    }

    /// Value for the range end date, 0 for an empty sequence.
    pub fn last(&self) -> u64 {
        self.values.last().copied().unwrap_or(0)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.values.len())
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ProjectionRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Weekday")]
    #[tabled(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "Kind")]
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[serde(rename = "Projected")]
    #[tabled(rename = "Projected")]
    pub projected: u64,
    #[serde(rename = "Realized")]
    #[tabled(rename = "Realized")]
    pub realized: u64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KindSummaryRow {
    #[serde(rename = "Kind")]
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[serde(rename = "Realized")]
    #[tabled(rename = "Realized")]
    pub realized: String,
    #[serde(rename = "Projected")]
    #[tabled(rename = "Projected")]
    pub projected: String,
    #[serde(rename = "AdherencePct")]
    #[tabled(rename = "AdherencePct")]
    pub adherence_pct: String,
    #[serde(rename = "Gap")]
    #[tabled(rename = "Gap")]
    pub gap: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AgingBucketRow {
    #[serde(rename = "Bucket")]
    #[tabled(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Tickets")]
    #[tabled(rename = "Tickets")]
    pub tickets: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TechnicianRow {
    #[serde(rename = "Technician")]
    #[tabled(rename = "Technician")]
    pub technician: String,
    #[serde(rename = "Completed")]
    #[tabled(rename = "Completed")]
    pub completed: usize,
    #[serde(rename = "Pending")]
    #[tabled(rename = "Pending")]
    pub pending: usize,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
    #[serde(rename = "EfficiencyPct")]
    #[tabled(rename = "EfficiencyPct")]
    pub efficiency_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HourlyRow {
    #[serde(rename = "Hour")]
    #[tabled(rename = "Hour")]
    pub hour: String,
    #[serde(rename = "Volume")]
    #[tabled(rename = "Volume")]
    pub volume: usize,
    #[serde(rename = "Peak")]
    #[tabled(rename = "Peak")]
    pub peak: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BreakdownRow {
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "SharePct")]
    #[tabled(rename = "SharePct")]
    pub share_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CityActionRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "Realized")]
    #[tabled(rename = "Realized")]
    pub realized: u64,
    #[serde(rename = "Projected")]
    #[tabled(rename = "Projected")]
    pub projected: u64,
    #[serde(rename = "Gap")]
    #[tabled(rename = "Gap")]
    pub gap: i64,
    #[serde(rename = "AdherencePct")]
    #[tabled(rename = "AdherencePct")]
    pub adherence_pct: String,
}
