//! Global selection and the filter applied to every record set.

use chrono::{Local, NaiveDate};
use std::collections::{BTreeSet, HashSet};

use crate::error::{ForecastError, Result};
use crate::types::{Dataset, RecordSet, ALL_MARKER};
use crate::util::label_key;

/// Pass-through markers accepted in region and category lists.
const ALL_ALIASES: &[&str] = &[ALL_MARKER, "todos"];

/// Option labels hidden from the region list.
const HIDDEN_REGION: &str = "CENTRO-OESTE";

/// Option labels hidden from the category list.
const HIDDEN_CATEGORY: &str = "RETIRADA DE EQUIPAMENTO";

/// The active global filter. Replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    regions: Vec<String>,
    categories: Vec<String>,
    start: NaiveDate,
    end: NaiveDate,
}

impl Selection {
    pub fn new(
        regions: Vec<String>,
        categories: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        if start > end {
            return Err(ForecastError::InvalidSelection(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self {
            regions,
            categories,
            start,
            end,
        })
    }

    /// No categorical restriction over `[start, end]`.
    pub fn all(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(Vec::new(), Vec::new(), start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Normalized allow-list, or `None` when the predicate is disabled.
fn allowed_keys(values: &[String]) -> Option<HashSet<String>> {
    if values.is_empty() {
        return None;
    }
    let keys: HashSet<String> = values.iter().map(|v| label_key(v)).collect();
    let disabled = ALL_ALIASES
        .iter()
        .any(|marker| keys.contains(&label_key(marker)));
    if disabled {
        None
    } else {
        Some(keys)
    }
}

/// Filter a record set by region, category and (unless `ignore_date`) the
/// selection's inclusive date interval. The input is never modified.
pub fn apply(records: &RecordSet, selection: &Selection, ignore_date: bool) -> RecordSet {
    if records.is_empty() {
        return records.clone();
    }
    let regions = allowed_keys(&selection.regions);
    let categories = allowed_keys(&selection.categories);

    let events = records
        .iter()
        .filter(|e| {
            regions
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&label_key(&e.region)))
        })
        .filter(|e| {
            categories
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&label_key(&e.category)))
        })
        .filter(|e| ignore_date || selection.contains_date(e.date()))
        .cloned()
        .collect();
    RecordSet::new(records.kind, events)
}

/// Choices offered to the user when building a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOptions {
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

impl SelectionOptions {
    /// Default selection: everything over the whole observed span.
    pub fn default_selection(&self) -> Selection {
        Selection {
            regions: Vec::new(),
            categories: Vec::new(),
            start: self.min_date,
            end: self.max_date,
        }
    }
}

pub fn selection_options(data: &Dataset) -> SelectionOptions {
    selection_options_at(data, Local::now().date_naive())
}

/// Distinct labels from the incoming, completed and cancelled sets, and the
/// date span of incoming plus completed (`today..today` when both are empty).
pub fn selection_options_at(data: &Dataset, today: NaiveDate) -> SelectionOptions {
    let sources = [&data.incoming, &data.completed, &data.cancelled];

    let regions: BTreeSet<String> = sources
        .iter()
        .flat_map(|set| set.iter())
        .map(|e| e.region.clone())
        .filter(|r| !label_key(r).contains(HIDDEN_REGION))
        .collect();
    let categories: BTreeSet<String> = sources
        .iter()
        .flat_map(|set| set.iter())
        .map(|e| e.category.clone())
        .filter(|c| !label_key(c).contains(HIDDEN_CATEGORY))
        .collect();

    let dates = data
        .incoming
        .iter()
        .chain(data.completed.iter())
        .map(|e| e.date());
    let (min_date, max_date) = dates.fold(None, |acc: Option<(NaiveDate, NaiveDate)>, d| {
        Some(match acc {
            Some((lo, hi)) => (lo.min(d), hi.max(d)),
            None => (d, d),
        })
    })
    .unwrap_or((today, today));

    SelectionOptions {
        regions: regions.into_iter().collect(),
        categories: categories.into_iter().collect(),
        min_date,
        max_date,
    }
}
