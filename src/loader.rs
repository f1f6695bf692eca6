use crate::config::AppConfig;
use crate::error::Result;
use crate::types::{Dataset, RawRow, RecordKind, RecordSet, TicketEvent, NOT_INFORMED};
use crate::util::{clean_text, parse_timestamp_safe};
use chrono::{Duration, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub dropped_timestamps: usize,
    pub sentinel_filled: usize,
}

/// Newest `*.csv` in `dir` whose file name starts with `prefix`.
pub fn locate_latest(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(prefix) && name.to_lowercase().ends_with(".csv")
        })
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((modified, e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

pub fn load_records<P: AsRef<Path>>(
    path: P,
    kind: RecordKind,
    delimiter: u8,
) -> Result<(RecordSet, LoadReport)> {
    let path = path.as_ref();
    debug!("Reading {} records from {}", kind, path.display());
    let file = fs::File::open(path)?;
    load_records_from_reader(file, kind, delimiter)
}

/// Map one export into the canonical schema.
///
/// Headers are trimmed and lower-cased first so the column mapping in
/// `RawRow` is applied exactly once, here.
pub fn load_records_from_reader<R: io::Read>(
    reader: R,
    kind: RecordKind,
    delimiter: u8,
) -> Result<(RecordSet, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers: StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();
    rdr.set_headers(headers);

    let mut report = LoadReport::default();
    let mut events = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        match to_event(row, kind, &mut report) {
            Some(event) => events.push(event),
            None => report.dropped_timestamps += 1,
        }
    }

    report.loaded_rows = events.len();
    if report.dropped_timestamps > 0 {
        warn!(
            "{}: dropped {} rows with unparseable timestamps",
            kind, report.dropped_timestamps
        );
    }
    Ok((RecordSet::new(kind, events), report))
}

fn to_event(row: RawRow, kind: RecordKind, report: &mut LoadReport) -> Option<TicketEvent> {
    let stamp = match kind {
        RecordKind::Incoming | RecordKind::Leftover => row.created_at.as_deref(),
        RecordKind::Completed | RecordKind::Cancelled => row.closed_at.as_deref(),
    };
    let occurred_at = parse_timestamp_safe(stamp)?;

    let region = clean_text(row.region.as_deref());
    let category = clean_text(row.description.as_deref());
    if region.is_none() || category.is_none() {
        report.sentinel_filled += 1;
    }

    let reason = match kind {
        RecordKind::Incoming => row.reason,
        RecordKind::Completed => row.closure_reason,
        RecordKind::Cancelled => row.cancel_reason,
        RecordKind::Leftover => row.pending_reason,
    };
    let sector = match kind {
        RecordKind::Cancelled => row.cancel_sector,
        _ => None,
    };

    Some(TicketEvent {
        occurred_at,
        region: region.unwrap_or_else(|| NOT_INFORMED.to_string()),
        category: category.unwrap_or_else(|| NOT_INFORMED.to_string()),
        city: clean_text(row.city.as_deref()),
        protocol: clean_text(row.protocol.as_deref()),
        technician: clean_text(row.technician.as_deref()),
        olt: clean_text(row.olt.as_deref()),
        reason: clean_text(reason.as_deref()),
        sector: clean_text(sector.as_deref()),
    })
}

struct CacheEntry {
    loaded_at: NaiveDateTime,
    records: RecordSet,
    report: LoadReport,
}

/// Loaded record sets keyed by source file and kind, reused while fresh.
pub struct LoadCache {
    ttl: Duration,
    entries: HashMap<(PathBuf, RecordKind), CacheEntry>,
}

impl LoadCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.min(u32::MAX as u64) as i64),
            entries: HashMap::new(),
        }
    }

    pub fn is_fresh(&self, path: &Path, kind: RecordKind, now: NaiveDateTime) -> bool {
        self.entries
            .get(&(path.to_path_buf(), kind))
            .map(|e| now - e.loaded_at < self.ttl)
            .unwrap_or(false)
    }

    pub fn get_or_load(
        &mut self,
        path: &Path,
        kind: RecordKind,
        delimiter: u8,
        now: NaiveDateTime,
    ) -> Result<(RecordSet, LoadReport)> {
        let key = (path.to_path_buf(), kind);
        if self.is_fresh(path, kind, now) {
            if let Some(entry) = self.entries.get(&key) {
                debug!("Cache hit for {} ({})", path.display(), kind);
                return Ok((entry.records.clone(), entry.report.clone()));
            }
        }
        let (records, report) = load_records(path, kind, delimiter)?;
        self.entries.insert(
            key,
            CacheEntry {
                loaded_at: now,
                records: records.clone(),
                report: report.clone(),
            },
        );
        Ok((records, report))
    }
}

/// Find and load the newest export of every kind.
///
/// A kind with no source file becomes an empty record set.
pub fn load_dataset(
    config: &AppConfig,
    cache: &mut LoadCache,
    now: NaiveDateTime,
) -> Result<(Dataset, Vec<(RecordKind, Option<PathBuf>, LoadReport)>)> {
    let mut dataset = Dataset::default();
    let mut reports = Vec::new();
    for kind in RecordKind::ALL {
        let prefix = config.prefixes.for_kind(kind);
        match locate_latest(&config.data_dir, prefix) {
            Some(path) => {
                let (records, report) =
                    cache.get_or_load(&path, kind, config.delimiter_byte(), now)?;
                info!(
                    "{}: {} of {} rows loaded from {}",
                    kind,
                    report.loaded_rows,
                    report.total_rows,
                    path.display()
                );
                dataset.set(records);
                reports.push((kind, Some(path), report));
            }
            None => {
                warn!(
                    "{}: no file starting with '{}' in {}",
                    kind,
                    prefix,
                    config.data_dir.display()
                );
                reports.push((kind, None, LoadReport::default()));
            }
        }
    }
    Ok((dataset, reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const INCOMING: &str = "\u{feff}Created_At;Descrição;Regional;Cidade;OLT;Nome do Técnico\n\
        01/02/2026 08:30:00;Reparo de Fibra;Sumaré;Sumaré;OLT-ZTE-1;Ana Souza\n\
        not a date;Reparo de Fibra;Sumaré;Sumaré;OLT-ZTE-1;Ana Souza\n\
        02/02/2026 10:00:00;;  ;Campinas;;\n";

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn maps_headers_and_fills_sentinels() {
        let (set, report) =
            load_records_from_reader(INCOMING.as_bytes(), RecordKind::Incoming, b';').unwrap();
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(report.dropped_timestamps, 1);
        assert_eq!(report.sentinel_filled, 1);

        let first = &set.events[0];
        assert_eq!(first.region, "Sumaré");
        assert_eq!(first.category, "Reparo de Fibra");
        assert_eq!(first.olt.as_deref(), Some("OLT-ZTE-1"));
        assert_eq!(first.technician.as_deref(), Some("Ana Souza"));
        assert_eq!(first.occurred_at.date(), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());

        let second = &set.events[1];
        assert_eq!(second.region, NOT_INFORMED);
        assert_eq!(second.category, NOT_INFORMED);
        assert_eq!(second.city.as_deref(), Some("Campinas"));
        assert!(second.olt.is_none());
    }

    #[test]
    fn closed_kinds_use_closure_timestamp() {
        let data = "created_at;data_encerramento_prot;regional;descrição;motivo do cancelamento;setor que cancelou\n\
            01/02/2026 08:00:00;03/02/2026 09:15:00;Campinas;Suporte Wi-Fi;Cliente desistiu;Comercial\n";
        let (set, _) =
            load_records_from_reader(data.as_bytes(), RecordKind::Cancelled, b';').unwrap();
        assert_eq!(set.events[0].occurred_at, at(2026, 2, 3, 9) + Duration::minutes(15));
        assert_eq!(set.events[0].reason.as_deref(), Some("Cliente desistiu"));
        assert_eq!(set.events[0].sector.as_deref(), Some("Comercial"));
    }

    #[test]
    fn missing_timestamp_column_drops_every_row() {
        let data = "regional;descrição\nCampinas;Suporte Wi-Fi\n";
        let (set, report) =
            load_records_from_reader(data.as_bytes(), RecordKind::Completed, b';').unwrap();
        assert!(set.is_empty());
        assert_eq!(report.dropped_timestamps, 1);
    }

    #[test]
    fn locate_latest_picks_newest_matching_csv() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("salesforce_finalizados_2026_01.csv");
        let new = dir.path().join("salesforce_finalizados_2026_02.csv");
        fs::write(&old, "x\n").unwrap();
        fs::write(dir.path().join("salesforce_finalizados_notes.txt"), "x").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&new, "x\n").unwrap();

        assert_eq!(locate_latest(dir.path(), "salesforce_finalizados"), Some(new));
        assert_eq!(locate_latest(dir.path(), "salesforce_cancelados"), None);
    }

    #[test]
    fn cache_reuses_entries_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entrantes.csv");
        fs::write(&path, INCOMING).unwrap();

        let mut cache = LoadCache::new(3600);
        let t0 = at(2026, 2, 3, 8);
        let (first, _) = cache.get_or_load(&path, RecordKind::Incoming, b';', t0).unwrap();
        assert_eq!(first.len(), 2);

        // Rewriting the file is invisible while the entry is fresh.
        fs::write(&path, "created_at;regional\n").unwrap();
        let (cached, _) = cache
            .get_or_load(&path, RecordKind::Incoming, b';', t0 + Duration::minutes(59))
            .unwrap();
        assert_eq!(cached.len(), 2);

        let (reloaded, _) = cache
            .get_or_load(&path, RecordKind::Incoming, b';', t0 + Duration::hours(1))
            .unwrap();
        assert!(reloaded.is_empty());
        assert!(cache.is_fresh(&path, RecordKind::Incoming, t0 + Duration::minutes(90)));
    }
}
