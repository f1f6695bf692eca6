// Entry point and interactive CLI flow.
//
// - Option [1] finds and loads the newest export of each ticket kind.
// - Option [2] replaces the active selection (regions, categories, dates).
// - Option [3] projects, reconciles and writes the report files.
use anyhow::Result;
use chrono::{Local, NaiveDate};
use log::info;
use once_cell::sync::Lazy;
use ops_forecast::config::AppConfig;
use ops_forecast::filter::{apply, selection_options, Selection};
use ops_forecast::loader::{load_dataset, LoadCache};
use ops_forecast::reports::{
    aging_summary, breakdown, build_overview, city_action_plan, detail_sets, hourly_rows,
    kind_summary_rows, projection_rows, technician_efficiency, Attribute,
};
use ops_forecast::types::{Dataset, RecordKind, RecordSet};
use ops_forecast::{output, util};
use std::collections::HashMap;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

// Loaded bases and the active selection live here between menu actions.
// The selection is only ever replaced whole and passed by value into the core.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        config: AppConfig::default(),
        cache: LoadCache::new(AppConfig::default().cache_ttl_secs),
        data: None,
        selection: None,
    })
});

struct AppState {
    config: AppConfig,
    cache: LoadCache,
    data: Option<Dataset>,
    selection: Option<Selection>,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice: ")
}

/// Ask whether to return to the menu after generating reports.
fn prompt_back_to_menu() -> bool {
    loop {
        let resp = prompt("Back to Menu (Y/N): ").to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_date(input: &str, default: NaiveDate) -> Option<NaiveDate> {
    if input.trim().is_empty() {
        return Some(default);
    }
    util::parse_timestamp_safe(Some(input)).map(|ts| ts.date())
}

fn handle_load() {
    let mut guard = state();
    let st = &mut *guard;
    let now = Local::now().naive_local();
    match load_dataset(&st.config, &mut st.cache, now) {
        Ok((data, reports)) => {
            for (kind, path, report) in &reports {
                match path {
                    Some(p) => println!(
                        "{:<10} {} rows loaded, {} dropped (bad timestamp), {} unreadable  [{}]",
                        kind.label(),
                        util::format_int(report.loaded_rows),
                        util::format_int(report.dropped_timestamps),
                        util::format_int(report.parse_errors),
                        p.display()
                    ),
                    None => println!("{:<10} no source file found", kind.label()),
                }
            }
            println!();
            st.data = Some(data);
            st.selection = None;
        }
        Err(e) => eprintln!("Failed to load bases: {}\n", e),
    }
}

fn handle_filters() {
    let data = state().data.clone();
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the bases first (option 1).\n");
        return;
    };
    let options = selection_options(&data);
    println!("Regions: {}", options.regions.join(", "));
    println!(
        "Categories: {}",
        util::format_int(options.categories.len())
    );
    println!("Available dates: {} .. {}\n", options.min_date, options.max_date);

    let regions = parse_list(&prompt("Regions (comma separated, blank = all): "));
    let categories = parse_list(&prompt("Categories (comma separated, blank = all): "));
    let Some(start) = parse_date(&prompt("Start date (dd/mm/yyyy): "), options.min_date) else {
        println!("Invalid start date.\n");
        return;
    };
    let Some(end) = parse_date(&prompt("End date (dd/mm/yyyy): "), options.max_date) else {
        println!("Invalid end date.\n");
        return;
    };
    match Selection::new(regions, categories, start, end) {
        Ok(selection) => {
            info!("Selection replaced: {:?}", selection);
            state().selection = Some(selection);
            println!();
        }
        Err(e) => println!("{}\n", e),
    }
}

fn detail(sets: &HashMap<RecordKind, RecordSet>, kind: RecordKind) -> RecordSet {
    sets.get(&kind)
        .cloned()
        .unwrap_or_else(|| RecordSet::empty(kind))
}

fn handle_generate_reports() -> Result<()> {
    let (data, selection, config) = {
        let st = state();
        (st.data.clone(), st.selection.clone(), st.config.clone())
    };
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the bases first (option 1).\n");
        return Ok(());
    };
    let selection = selection.unwrap_or_else(|| selection_options(&data).default_selection());
    let now = Local::now().naive_local();
    let out_dir: PathBuf = config.output_dir.clone();
    let rows = config.preview_rows;

    println!(
        "Generating reports for {} .. {}...\n",
        selection.start(),
        selection.end()
    );

    let overview = build_overview(&data, &selection, now);
    let sets = detail_sets(&data, &selection);
    let pending = detail(&sets, RecordKind::Leftover);
    let completed = detail(&sets, RecordKind::Completed);

    let summary = kind_summary_rows(&overview);
    output::write_csv(&out_dir.join("kind_summary.csv"), &summary)?;
    output::preview_table("Realized vs Projection", None, &summary, rows);

    println!(
        "Initial route D+1: {} (load {} = projected incoming + {} leftovers, throughput {})\n",
        overview.route.balance,
        overview.route.load,
        overview.route.leftover_prior_day,
        overview.route.throughput
    );

    let daily = projection_rows(&overview);
    output::write_csv(&out_dir.join("daily_projection.csv"), &daily)?;
    output::preview_table("Daily Projection", Some("first rows"), &daily, rows);

    for (kind, reconciliation) in [
        (RecordKind::Incoming, &overview.incoming),
        (RecordKind::Completed, &overview.completed),
    ] {
        let history = apply(data.get(kind), &selection, true);
        let plan = city_action_plan(&history, &detail(&sets, kind), &reconciliation.projection);
        let file = format!("{}_action_plan.csv", kind.label().to_lowercase());
        output::write_csv(&out_dir.join(file), &plan)?;
        output::preview_table(
            &format!("Action Plan: {}", kind.label()),
            Some("cities furthest below projection"),
            &plan,
            rows,
        );
    }

    let aging = aging_summary(&pending, now);
    let buckets = aging.bucket_rows();
    output::write_csv(&out_dir.join("aging_buckets.csv"), &buckets)?;
    output::preview_table(
        "Queue Aging",
        Some(
            format!(
                "avg {} days, {}% overdue",
                util::format_number(aging.avg_age_days, 1),
                util::format_number(aging.overdue_pct, 1)
            )
            .as_str(),
        ),
        &buckets,
        buckets.len(),
    );

    let efficiency = technician_efficiency(&completed, &pending, config.technician_daily_target);
    output::write_csv(&out_dir.join("technician_efficiency.csv"), &efficiency.rows)?;
    output::preview_table(
        "Technician Efficiency",
        Some(
            format!(
                "occupancy {}% ({:?})",
                util::format_number(efficiency.occupancy_pct, 1),
                efficiency.status
            )
            .as_str(),
        ),
        &efficiency.rows,
        rows,
    );

    let hourly = hourly_rows(&completed);
    output::write_csv(&out_dir.join("hourly_profile.csv"), &hourly)?;

    let by_olt = breakdown(&detail(&sets, RecordKind::Incoming), Attribute::Olt);
    output::write_csv(&out_dir.join("incoming_by_olt.csv"), &by_olt)?;
    output::preview_table("Incoming by OLT", None, &by_olt, rows);

    let by_reason = breakdown(&detail(&sets, RecordKind::Cancelled), Attribute::Reason);
    output::write_csv(&out_dir.join("cancelled_by_reason.csv"), &by_reason)?;

    output::write_json(&out_dir.join("overview.json"), &overview)?;
    println!("(Full tables exported to {})\n", out_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    {
        let mut st = state();
        st.cache = LoadCache::new(config.cache_ttl_secs);
        st.config = config;
    }

    loop {
        println!("Field Operations Forecast:");
        println!("[1] Load the bases");
        println!("[2] Set filters");
        println!("[3] Generate reports");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => handle_filters(),
            "3" => {
                println!();
                if let Err(e) = handle_generate_reports() {
                    eprintln!("Report error: {}", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-3.\n"),
        }
    }
    Ok(())
}
