use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use log::{info, warn};

use crate::error::SetupError;
use crate::filter::{default_filter_path, load_activity_filter, ActivityFilter};
use crate::ftp::{resolve_ftp, FtpConfig, FtpResult};
use crate::metrics::{
    activities_written_total, detail_fetch_total, encode_text, skipped_dup_total,
    skipped_type_total, Metrics,
};
use crate::normalize::{
    activity_type_key, coerce_activity_id, to_record, ActivityRecord, ACTIVITY_FIELDS,
    CYCLING_TYPE_KEYS,
};
use crate::source::{fetch_activities_broad, ActivitySource, WellnessSource};
use crate::store;
use crate::wellness::{build_daily_wellness, WELLNESS_HEADERS};

pub const ACTIVITIES_CSV: &str = "garmin_activities.csv";
pub const WELLNESS_CSV: &str = "garmin_stats.csv";

fn env_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, SetupError> {
    match std::env::var(key) {
        Ok(s) => s.parse().map_err(|_| SetupError::Config { key, value: s }),
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &'static str, default: f64) -> Result<Duration, SetupError> {
    let secs: f64 = env_or(key, default)?;
    if !(0.0..=3600.0).contains(&secs) {
        return Err(SetupError::Config {
            key,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Kjøringskonfig fra miljøvariabler (samme overflate som .env-oppsettet
/// i Cloud Run: SAVE_PATH, GARTH_DIR, LOOKBACK_DAYS, ...).
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub save_path: PathBuf,
    pub token_dir: PathBuf,
    pub filter_path: PathBuf,
    pub lookback_days: i64,
    pub detail_sleep: Duration,
    pub ftp: FtpConfig,
    pub start_date: NaiveDate,
    pub chunk_days: i64,
    pub chunk_sleep: Duration,
    pub wellness_sleep: Duration,
    pub sync_dir: Option<PathBuf>,
}

impl JobConfig {
    pub fn from_env() -> Result<Self, SetupError> {
        let save_path = match std::env::var("SAVE_PATH") {
            Ok(p) if !p.is_empty() => PathBuf::from(p),
            _ => {
                println!("WARNING: SAVE_PATH not set. Using current folder.");
                PathBuf::from(".")
            }
        };

        let start_date: String = env_or("START_DATE", "2023-01-01".to_string())?;
        let start_date = NaiveDate::parse_from_str(&start_date, "%Y-%m-%d").map_err(|_| {
            SetupError::Config {
                key: "START_DATE",
                value: start_date,
            }
        })?;

        Ok(Self {
            save_path,
            token_dir: PathBuf::from(
                std::env::var("GARTH_DIR").unwrap_or_else(|_| ".garth".to_string()),
            ),
            filter_path: std::env::var("ACTIVITY_FILTER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_filter_path()),
            lookback_days: env_or("LOOKBACK_DAYS", 3)?,
            detail_sleep: env_secs("DETAIL_SLEEP_S", 0.15)?,
            ftp: FtpConfig {
                lookback_days: env_or("FTP_LOOKBACK_DAYS", 60)?,
                detail_sleep: env_secs("FTP_DETAIL_SLEEP_S", 0.10)?,
                max_checked: 60,
            },
            start_date,
            chunk_days: env_or("CHUNK_DAYS", 30)?,
            chunk_sleep: env_secs("SLEEP_BETWEEN_CHUNKS_S", 0.75)?,
            wellness_sleep: env_secs("WELLNESS_SLEEP_S", 1.0)?,
            sync_dir: std::env::var("SYNC_DIR").ok().map(PathBuf::from),
        })
    }

    pub fn activities_csv(&self) -> PathBuf {
        self.save_path.join(ACTIVITIES_CSV)
    }

    pub fn wellness_csv(&self) -> PathBuf {
        self.save_path.join(WELLNESS_CSV)
    }

    pub fn load_filter(&self) -> Result<ActivityFilter, SetupError> {
        load_activity_filter(&self.filter_path)
    }
}

/// Telling fra en aktivitetskjøring, for sluttrapport og tester.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub written: u64,
    pub skipped_dup: u64,
    pub skipped_type: u64,
}

/// Fellesløypa for én datobit: bred henting, hopp over manglende id /
/// duplikat / filtrert type, detaljhenting kun for syklingsfamilien,
/// bygg rader. Én dårlig aktivitet velter aldri hele kjøringen.
fn process_chunk(
    src: &dyn ActivitySource,
    filter: &ActivityFilter,
    ftp: &FtpResult,
    existing_ids: &mut HashSet<String>,
    cfg: &JobConfig,
    start: NaiveDate,
    end: NaiveDate,
    metrics: &Metrics,
    summary: &mut RunSummary,
) -> Vec<ActivityRecord> {
    let activities = fetch_activities_broad(src, start, end);

    let mut new_rows = Vec::new();
    for act in &activities {
        let Some(act_id) = coerce_activity_id(act) else {
            continue;
        };

        if existing_ids.contains(&act_id) {
            summary.skipped_dup += 1;
            skipped_dup_total(metrics).inc();
            continue;
        }

        let tkey = activity_type_key(act);
        if !filter.allows(Some(&tkey)) {
            summary.skipped_type += 1;
            skipped_type_total(metrics).inc();
            continue;
        }

        let needs_detail = CYCLING_TYPE_KEYS.contains(tkey.as_str());
        let detail = if needs_detail {
            detail_fetch_total(metrics).inc();
            let d = match src.activity_detail(&act_id) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("detail fetch failed for {act_id}: {e}");
                    None
                }
            };
            if !cfg.detail_sleep.is_zero() {
                std::thread::sleep(cfg.detail_sleep);
            }
            d
        } else {
            None
        };

        new_rows.push(to_record(act, detail.as_ref(), ftp));
        existing_ids.insert(act_id);
    }
    new_rows
}

/// Sluttlogging av kjøringstellerne, én linje per teller.
fn log_counters(metrics: &Metrics) {
    for line in encode_text(metrics).lines() {
        if !line.starts_with('#') && !line.is_empty() {
            info!("{line}");
        }
    }
}

/// Daglig aktivitetsjobb: trailing lookback-vindu i én bit.
pub fn run_activities_daily(
    src: &dyn ActivitySource,
    filter: &ActivityFilter,
    cfg: &JobConfig,
    today: NaiveDate,
) -> anyhow::Result<RunSummary> {
    let csv_path = cfg.activities_csv();
    store::ensure_folder(&csv_path)?;
    store::migrate_csv_to_schema(&csv_path, &ACTIVITY_FIELDS);

    let mut existing_ids = store::load_existing_activity_ids(&csv_path);
    let metrics = Metrics::new();

    // FTP løses én gang og deles av alle aktiviteter i kjøringen
    let ftp = resolve_ftp(src, today, &cfg.ftp);
    println!(
        "FTP resolved: {:?} source={} best_20m_used={:?}",
        ftp.ftp_watts,
        ftp.source.as_str(),
        ftp.best_20m_watts
    );

    let start = today - chrono::Duration::days(cfg.lookback_days);
    println!(
        "Checking activities from {start} to {today}, lookback={} days",
        cfg.lookback_days
    );
    println!("Writing to: {}", csv_path.display());

    let mut summary = RunSummary::default();
    let mut new_rows = process_chunk(
        src,
        filter,
        &ftp,
        &mut existing_ids,
        cfg,
        start,
        today,
        &metrics,
        &mut summary,
    );

    if new_rows.is_empty() {
        println!(
            "No new filtered activities. skipped_type={}, skipped_dup={}",
            summary.skipped_type, summary.skipped_dup
        );
        log_counters(&metrics);
        return Ok(summary);
    }

    store::append_activity_rows(&csv_path, &mut new_rows)
        .with_context(|| format!("append to {}", csv_path.display()))?;
    summary.written = new_rows.len() as u64;
    activities_written_total(&metrics).inc_by(summary.written);

    println!(
        "SUCCESS: Added {} new activities, skipped_type={}, skipped_dup={}",
        summary.written, summary.skipped_type, summary.skipped_dup
    );
    log_counters(&metrics);
    Ok(summary)
}

/// Backfill i biter på `chunk_days`, med pause mellom bitene.
pub fn run_activities_history(
    src: &dyn ActivitySource,
    filter: &ActivityFilter,
    cfg: &JobConfig,
    today: NaiveDate,
) -> anyhow::Result<RunSummary> {
    let csv_path = cfg.activities_csv();
    store::ensure_folder(&csv_path)?;
    store::migrate_csv_to_schema(&csv_path, &ACTIVITY_FIELDS);

    let mut existing_ids = store::load_existing_activity_ids(&csv_path);
    let metrics = Metrics::new();

    let ftp = resolve_ftp(src, today, &cfg.ftp);
    println!(
        "FTP resolved: {:?} source={} best_20m_used={:?}",
        ftp.ftp_watts,
        ftp.source.as_str(),
        ftp.best_20m_watts
    );

    println!(
        "Backfilling activities from {} to {today} in {}-day chunks",
        cfg.start_date, cfg.chunk_days
    );
    println!("Writing to: {}", csv_path.display());

    let mut summary = RunSummary::default();
    let mut current = cfg.start_date;

    while current <= today {
        let chunk_end = (current + chrono::Duration::days(cfg.chunk_days)).min(today);
        print!("Processing {current} to {chunk_end} ...");
        let _ = std::io::stdout().flush();

        let mut new_rows = process_chunk(
            src,
            filter,
            &ftp,
            &mut existing_ids,
            cfg,
            current,
            chunk_end,
            &metrics,
            &mut summary,
        );

        if new_rows.is_empty() {
            println!(" wrote 0.");
        } else {
            store::append_activity_rows(&csv_path, &mut new_rows)
                .with_context(|| format!("append to {}", csv_path.display()))?;
            summary.written += new_rows.len() as u64;
            activities_written_total(&metrics).inc_by(new_rows.len() as u64);
            println!(" wrote {}.", new_rows.len());
        }

        current = chunk_end + chrono::Duration::days(1);
        if !cfg.chunk_sleep.is_zero() {
            std::thread::sleep(cfg.chunk_sleep);
        }
    }

    println!("--- HISTORY PULL COMPLETE ---");
    println!("--- WROTE {} NEW ACTIVITIES ---", summary.written);
    println!(
        "--- SKIPPED DUPES {}, SKIPPED TYPE {} ---",
        summary.skipped_dup, summary.skipped_type
    );
    log_counters(&metrics);
    Ok(summary)
}

/// Daglig wellness: bygg dagens rad og upsert på dato.
pub fn run_wellness_daily<S>(
    src: &S,
    filter: &ActivityFilter,
    cfg: &JobConfig,
    today: NaiveDate,
) -> anyhow::Result<()>
where
    S: WellnessSource + ActivitySource,
{
    let csv_path = cfg.wellness_csv();
    store::ensure_folder(&csv_path)?;

    println!("Pulling wellness data for {today}...");
    let rec = build_daily_wellness(src, src, filter, today);

    store::replace_or_append(&csv_path, &WELLNESS_HEADERS, &rec.date, rec.csv_row())
        .with_context(|| format!("upsert {}", csv_path.display()))?;

    println!("SUCCESS: Saved data for {today} to {}", csv_path.display());
    Ok(())
}

/// Wellness-backfill: dag for dag, hopper over datoer som alt finnes,
/// gårsdagen er siste dag (dagens rad eies av daglig-jobben).
pub fn run_wellness_history<S>(
    src: &S,
    filter: &ActivityFilter,
    cfg: &JobConfig,
    today: NaiveDate,
) -> anyhow::Result<()>
where
    S: WellnessSource + ActivitySource,
{
    let csv_path = cfg.wellness_csv();
    store::ensure_folder(&csv_path)?;

    let existing_dates = store::load_existing_dates(&csv_path);
    let end = today - chrono::Duration::days(1);

    println!("--- STARTING HISTORY PULL ---");
    println!("From {} to {end}", cfg.start_date);

    let mut current = cfg.start_date;
    while current <= end {
        let day_str = current.to_string();
        if existing_dates.contains(&day_str) {
            println!("Processing {day_str}... skipped (already in CSV).");
            current += chrono::Duration::days(1);
            continue;
        }

        print!("Processing {day_str}...");
        let _ = std::io::stdout().flush();
        let rec = build_daily_wellness(src, src, filter, current);
        store::append_row(&csv_path, &WELLNESS_HEADERS, rec.csv_row())
            .with_context(|| format!("append to {}", csv_path.display()))?;
        println!(" done.");

        current += chrono::Duration::days(1);
        if !cfg.wellness_sleep.is_zero() {
            std::thread::sleep(cfg.wellness_sleep);
        }
    }

    println!("--- HISTORY PULL COMPLETE ---");
    Ok(())
}
