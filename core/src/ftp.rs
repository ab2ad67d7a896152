use std::time::Duration;

use chrono::NaiveDate;

use crate::normalize::{activity_type_key, coerce_activity_id, extract_best_20m_power_w};
use crate::scan::{extract_ftp_watts_strict, FTP_MAX_W, FTP_MIN_W};
use crate::source::ActivitySource;

/// Hvor FTP-verdien kom fra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpSource {
    GarminSettings,
    VirtualRideBest20m,
    Missing,
}

impl FtpSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpSource::GarminSettings => "garmin_settings",
            FtpSource::VirtualRideBest20m => "virtual_ride_best_20m",
            FtpSource::Missing => "missing",
        }
    }
}

/// Resultatet deles read-only av alle aktiviteter i samme kjøring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FtpResult {
    pub ftp_watts: Option<f64>,
    pub source: FtpSource,
    pub best_20m_watts: Option<f64>,
}

impl FtpResult {
    pub fn missing() -> Self {
        Self {
            ftp_watts: None,
            source: FtpSource::Missing,
            best_20m_watts: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FtpConfig {
    pub lookback_days: i64,
    pub detail_sleep: Duration,
    /// Øvre grense for detaljhentinger i fallback-tieren,
    /// holder antall eksterne kall begrenset.
    pub max_checked: usize,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            detail_sleep: Duration::from_millis(100),
            max_checked: 60,
        }
    }
}

/// Innendørs-/virtuelle typer som kan ha et brukbart 20-minutterssnitt.
const VIRTUAL_TYPES: [&str; 3] = ["virtual_ride", "indoor_cycling", "spinning"];

fn plausible(x: f64) -> bool {
    (FTP_MIN_W..=FTP_MAX_W).contains(&x)
}

/// Tier 1: autoritativ innstilling fra Garmin, strengt ekstrahert.
fn ftp_from_settings(src: &dyn ActivitySource) -> Option<f64> {
    let data = src.ftp_setting().ok()?;
    extract_ftp_watts_strict(&data)
}

/// Tier 2: beste 20-minutterssnitt fra nylige virtuelle turer,
/// FTP estimeres som 95 % av det.
fn ftp_from_virtual_rides(src: &dyn ActivitySource, today: NaiveDate, cfg: &FtpConfig) -> FtpResult {
    let start = today - chrono::Duration::days(cfg.lookback_days);

    let activities = src
        .activities_by_date(start, today, Some(""))
        .or_else(|_| src.activities_by_date(start, today, None))
        .unwrap_or_default();

    if activities.is_empty() {
        return FtpResult::missing();
    }

    let mut best_20m: Option<f64> = None;
    let mut checked = 0usize;

    for act in &activities {
        let tkey = activity_type_key(act);
        if !VIRTUAL_TYPES.contains(&tkey.as_str()) {
            continue;
        }
        let Some(act_id) = coerce_activity_id(act) else {
            continue;
        };

        if let Ok(detail) = src.activity_detail(&act_id) {
            if let Some(v) = extract_best_20m_power_w(&detail) {
                if best_20m.map_or(true, |b| v > b) {
                    best_20m = Some(v);
                }
            }
        }

        checked += 1;
        if !cfg.detail_sleep.is_zero() {
            std::thread::sleep(cfg.detail_sleep);
        }
        if checked >= cfg.max_checked {
            break;
        }
    }

    let Some(best) = best_20m else {
        return FtpResult::missing();
    };

    let ftp_est = 0.95 * best;
    if !plausible(ftp_est) {
        return FtpResult::missing();
    }

    FtpResult {
        ftp_watts: Some(ftp_est),
        source: FtpSource::VirtualRideBest20m,
        best_20m_watts: Some(best),
    }
}

/// Garmin-innstilling først, deretter virtual ride-fallback.
/// Kalles én gang per kjøring; feil fra kilden er alltid
/// "denne tieren ga ingenting", aldri en propagert feil.
pub fn resolve_ftp(src: &dyn ActivitySource, today: NaiveDate, cfg: &FtpConfig) -> FtpResult {
    if let Some(ftp) = ftp_from_settings(src) {
        return FtpResult {
            ftp_watts: Some(ftp),
            source: FtpSource::GarminSettings,
            best_20m_watts: None,
        };
    }

    ftp_from_virtual_rides(src, today, cfg)
}
