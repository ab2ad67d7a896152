use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::filter::normalize_type;
use crate::ftp::FtpResult;
use crate::metrics::{format_pace_min_mile, intensity_factor, tss};
use crate::scan::{positive_f64, scan_for_keys};

/// Kanonisk feltliste for aktivitets-CSVen, i fast rekkefølge.
pub const ACTIVITY_FIELDS: [&str; 27] = [
    "activity_id",
    "date",
    "time",
    "start_time_local",
    "title",
    "activity_type",
    "distance_m",
    "duration_s",
    "calories",
    "avg_speed_mps",
    "max_speed_mps",
    "avg_pace_min_mile",
    "avg_hr",
    "max_hr",
    "running_cadence_spm",
    "cycling_cadence_rpm",
    "avg_power_w",
    "max_power_w",
    "elevation_gain_m",
    "aerobic_te",
    "anaerobic_te",
    "best_20m_watts",
    "ftp_watts",
    "ftp_source",
    "normalized_power_w",
    "intensity_factor",
    "tss",
];

/// Garmin-typenøkler vi behandler som sykling ved detaljhenting.
pub static CYCLING_TYPE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "cycling",
        "road_cycling",
        "gravel_cycling",
        "mountain_biking",
        "indoor_cycling",
        "virtual_ride",
        "spinning",
    ])
});

/// Én rad per aktivitet, nøkkel = activity_id. Skapes én gang når
/// aktiviteten først observeres, aldri oppdatert i ettertid.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub date: String,
    pub time: String,
    pub start_time_local: String,
    pub title: String,
    pub activity_type: String,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
    pub calories: Option<f64>,
    pub avg_speed_mps: Option<f64>,
    pub max_speed_mps: Option<f64>,
    pub avg_pace_min_mile: Option<String>,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub running_cadence_spm: Option<f64>,
    pub cycling_cadence_rpm: Option<f64>,
    pub avg_power_w: Option<f64>,
    pub max_power_w: Option<f64>,
    pub elevation_gain_m: Option<f64>,
    pub aerobic_te: Option<f64>,
    pub anaerobic_te: Option<f64>,
    pub best_20m_watts: Option<f64>,
    pub ftp_watts: Option<f64>,
    pub ftp_source: String,
    pub normalized_power_w: Option<f64>,
    pub intensity_factor: Option<f64>,
    pub tss: Option<f64>,
}

fn cell_f64(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

impl ActivityRecord {
    /// CSV-celler i samme rekkefølge som `ACTIVITY_FIELDS`.
    /// Manglende verdier blir tomme celler, aldri utelatte.
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            self.activity_id.clone(),
            self.date.clone(),
            self.time.clone(),
            self.start_time_local.clone(),
            self.title.clone(),
            self.activity_type.clone(),
            cell_f64(self.distance_m),
            cell_f64(self.duration_s),
            cell_f64(self.calories),
            cell_f64(self.avg_speed_mps),
            cell_f64(self.max_speed_mps),
            self.avg_pace_min_mile.clone().unwrap_or_default(),
            cell_f64(self.avg_hr),
            cell_f64(self.max_hr),
            cell_f64(self.running_cadence_spm),
            cell_f64(self.cycling_cadence_rpm),
            cell_f64(self.avg_power_w),
            cell_f64(self.max_power_w),
            cell_f64(self.elevation_gain_m),
            cell_f64(self.aerobic_te),
            cell_f64(self.anaerobic_te),
            cell_f64(self.best_20m_watts),
            cell_f64(self.ftp_watts),
            self.ftp_source.clone(),
            cell_f64(self.normalized_power_w),
            cell_f64(self.intensity_factor),
            cell_f64(self.tss),
        ]
    }
}

/// Første ikke-tomme av activityId / activity_id / id, tvunget til streng.
pub fn coerce_activity_id(act: &Value) -> Option<String> {
    for key in ["activityId", "activity_id", "id"] {
        match act.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Aktivitetstype: foretrekk strukturert activityType.{typeKey|typeName},
/// ellers flate strengfelt. Normalisert (lowercase, underscore).
pub fn activity_type_key(act: &Value) -> String {
    if let Some(t) = act.get("activityType") {
        if t.is_object() {
            let s = t
                .get("typeKey")
                .or_else(|| t.get("typeName"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            return normalize_type(s);
        }
    }
    let s = act
        .get("activityType")
        .or_else(|| act.get("activityTypeName"))
        .or_else(|| act.get("activity_type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    normalize_type(s)
}

fn field_f64(act: &Value, key: &str) -> Option<f64> {
    act.get(key).and_then(positive_f64)
}

/// Garmin-felt av typen "max avg power (20 mins)". Nøkkelnavn varierer,
/// så vi scanner etter hint.
pub fn extract_best_20m_power_w(detail: &Value) -> Option<f64> {
    scan_for_keys(
        detail,
        &[
            "20min",
            "20_min",
            "20-min",
            "maxavgpower",
            "max_avg_power",
            "maxaveragepower",
            "best20",
            "best_20",
        ],
    )
}

pub fn extract_normalized_power_w(detail: &Value) -> Option<f64> {
    scan_for_keys(
        detail,
        &["normalizedpower", "weightedmeanpower", "weighted_power"],
    )
}

/// Bygger den kanoniske raden fra rå aktivitet + valgfri detaljpayload.
/// Deterministisk og ren gitt input; detaljfeltene fylles kun når
/// calleren faktisk hentet detaljer (syklingsfamilien).
pub fn to_record(act: &Value, detail: Option<&Value>, ftp: &FtpResult) -> ActivityRecord {
    let start_local = act
        .get("startTimeLocal")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // "YYYY-MM-DD HH:MM:SS" -> dato og klokkeslett
    let date = start_local.get(..10).unwrap_or("").to_string();
    let time = start_local.get(11..).unwrap_or("").to_string();

    let activity_id = coerce_activity_id(act).unwrap_or_default();
    let activity_type = activity_type_key(act);
    let title = act
        .get("activityName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let distance_m = field_f64(act, "distance");
    let duration_s = field_f64(act, "duration");
    let calories = field_f64(act, "calories");

    let avg_speed_mps = field_f64(act, "averageSpeed");
    let max_speed_mps = field_f64(act, "maxSpeed");

    let elevation_gain_m =
        field_f64(act, "totalElevationGain").or_else(|| field_f64(act, "elevationGain"));

    let avg_hr = field_f64(act, "averageHR");
    let max_hr = field_f64(act, "maxHR");

    let running_cadence_spm = field_f64(act, "averageRunningCadenceInStepsPerMinute");
    let cycling_cadence_rpm = field_f64(act, "averageCadence");

    let avg_power_w = field_f64(act, "averagePower");
    let max_power_w = field_f64(act, "maxPower");

    let aerobic_te = field_f64(act, "aerobicTrainingEffect");
    let anaerobic_te = field_f64(act, "anaerobicTrainingEffect");

    let avg_pace_min_mile = format_pace_min_mile(avg_speed_mps);

    let best_20m_watts = detail.and_then(extract_best_20m_power_w);
    let normalized_power_w = detail.and_then(extract_normalized_power_w);

    // IF og TSS bruker NP når den finnes, ellers snittwatt
    let np_or_avg = normalized_power_w.or(avg_power_w);
    let intensity = intensity_factor(np_or_avg, ftp.ftp_watts);
    let tss_val = tss(duration_s, np_or_avg, ftp.ftp_watts);

    ActivityRecord {
        activity_id,
        date,
        time,
        start_time_local: start_local,
        title,
        activity_type,
        distance_m,
        duration_s,
        calories,
        avg_speed_mps,
        max_speed_mps,
        avg_pace_min_mile,
        avg_hr,
        max_hr,
        running_cadence_spm,
        cycling_cadence_rpm,
        avg_power_w,
        max_power_w,
        elevation_gain_m,
        aerobic_te,
        anaerobic_te,
        best_20m_watts,
        ftp_watts: ftp.ftp_watts,
        ftp_source: ftp.source.as_str().to_string(),
        normalized_power_w,
        intensity_factor: intensity,
        tss: tss_val,
    }
}
