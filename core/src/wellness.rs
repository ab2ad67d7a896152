use chrono::NaiveDate;
use serde_json::Value;

use crate::filter::ActivityFilter;
use crate::normalize::activity_type_key;
use crate::scan::value_at;
use crate::source::{fetch_activities_broad, ActivitySource, WellnessSource};

/// Headerrad for wellness-CSVen, i fast rekkefølge.
pub const WELLNESS_HEADERS: [&str; 24] = [
    "Date",
    "Weight (lbs)",
    "Muscle Mass (lbs)",
    "Body Fat %",
    "Water %",
    "Sleep Total (hr)",
    "Sleep Deep (hr)",
    "Sleep REM (hr)",
    "Sleep Score",
    "RHR",
    "Min HR",
    "Max HR",
    "Avg Stress",
    "Respiration",
    "SpO2",
    "VO2 Max",
    "Training Status",
    "HRV Status",
    "HRV Avg",
    "Steps",
    "Step Goal",
    "Cals Total",
    "Cals Active",
    "Activities",
];

/// Én rad per kalenderdag, nøkkel = dato. I motsetning til
/// aktivitetsraden er den muterbar ved rekjøring: ny kjøring for samme
/// dato erstatter raden.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyWellnessRecord {
    pub date: String,
    pub weight_lbs: Option<f64>,
    pub muscle_mass_lbs: Option<f64>,
    pub body_fat_pct: Option<f64>,
    pub water_pct: Option<f64>,
    pub sleep_total_hr: Option<f64>,
    pub sleep_deep_hr: Option<f64>,
    pub sleep_rem_hr: Option<f64>,
    pub sleep_score: Option<f64>,
    pub rhr: Option<f64>,
    pub min_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub avg_stress: Option<f64>,
    pub respiration: Option<f64>,
    pub spo2: Option<f64>,
    pub vo2_max: Option<f64>,
    pub training_status: Option<String>,
    pub hrv_status: Option<String>,
    pub hrv_avg: Option<f64>,
    pub steps: Option<f64>,
    pub step_goal: Option<f64>,
    pub cals_total: Option<f64>,
    pub cals_active: Option<f64>,
    pub activities: String,
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

impl DailyWellnessRecord {
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            cell(self.weight_lbs),
            cell(self.muscle_mass_lbs),
            cell(self.body_fat_pct),
            cell(self.water_pct),
            cell(self.sleep_total_hr),
            cell(self.sleep_deep_hr),
            cell(self.sleep_rem_hr),
            cell(self.sleep_score),
            cell(self.rhr),
            cell(self.min_hr),
            cell(self.max_hr),
            cell(self.avg_stress),
            cell(self.respiration),
            cell(self.spo2),
            cell(self.vo2_max),
            self.training_status.clone().unwrap_or_default(),
            self.hrv_status.clone().unwrap_or_default(),
            cell(self.hrv_avg),
            cell(self.steps),
            cell(self.step_goal),
            cell(self.cals_total),
            cell(self.cals_active),
            self.activities.clone(),
        ]
    }
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

fn num_at(v: &Value, path: &[&str]) -> Option<f64> {
    value_at(v, path).and_then(Value::as_f64)
}

fn str_at(v: &Value, path: &[&str]) -> Option<String> {
    value_at(v, path).and_then(Value::as_str).map(str::to_string)
}

const GRAMS_PER_LB: f64 = 453.592;

/// Sammendragsstreng for dagens filtrerte aktiviteter:
/// "Navn (type_key); Navn (type_key)". Feil gir tom streng.
pub fn build_activity_summary(
    src: &dyn ActivitySource,
    day: NaiveDate,
    filter: &ActivityFilter,
) -> String {
    let acts = fetch_activities_broad(src, day, day);
    let names: Vec<String> = acts
        .iter()
        .filter_map(|act| {
            let tkey = activity_type_key(act);
            if !filter.allows(Some(&tkey)) {
                return None;
            }
            let name = act
                .get("activityName")
                .and_then(Value::as_str)
                .unwrap_or("Activity");
            Some(format!("{name} ({tkey})"))
        })
        .collect();
    names.join("; ")
}

/// Bygger dagens wellness-rad fra uavhengige kilder. Hvert kall kan
/// feile for seg – da blir bare de feltene stående tomme.
pub fn build_daily_wellness(
    wellness: &dyn WellnessSource,
    activities: &dyn ActivitySource,
    filter: &ActivityFilter,
    day: NaiveDate,
) -> DailyWellnessRecord {
    let mut rec = DailyWellnessRecord {
        date: day.to_string(),
        ..Default::default()
    };

    // 1) Biometri fra dagssammendraget
    if let Ok(summary) = wellness.user_summary(day) {
        rec.rhr = num_at(&summary, &["restingHeartRate"]);
        rec.min_hr = num_at(&summary, &["minHeartRate"]);
        rec.max_hr = num_at(&summary, &["maxHeartRate"]);
        rec.avg_stress = num_at(&summary, &["averageStressLevel"]);
        rec.steps = num_at(&summary, &["totalSteps"]);
        rec.vo2_max = num_at(&summary, &["vo2Max"]);
        rec.spo2 = num_at(&summary, &["averageSpO2"]);
        rec.respiration = num_at(&summary, &["averageRespirationValue"]);
        rec.cals_total = num_at(&summary, &["totalKilocalories"]);
        rec.cals_active = num_at(&summary, &["activeKilocalories"]);
        rec.step_goal = num_at(&summary, &["dailyStepGoal"]);
    }

    // 2) Søvn (sekunder -> timer)
    if let Ok(sleep) = wellness.sleep(day) {
        rec.sleep_total_hr =
            num_at(&sleep, &["dailySleepDTO", "sleepTimeSeconds"]).map(|s| round_to(s / 3600.0, 2));
        rec.sleep_deep_hr =
            num_at(&sleep, &["dailySleepDTO", "deepSleepSeconds"]).map(|s| round_to(s / 3600.0, 2));
        rec.sleep_rem_hr =
            num_at(&sleep, &["dailySleepDTO", "remSleepSeconds"]).map(|s| round_to(s / 3600.0, 2));
        rec.sleep_score = num_at(&sleep, &["dailySleepDTO", "sleepScores", "overall", "value"]);
    }

    // 3) Treningsstatus
    if let Ok(ts) = wellness.training_status(day) {
        rec.training_status = str_at(&ts, &["mostRecentTerminatedTrainingStatus", "status"]);
    }

    // 4) Kroppssammensetning (gram -> lbs)
    if let Ok(bc) = wellness.body_composition(day) {
        rec.weight_lbs =
            num_at(&bc, &["totalAverage", "weight"]).map(|g| round_to(g / GRAMS_PER_LB, 1));
        rec.muscle_mass_lbs =
            num_at(&bc, &["totalAverage", "muscleMass"]).map(|g| round_to(g / GRAMS_PER_LB, 1));
        rec.body_fat_pct = num_at(&bc, &["totalAverage", "bodyFat"]);
        rec.water_pct = num_at(&bc, &["totalAverage", "bodyWater"]);
    }

    // 5) HRV
    if let Ok(h) = wellness.hrv(day) {
        rec.hrv_status = str_at(&h, &["hrvSummary", "status"]);
        rec.hrv_avg = num_at(&h, &["hrvSummary", "weeklyAverage"]);
    }

    // 6) Dagens aktiviteter (filtrert)
    rec.activities = build_activity_summary(activities, day, filter);

    rec
}
