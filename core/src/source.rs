use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value;
use ureq::Agent;

use crate::error::FetchError;
use crate::normalize::coerce_activity_id;

/// Aktivitetsdata fra Garmin Connect (eller en fake i tester).
pub trait ActivitySource {
    /// `type_filter`: Some("") = bred henting, None = uten filterargument.
    /// Kilden må tåle at filterargumentet ikke støttes.
    fn activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        type_filter: Option<&str>,
    ) -> Result<Vec<Value>, FetchError>;

    fn activity_detail(&self, activity_id: &str) -> Result<Value, FetchError>;

    fn ftp_setting(&self) -> Result<Value, FetchError>;
}

/// Daglige wellness-payloads. Hvert kall kan feile uavhengig,
/// delvise data er greit.
pub trait WellnessSource {
    fn user_summary(&self, date: NaiveDate) -> Result<Value, FetchError>;
    fn sleep(&self, date: NaiveDate) -> Result<Value, FetchError>;
    fn body_composition(&self, date: NaiveDate) -> Result<Value, FetchError>;
    fn training_status(&self, date: NaiveDate) -> Result<Value, FetchError>;
    fn hrv(&self, date: NaiveDate) -> Result<Value, FetchError>;
}

const CONNECT_API: &str = "https://connectapi.garmin.com";

/// Garmin Connect-klient – enkel blocking-versjon (ureq).
/// Leser bearer-token fra lagret sesjonskatalog (garth-format).
pub struct GarminClient {
    agent: Agent,
    token: String,
}

impl GarminClient {
    /// Gjenopptar sesjonen fra `token_dir/oauth2_token.json`.
    /// Manglende eller uleselig sesjon er en fatal oppsettsfeil hos calleren.
    pub fn resume(token_dir: &Path) -> Result<Self, FetchError> {
        let token_file = token_dir.join("oauth2_token.json");
        let text = std::fs::read_to_string(&token_file)
            .map_err(|_| FetchError::Session(token_dir.to_path_buf()))?;
        let v: Value = serde_json::from_str(&text)
            .map_err(|_| FetchError::Session(token_dir.to_path_buf()))?;
        let token = v
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Session(PathBuf::from(token_dir)))?
            .to_string();

        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(30))
            .build();

        Ok(Self { agent, token })
    }

    fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{CONNECT_API}/{path}");
        let resp = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .call()?;
        let v: Value = resp
            .into_json()
            .map_err(|e| FetchError::Shape(e.to_string()))?;
        Ok(v)
    }
}

impl ActivitySource for GarminClient {
    fn activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        type_filter: Option<&str>,
    ) -> Result<Vec<Value>, FetchError> {
        let mut path = format!(
            "activitylist-service/activities/search/activities?startDate={start}&endDate={end}"
        );
        if let Some(t) = type_filter {
            if !t.is_empty() {
                path.push_str(&format!("&activityType={t}"));
            }
        }
        let v = self.get_json(&path)?;
        match v {
            Value::Array(items) => Ok(items),
            other => Err(FetchError::Shape(format!(
                "expected activity array, got {other}"
            ))),
        }
    }

    fn activity_detail(&self, activity_id: &str) -> Result<Value, FetchError> {
        self.get_json(&format!("activity-service/activity/{activity_id}"))
    }

    fn ftp_setting(&self) -> Result<Value, FetchError> {
        self.get_json("biometric-service/biometric/latestFunctionalThresholdPower/CYCLING")
    }
}

impl WellnessSource for GarminClient {
    fn user_summary(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(&format!(
            "usersummary-service/usersummary/daily?calendarDate={date}"
        ))
    }

    fn sleep(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(&format!(
            "wellness-service/wellness/dailySleepData?date={date}"
        ))
    }

    fn body_composition(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(&format!(
            "weight-service/weight/dateRange?startDate={date}&endDate={date}"
        ))
    }

    fn training_status(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(&format!(
            "metrics-service/metrics/trainingstatus/aggregated/{date}"
        ))
    }

    fn hrv(&self, date: NaiveDate) -> Result<Value, FetchError> {
        self.get_json(&format!("hrv-service/hrv/{date}"))
    }
}

/// Bred henting med fallback: prøv tomt typefilter, så uten filter,
/// så per vanlig type med dedup på id. Feil her betyr "ingen aktiviteter".
pub fn fetch_activities_broad(
    src: &dyn ActivitySource,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Value> {
    if let Ok(acts) = src.activities_by_date(start, end, Some("")) {
        return acts;
    }
    if let Ok(acts) = src.activities_by_date(start, end, None) {
        return acts;
    }

    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for t in ["running", "cycling", "indoor_cycling", "virtual_ride"] {
        let Ok(acts) = src.activities_by_date(start, end, Some(t)) else {
            continue;
        };
        for act in acts {
            let Some(aid) = coerce_activity_id(&act) else {
                continue;
            };
            if seen.insert(aid) {
                out.push(act);
            }
        }
    }
    out
}
