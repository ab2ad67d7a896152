use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SetupError;

/// Normaliser typeetikett: trim, lowercase, mellomrom -> underscore.
pub fn normalize_type(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "_")
}

/// Include/exclude-sett for aktivitetstyper, lastet én gang per kjøring.
/// Regel (default-deny): tom type -> nei; exclude-treff -> nei;
/// include-treff -> ja; alt annet -> nei.
#[derive(Debug, Clone)]
pub struct ActivityFilter {
    pub include_types: HashSet<String>,
    pub exclude_types: HashSet<String>,
}

impl ActivityFilter {
    pub fn new(
        include: impl IntoIterator<Item = String>,
        exclude: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            include_types: include.into_iter().map(|t| normalize_type(&t)).collect(),
            exclude_types: exclude.into_iter().map(|t| normalize_type(&t)).collect(),
        }
    }

    pub fn allows(&self, activity_type: Option<&str>) -> bool {
        let t = match activity_type {
            Some(t) if !t.trim().is_empty() => normalize_type(t),
            _ => return false,
        };
        if self.exclude_types.contains(&t) {
            return false;
        }
        self.include_types.contains(&t)
    }
}

// YAML-form: include er grupper (navn -> liste), exclude er flat liste.
//
//   include:
//     cardio: [running, cycling]
//     indoor: [indoor_cycling, virtual ride]
//   exclude:
//     - walking
#[derive(Debug, Deserialize, Default)]
struct FilterFile {
    #[serde(default)]
    include: BTreeMap<String, Option<Vec<String>>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
}

/// Leser activity_filters.yaml. Stien kan overstyres med
/// ACTIVITY_FILTER_PATH (brukes i Cloud Run).
pub fn load_activity_filter(path: &Path) -> Result<ActivityFilter, SetupError> {
    if !path.exists() {
        return Err(SetupError::FilterNotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|e| SetupError::FilterParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let de = serde_yaml::Deserializer::from_str(&text);
    let file: FilterFile =
        serde_path_to_error::deserialize(de).map_err(|e| SetupError::FilterParse {
            path: path.to_path_buf(),
            detail: format!("{} (at {})", e, e.path()),
        })?;

    let include = file
        .include
        .into_values()
        .flat_map(|types| types.unwrap_or_default());
    let exclude = file.exclude.unwrap_or_default();

    Ok(ActivityFilter::new(include, exclude))
}

/// Default-plassering ved siden av binæren/repo-roten.
pub fn default_filter_path() -> PathBuf {
    PathBuf::from("activity_filters.yaml")
}
