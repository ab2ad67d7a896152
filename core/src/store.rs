use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;

use log::{info, warn};

use crate::error::StoreError;
use crate::normalize::{ActivityRecord, ACTIVITY_FIELDS};

/// Oppretter mappa til filen hvis den mangler.
pub fn ensure_folder(path: &Path) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(path, e))?;
        }
    }
    Ok(())
}

/// Leser kun headerraden. `None` hvis filen mangler eller er uleselig.
pub fn read_csv_header(path: &Path) -> Option<Vec<String>> {
    if !path.is_file() {
        return None;
    }
    let mut reader = csv::Reader::from_path(path).ok()?;
    let headers = reader.headers().ok()?;
    Some(headers.iter().map(str::to_string).collect())
}

/// Migrerer en eksisterende CSV til kanonisk skjema, på plass:
/// les alle rader via det gamle headeret, skriv temp-fil med nytt header
/// (overlappende kolonner kopieres, nye blir tomme), atomisk rename.
/// Feil her er en advarsel, aldri fatalt – originalen røres ikke.
pub fn migrate_csv_to_schema(path: &Path, desired_fields: &[&str]) {
    let Some(header) = read_csv_header(path) else {
        return;
    };
    if header == desired_fields {
        return;
    }

    info!("CSV header differs from desired schema, migrating {} in place", path.display());

    let mut existing_rows: Vec<Vec<String>> = Vec::new();
    match csv::Reader::from_path(path) {
        Ok(mut reader) => {
            for rec in reader.records() {
                match rec {
                    Ok(r) => existing_rows.push(r.iter().map(str::to_string).collect()),
                    Err(e) => {
                        warn!("could not read existing CSV for migration: {e}");
                        return;
                    }
                }
            }
        }
        Err(e) => {
            warn!("could not read existing CSV for migration: {e}");
            return;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    let write = || -> Result<(), StoreError> {
        let mut writer =
            csv::Writer::from_path(&tmp_path).map_err(|e| StoreError::csv(&tmp_path, e))?;
        writer
            .write_record(desired_fields)
            .map_err(|e| StoreError::csv(&tmp_path, e))?;

        for row in &existing_rows {
            let out: Vec<&str> = desired_fields
                .iter()
                .map(|field| {
                    header
                        .iter()
                        .position(|h| h == field)
                        .and_then(|i| row.get(i))
                        .map(String::as_str)
                        .unwrap_or("")
                })
                .collect();
            writer
                .write_record(&out)
                .map_err(|e| StoreError::csv(&tmp_path, e))?;
        }
        writer.flush().map_err(|e| StoreError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))?;
        Ok(())
    };

    match write() {
        Ok(()) => info!("migration complete: {}", path.display()),
        Err(e) => {
            warn!("migration failed, keeping original file: {e}");
            let _ = std::fs::remove_file(&tmp_path);
        }
    }
}

/// Leser id-kolonnen fra eksisterende CSV. Uleselig fil gir tomt sett,
/// dedupliseringen håndheves av calleren mot dette settet.
pub fn load_existing_activity_ids(path: &Path) -> HashSet<String> {
    let mut ids = HashSet::new();
    if !path.is_file() {
        return ids;
    }

    let Ok(mut reader) = csv::Reader::from_path(path) else {
        return ids;
    };
    let Some(id_col) = reader
        .headers()
        .ok()
        .and_then(|h| h.iter().position(|c| c == "activity_id"))
    else {
        return ids;
    };

    for rec in reader.records().flatten() {
        if let Some(aid) = rec.get(id_col) {
            if !aid.is_empty() {
                ids.insert(aid.to_string());
            }
        }
    }
    ids
}

/// Append-only skriving av nye aktivitetsrader, sortert på (date, time).
/// Header skrives kun når filen ikke fantes fra før.
pub fn append_activity_rows(path: &Path, rows: &mut [ActivityRecord]) -> Result<(), StoreError> {
    rows.sort_by(|a, b| (a.date.as_str(), a.time.as_str()).cmp(&(b.date.as_str(), b.time.as_str())));

    let file_exists = path.is_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);

    if !file_exists {
        writer
            .write_record(ACTIVITY_FIELDS)
            .map_err(|e| StoreError::csv(path, e))?;
    }
    for row in rows.iter() {
        writer
            .write_record(row.csv_row())
            .map_err(|e| StoreError::csv(path, e))?;
    }
    writer.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Datoer som allerede finnes i en fil der første kolonne er dato.
pub fn load_existing_dates(path: &Path) -> HashSet<String> {
    let mut dates = HashSet::new();
    if !path.is_file() {
        return dates;
    }
    let Ok(mut reader) = csv::Reader::from_path(path) else {
        return dates;
    };
    for rec in reader.records().flatten() {
        if let Some(d) = rec.get(0) {
            if !d.is_empty() {
                dates.insert(d.to_string());
            }
        }
    }
    dates
}

/// Upsert per dato for wellness-filen: les alle rader, dropp rader med
/// samme dato, legg til den nye, sorter på dato og skriv hele filen på
/// nytt. O(filstørrelse) per kall – wellness er én rad per dag, så filen
/// forblir liten.
pub fn replace_or_append(
    path: &Path,
    headers: &[&str],
    date_key: &str,
    new_row: Vec<String>,
) -> Result<(), StoreError> {
    let mut rows: Vec<Vec<String>> = Vec::new();

    if path.is_file() {
        let mut reader = csv::Reader::from_path(path).map_err(|e| StoreError::csv(path, e))?;
        for rec in reader.records() {
            let rec = rec.map_err(|e| StoreError::csv(path, e))?;
            let row: Vec<String> = rec.iter().map(str::to_string).collect();
            if row.first().map(String::as_str) != Some(date_key) {
                rows.push(row);
            }
        }
    }

    rows.push(new_row);
    rows.sort_by(|a, b| a.first().cmp(&b.first()));

    let mut writer = csv::Writer::from_path(path).map_err(|e| StoreError::csv(path, e))?;
    writer
        .write_record(headers)
        .map_err(|e| StoreError::csv(path, e))?;
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|e| StoreError::csv(path, e))?;
    }
    writer.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Append av én wellness-rad (history-løypa). Header skrives ved behov.
pub fn append_row(path: &Path, headers: &[&str], row: Vec<String>) -> Result<(), StoreError> {
    let file_exists = path.is_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    if !file_exists {
        writer
            .write_record(headers)
            .map_err(|e| StoreError::csv(path, e))?;
    }
    writer
        .write_record(&row)
        .map_err(|e| StoreError::csv(path, e))?;
    writer.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
