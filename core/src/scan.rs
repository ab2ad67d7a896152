use serde_json::Value;

/// Tolerant numerisk tvang: tall og tall-strenger godtas,
/// alt som ikke er positivt og endelig blir `None`.
/// I dette domenet er 0/negativ det samme som "mangler"
/// (distanse, varighet, watt osv. er aldri legitimt <= 0).
pub fn positive_f64(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if x.is_finite() && x > 0.0 {
        Some(x)
    } else {
        None
    }
}

/// Rekursivt dybde-først-søk etter numeriske verdier under nøkler
/// som inneholder et av hintene (lowercase substring-match).
/// Første treff vinner, i dokumentrekkefølge. Brukes for ikke-kritiske
/// felt der Garmin-payloaden varierer: best 20 min, normalized power, osv.
pub fn scan_for_keys(obj: &Value, key_hints: &[&str]) -> Option<f64> {
    match obj {
        Value::Object(map) => {
            for (k, v) in map {
                let kl = k.to_lowercase();
                if key_hints.iter().any(|h| kl.contains(h)) {
                    if let Some(val) = positive_f64(v) {
                        return Some(val);
                    }
                }
                if let Some(found) = scan_for_keys(v, key_hints) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(|it| scan_for_keys(it, key_hints)),
        _ => None,
    }
}

/// Normaliser nøkkel for streng matching: lowercase, kun alfanumerisk.
fn norm_key(k: &str) -> String {
    k.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

const FTP_KEYS: &[&str] = &[
    "functionalthresholdpower",
    "latestfunctionalthresholdpower",
    "thresholdpower",
    "ftp",
    "ftpwatts",
    "cyclingftp",
];

/// Fysisk plausibelt FTP-område i watt.
pub const FTP_MIN_W: f64 = 50.0;
pub const FTP_MAX_W: f64 = 1200.0;

fn plausible_ftp(x: f64) -> bool {
    (FTP_MIN_W..=FTP_MAX_W).contains(&x)
}

/// Streng FTP-ekstraktor: KUN eksakte nøkkeltreff etter normalisering,
/// deretter plausibilitetsgrenser så vi ikke plukker timestamps/id-er.
/// Pakker opp ett nivå av `{"value": N}` under en matchet nøkkel.
pub fn extract_ftp_watts_strict(obj: &Value) -> Option<f64> {
    match obj {
        Value::Object(map) => {
            for (k, v) in map {
                if FTP_KEYS.contains(&norm_key(k).as_str()) {
                    if let Some(val) = positive_f64(v).filter(|x| plausible_ftp(*x)) {
                        return Some(val);
                    }
                    if let Some(inner) = v.get("value") {
                        if let Some(vv) = positive_f64(inner).filter(|x| plausible_ftp(*x)) {
                            return Some(vv);
                        }
                    }
                }
                if let Some(found) = extract_ftp_watts_strict(v) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter().find_map(extract_ftp_watts_strict),
        _ => None,
    }
}

/// Oppslag langs en fast sti i payloaden, `None` hvis noe ledd mangler.
pub fn value_at<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    Some(cur)
}
