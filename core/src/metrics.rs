use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

/// Konverterer m/s til min/mile-streng, nyttig for løpeturer.
/// Minutter trunkeres, sekunder rundes ned.
pub fn format_pace_min_mile(speed_mps: Option<f64>) -> Option<String> {
    let v = speed_mps.filter(|v| *v > 0.0)?;
    let mins_per_mile = 26.8224 / v;
    let minutes = mins_per_mile as u32;
    let seconds = ((mins_per_mile - minutes as f64) * 60.0) as u32;
    Some(format!("{minutes}:{seconds:02}"))
}

/// IF = kraft / FTP, rundet til 3 desimaler.
/// `None` hvis en av operandene mangler eller er <= 0.
pub fn intensity_factor(power_w: Option<f64>, ftp_watts: Option<f64>) -> Option<f64> {
    match (power_w, ftp_watts) {
        (Some(p), Some(f)) if p > 0.0 && f > 0.0 => Some(round_to(p / f, 3)),
        _ => None,
    }
}

/// TSS ~= (sek * NP * IF) / (FTP * 3600) * 100, rundet til 1 desimal.
/// Kraft er NP når tilgjengelig, ellers snittwatt (callers valg).
pub fn tss(
    duration_s: Option<f64>,
    power_w: Option<f64>,
    ftp_watts: Option<f64>,
) -> Option<f64> {
    match (duration_s, power_w, ftp_watts) {
        (Some(d), Some(p), Some(f)) if d > 0.0 && p > 0.0 && f > 0.0 => {
            let if_val = p / f;
            Some(round_to(d * p * if_val / (f * 3600.0) * 100.0, 1))
        }
        _ => None,
    }
}

/// Kjøringstellere, registrert i et eget prometheus-registry per kjøring.
pub struct Metrics {
    pub registry: Registry,
    activities_written: IntCounter,
    skipped_dup: IntCounter,
    skipped_type: IntCounter,
    detail_fetches: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let activities_written =
            IntCounter::new("activities_written_total", "Rows appended to activity CSV")
                .expect("metric registration");
        let skipped_dup =
            IntCounter::new("activities_skipped_dup_total", "Activities already in CSV")
                .expect("metric registration");
        let skipped_type =
            IntCounter::new("activities_skipped_type_total", "Activities rejected by filter")
                .expect("metric registration");
        let detail_fetches =
            IntCounter::new("detail_fetch_total", "Activity detail payloads fetched")
                .expect("metric registration");

        for c in [&activities_written, &skipped_dup, &skipped_type, &detail_fetches] {
            registry.register(Box::new(c.clone())).expect("metric registration");
        }

        Self {
            registry,
            activities_written,
            skipped_dup,
            skipped_type,
            detail_fetches,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn activities_written_total(m: &Metrics) -> &IntCounter {
    &m.activities_written
}

pub fn skipped_dup_total(m: &Metrics) -> &IntCounter {
    &m.skipped_dup
}

pub fn skipped_type_total(m: &Metrics) -> &IntCounter {
    &m.skipped_type
}

pub fn detail_fetch_total(m: &Metrics) -> &IntCounter {
    &m.detail_fetches
}

/// Tekstdump (prometheus-format) av alle tellere i registret,
/// for logging ved jobbslutt.
pub fn encode_text(m: &Metrics) -> String {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&m.registry.gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
