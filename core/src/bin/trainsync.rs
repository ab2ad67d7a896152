use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};

use trainsync_core::job::{
    run_activities_daily, run_activities_history, run_wellness_daily, run_wellness_history,
    JobConfig, ACTIVITIES_CSV, WELLNESS_CSV,
};
use trainsync_core::sync::{FileSync, MirrorSync};
use trainsync_core::GarminClient;

#[derive(Parser)]
#[command(name = "trainsync", about = "Garmin Connect -> CSV backup pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dagens aktiviteter (trailing lookback-vindu)
    Daily,
    /// Backfill av aktiviteter fra START_DATE
    History,
    /// Dagens wellness-rad (upsert)
    WellnessDaily,
    /// Backfill av wellness fra START_DATE
    WellnessHistory,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = JobConfig::from_env().context("config")?;

    // Synk inn eksisterende CSV-er og sesjon før kjøring
    let sync = cfg.sync_dir.as_ref().map(|d| MirrorSync::new(d.clone()));
    if let Some(s) = &sync {
        s.pull_dir(".garth", &cfg.token_dir)?;
        s.pull_file(ACTIVITIES_CSV, &cfg.activities_csv())?;
        s.pull_file(WELLNESS_CSV, &cfg.wellness_csv())?;
    }

    let api = GarminClient::resume(&cfg.token_dir).context("login")?;
    let filter = cfg.load_filter().context("activity filter")?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Daily => {
            run_activities_daily(&api, &filter, &cfg, today)?;
        }
        Command::History => {
            run_activities_history(&api, &filter, &cfg, today)?;
        }
        Command::WellnessDaily => {
            run_wellness_daily(&api, &filter, &cfg, today)?;
        }
        Command::WellnessHistory => {
            run_wellness_history(&api, &filter, &cfg, today)?;
        }
    }

    // Skyv resultatene ut igjen ved jobbgrensen
    if let Some(s) = &sync {
        let activities = cfg.activities_csv();
        if activities.is_file() {
            s.push_file(&activities, ACTIVITIES_CSV)?;
        }
        let wellness = cfg.wellness_csv();
        if wellness.is_file() {
            s.push_file(&wellness, WELLNESS_CSV)?;
        }
        if cfg.token_dir.is_dir() {
            s.push_dir(&cfg.token_dir, ".garth")?;
        }
    }

    Ok(())
}
