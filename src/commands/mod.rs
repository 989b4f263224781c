pub mod control;
pub mod devices;
pub mod entries;
pub mod run;

// Re-export command functions for convenience
pub use control::{snapshot, start, status, stop};
pub use devices::{devices, DeviceCommand};
pub use entries::{add, check, edit, list, remove, EntryArgs};
pub use run::run;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};

use recsched::config::Config;
use recsched::schedule::hour_of;
use recsched::utils::{parse_clock_time, parse_date, parse_duration_hours};
use recsched::{Engine, EntryId};

/// Build the engine from configuration and load the schedule
pub async fn open_engine(config: &Config) -> Result<Engine> {
    let mut engine = Engine::from_config(config)
        .await
        .context("Failed to set up engine")?;
    engine.load().await.context("Failed to load schedule")?;
    Ok(engine)
}

/// Find an entry by full id, unique id prefix, or label
pub fn resolve_entry(engine: &Engine, key: &str) -> Result<EntryId> {
    let key = key.trim();
    if let Ok(id) = key.parse::<EntryId>() {
        if engine.get(id).is_some() {
            return Ok(id);
        }
        bail!("No entry with id {id}");
    }

    let by_prefix: Vec<EntryId> = engine
        .entries()
        .into_iter()
        .filter(|e| key.len() >= 4 && e.id.to_string().starts_with(key))
        .map(|e| e.id)
        .collect();
    if let [id] = by_prefix.as_slice() {
        return Ok(*id);
    }
    if by_prefix.len() > 1 {
        bail!("Id prefix '{key}' is ambiguous");
    }

    let by_label: Vec<EntryId> = engine
        .entries()
        .into_iter()
        .filter(|e| e.label == key && e.is_active())
        .map(|e| e.id)
        .collect();
    match by_label.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No entry matches '{key}'"),
        _ => bail!("Label '{key}' is ambiguous, use the id"),
    }
}

pub fn parse_start_hour(raw: &str) -> Result<f64> {
    parse_clock_time(raw)
        .map(hour_of)
        .with_context(|| format!("Invalid start time '{raw}'"))
}

pub fn parse_hours(raw: &str) -> Result<f64> {
    parse_duration_hours(raw).with_context(|| format!("Invalid duration '{raw}'"))
}

/// Parse `raw`, defaulting to today
pub fn parse_day(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => parse_date(raw).with_context(|| format!("Invalid date '{raw}'")),
        None => Ok(Local::now().date_naive()),
    }
}
