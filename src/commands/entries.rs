use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use recsched::config::Config;
use recsched::schedule::{format_hour, EntryEdit, NewEntry, ScheduleEntry};
use recsched::utils::truncate_text;

use super::{open_engine, parse_day, parse_hours, parse_start_hour, resolve_entry};

/// Fields that `edit` may change
#[derive(Args, Debug, Default)]
pub struct EntryArgs {
    /// New device
    #[arg(short, long)]
    pub device: Option<String>,

    /// New start time
    #[arg(short, long)]
    pub start: Option<String>,

    /// New duration
    #[arg(short = 'l', long)]
    pub duration: Option<String>,

    /// New label
    #[arg(short, long)]
    pub name: Option<String>,

    /// New date
    #[arg(long)]
    pub date: Option<String>,
}

impl EntryArgs {
    fn into_edit(self) -> Result<EntryEdit> {
        Ok(EntryEdit {
            device_id: self.device,
            date: self.date.as_deref().map(|d| parse_day(Some(d))).transpose()?,
            start_hour: self.start.as_deref().map(parse_start_hour).transpose()?,
            duration_hours: self.duration.as_deref().map(parse_hours).transpose()?,
            label: self.name,
        })
    }
}

pub async fn add(
    config: &Config,
    device: String,
    start: &str,
    duration: &str,
    label: String,
    date: Option<&str>,
) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let new = NewEntry {
        device_id: device,
        date: parse_day(date)?,
        start_hour: parse_start_hour(start)?,
        duration_hours: parse_hours(duration)?,
        label,
    };

    let id = engine.add_entry(new).await?;
    if let Some(entry) = engine.get(id) {
        println!("Scheduled '{}' on {}", entry.label, entry.device_id);
        println!("  {} {}", entry.date, entry.window_text());
        println!("  Id: {id}");
    }
    Ok(())
}

pub async fn edit(config: &Config, key: &str, changes: EntryArgs) -> Result<()> {
    let edit = changes.into_edit()?;
    if edit.is_empty() {
        bail!("Nothing to change; pass at least one of --device, --start, --duration, --name, --date");
    }

    let mut engine = open_engine(config).await?;
    let id = resolve_entry(&engine, key)?;
    engine.edit_entry(id, edit).await?;
    if let Some(entry) = engine.get(id) {
        println!("Updated '{}' on {}", entry.label, entry.device_id);
        println!("  {} {}", entry.date, entry.window_text());
    }
    Ok(())
}

pub async fn remove(config: &Config, key: &str) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let id = resolve_entry(&engine, key)?;
    let entry = engine.delete_entry(id).await?;
    println!("Removed '{}' ({} {})", entry.label, entry.date, entry.window_text());
    Ok(())
}

#[derive(Serialize)]
struct ListedEntry<'a> {
    id: String,
    device: &'a str,
    date: String,
    start: String,
    end: String,
    label: &'a str,
    status: &'static str,
    path: Option<String>,
}

pub async fn list(config: &Config, device: Option<&str>, all: bool, json: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let entries: Vec<&ScheduleEntry> = engine
        .entries()
        .into_iter()
        .filter(|e| device.map_or(true, |d| e.device_id == d))
        .filter(|e| all || e.is_active())
        .collect();

    if json {
        let listed: Vec<ListedEntry<'_>> = entries
            .iter()
            .map(|e| ListedEntry {
                id: e.id.to_string(),
                device: &e.device_id,
                date: e.date.to_string(),
                start: format_hour(e.start_hour),
                end: e.end_at().format("%Y-%m-%d %H:%M:%S").to_string(),
                label: &e.label,
                status: e.status.as_str(),
                path: engine
                    .recording_path(e.id)
                    .map(|p| p.display().to_string()),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No scheduled recordings.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<16}  {:<10}  {:<20}  {:<10}  {}",
        "ID", "DEVICE", "DATE", "WINDOW", "STATUS", "LABEL"
    );
    for entry in entries {
        let id = entry.id.to_string();
        println!(
            "{:<8}  {:<16}  {:<10}  {:<20}  {:<10}  {}",
            &id[..8],
            truncate_text(engine.registry().display_name(&entry.device_id), 16),
            entry.date,
            entry.window_text(),
            entry.status,
            entry.label
        );
    }
    Ok(())
}

pub async fn check(
    config: &Config,
    device: &str,
    start: &str,
    duration: &str,
    date: Option<&str>,
    exclude: Option<&str>,
) -> Result<()> {
    let engine = open_engine(config).await?;
    let date = parse_day(date)?;
    let start_hour = parse_start_hour(start)?;
    let duration_hours = parse_hours(duration)?;
    let exclude = exclude.map(|key| resolve_entry(&engine, key)).transpose()?;

    let labels = engine.conflicting_labels(device, date, start_hour, duration_hours, exclude);
    if labels.is_empty() {
        println!(
            "Free: {device} {date} {} for {duration_hours:.2}h",
            format_hour(start_hour)
        );
    } else {
        println!("Conflicts on {device}: {}", labels.join(", "));
    }
    Ok(())
}
