use anyhow::{bail, Result};

use recsched::config::Config;
use recsched::device::StatusReading;
use recsched::EntryStatus;

use super::open_engine;

fn print_reading(device: &str, display: &str, reading: &StatusReading) {
    let name = if display == device {
        device.to_string()
    } else {
        format!("{display} ({device})")
    };
    println!(
        "{:<28}  {:<10}  {:<7}  {}",
        name,
        reading.category,
        reading.color_hint,
        reading.raw.trim()
    );
}

pub async fn status(config: &Config, device: Option<&str>) -> Result<()> {
    let mut engine = open_engine(config).await?;

    match device {
        Some(device) => {
            let reading = engine.get_status(device).await?;
            print_reading(device, engine.registry().display_name(device), &reading);
        }
        None => {
            if engine.registry().is_empty() {
                println!("No devices configured.");
                return Ok(());
            }
            let readings = engine.refresh_statuses().await;
            for name in engine.registry().names() {
                if let Some(reading) = readings.get(&name) {
                    print_reading(&name, engine.registry().display_name(&name), reading);
                }
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

pub async fn start(config: &Config, device: &str, label: Option<&str>) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let id = engine.force_start(device, label).await?;
    let entry = engine.get(id).cloned();
    engine.shutdown().await?;

    match entry {
        Some(entry) if entry.status == EntryStatus::Recording => {
            println!("Recording '{}' on {device}", entry.label);
            println!("  {} {}", entry.date, entry.window_text());
            Ok(())
        }
        Some(entry) => bail!(
            "{device} did not start; '{}' is kept with status {} and will be retried by the scheduler",
            entry.label,
            entry.status
        ),
        None => bail!("Manual entry for {device} disappeared"),
    }
}

pub async fn stop(config: &Config, device: &str) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let id = engine.force_stop(device).await?;
    if let Some(entry) = engine.get(id) {
        println!("Stopped '{}' on {device} at {}", entry.label, entry.end_at().time());
    }
    engine.shutdown().await?;
    Ok(())
}

pub async fn snapshot(config: &Config, device: &str) -> Result<()> {
    let mut engine = open_engine(config).await?;
    let captured = engine.capture_preview(device).await?;
    engine.shutdown().await?;

    match captured {
        Some(path) => println!("{}", path.display()),
        None => bail!("No image from {device} within {:?}", engine.settings().snapshot.timeout),
    }
    Ok(())
}
