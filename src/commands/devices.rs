use anyhow::{bail, Context, Result};
use clap::Subcommand;

use recsched::config::Config;
use recsched::device::protocol::LIST_COMMAND;
use recsched::device::{
    parse_device_list, Device, DeviceRegistry, LinkPool, LinkSettings, DEFAULT_PORT,
};

use super::open_engine;

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// Show configured devices
    List,

    /// Add or update a device
    Add {
        name: String,

        #[arg(long)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Friendly name shown in listings
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Remove a device; its entries are kept as orphans
    Remove { name: String },

    /// Ask an encoder server which devices it serves and add them
    Discover {
        #[arg(long)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Show entries whose device is no longer configured
    Orphans,

    /// Move every entry of one device to another
    Remap { from: String, to: String },
}

async fn load_registry(config: &Config) -> Result<DeviceRegistry> {
    DeviceRegistry::load(&config.paths.device_file)
        .await
        .with_context(|| {
            format!(
                "Failed to load devices from {}",
                config.paths.device_file.display()
            )
        })
}

async fn save_registry(config: &Config, registry: &DeviceRegistry) -> Result<()> {
    registry
        .save(&config.paths.device_file)
        .await
        .with_context(|| {
            format!(
                "Failed to save devices to {}",
                config.paths.device_file.display()
            )
        })
}

pub async fn devices(config: &Config, command: DeviceCommand) -> Result<()> {
    match command {
        DeviceCommand::List => {
            let registry = load_registry(config).await?;
            if registry.is_empty() {
                println!("No devices configured.");
                return Ok(());
            }
            for device in registry.iter() {
                println!(
                    "{:<20}  {:<22}  {}",
                    device.name,
                    device.address(),
                    device.display_name.as_deref().unwrap_or("")
                );
            }
        }

        DeviceCommand::Add {
            name,
            host,
            port,
            display_name,
        } => {
            let mut registry = load_registry(config).await?;
            let mut device = Device::new(name.trim(), host.trim(), port);
            if let Some(display) = display_name {
                device = device.with_display_name(display);
            }
            let address = device.address();
            let added = registry.upsert(device);
            save_registry(config, &registry).await?;
            println!(
                "{} {} at {address}",
                if added { "Added" } else { "Updated" },
                name.trim()
            );
        }

        DeviceCommand::Remove { name } => {
            let mut registry = load_registry(config).await?;
            if registry.remove(&name).is_none() {
                bail!("No device named '{name}'");
            }
            save_registry(config, &registry).await?;

            let engine = open_engine(config).await?;
            let orphans = engine
                .orphaned()
                .into_iter()
                .filter(|e| e.device_id == name)
                .count();
            println!("Removed {name}");
            if orphans > 0 {
                println!("  {orphans} entries now orphaned; see `recsched devices remap`");
            }
        }

        DeviceCommand::Discover { host, port } => {
            let settings = LinkSettings::new(
                config.connect_timeout(),
                config.read_timeout(),
                &config.link.encoding,
            )?;
            let pool = LinkPool::new(DeviceRegistry::new(), settings);
            let response = pool
                .query_address(&host, port, LIST_COMMAND)
                .await
                .with_context(|| format!("No answer from {host}:{port}"))?;

            let names = parse_device_list(&response);
            if names.is_empty() {
                println!("{host}:{port} reported no devices.");
                return Ok(());
            }

            let mut registry = load_registry(config).await?;
            let added = registry.merge_discovered(&names, &host, port);
            save_registry(config, &registry).await?;
            println!("Found {} devices, {} new", names.len(), added.len());
            for name in added {
                println!("  + {name}");
            }
        }

        DeviceCommand::Orphans => {
            let engine = open_engine(config).await?;
            let orphans = engine.orphaned();
            if orphans.is_empty() {
                println!("No orphaned entries.");
            }
            for entry in orphans {
                println!(
                    "{}  {:<16}  {} {}  {}",
                    entry.id,
                    entry.device_id,
                    entry.date,
                    entry.window_text(),
                    entry.label
                );
            }
        }

        DeviceCommand::Remap { from, to } => {
            let mut engine = open_engine(config).await?;
            let moved = engine.remap_device(&from, &to).await?;
            println!("Moved {moved} entries from {from} to {to}");
        }
    }

    Ok(())
}
