use anyhow::{Context, Result};

use recsched::config::Config;

use super::open_engine;

pub async fn run(config: &Config) -> Result<()> {
    let mut engine = open_engine(config).await?;

    println!("recsched running");
    println!("  Schedule: {}", config.paths.schedule_file.display());
    println!("  Devices:  {}", engine.registry().names().join(", "));
    println!("  Entries:  {}", engine.entries().len());
    println!("Press Ctrl+C to stop.");

    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Engine stopped with an error")?;

    println!("Stopped.");
    Ok(())
}
