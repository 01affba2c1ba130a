use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};

use rtdctl::engine::Engine;
use rtdctl::link::Link;
use rtdctl::outputs::{LoggingRelays, RELAY_PINS};
use rtdctl::registry::Registry;

use crate::argparse::Commands;

// Part of the binary crate, not the library crate: the logging facility
// and the command line are the binary's concern.
mod argparse;
mod logging;

use tokio::signal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = argparse::parse();

    let level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let _guards = logging::init(level, cli.console, Some(&cli.log_file));

    let database_url = rtdctl::get_database_url();
    rtdctl::database::init(&database_url)?;

    let (pattern, baud) = match cli.command {
        // Migrations already ran above, nothing else to do
        Commands::Migrate {} => return Ok(()),
        Commands::Run { pattern, baud } => (pattern, baud),
    };

    let pool = rtdctl::database::get_connection_pool(&database_url)?;
    let registry = Arc::new(Registry::load(&pool)?);
    let outputs = Arc::new(LoggingRelays::new(&RELAY_PINS));
    let link = Link::new(&pattern, baud, rtdctl::CONNECT_RETRY, rtdctl::MAX_FAILED_READS);

    let engine = Engine::new(link, registry, pool, outputs, rtdctl::CHANNEL_CAPACITY);
    let handle = engine.handle();

    // Local observer: one log line per published cycle
    let mut observer = handle.subscribe();
    tokio::spawn(async move {
        while let Some(result) = observer.latest().await {
            if result.error.is_empty() {
                info!("cycle published {} readings", result.readings.len());
            } else {
                info!(
                    "cycle published {} readings ({})",
                    result.readings.len(),
                    result.error
                );
            }
        }
    });

    let engine_task = tokio::spawn(engine.run());

    signal::ctrl_c().await?;
    handle.shutdown();
    engine_task.await?;
    Ok(())
}
