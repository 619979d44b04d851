//! The `health` subcommand.

use clap::Args;

use crate::{cmd::ServerOpts, prelude::*};

/// Options for the `health` subcommand.
#[derive(Debug, Clone, Args)]
pub struct HealthOpts {
    #[clap(flatten)]
    server: ServerOpts,
}

/// Run the `health` subcommand.
///
/// The report is displayed and logged, nothing more. It never changes how
/// the other subcommands behave.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_health(opts: &HealthOpts) -> Result<()> {
    let client = opts.server.client()?;
    let health = client.health().await?;
    info!(
        status = %health.status,
        model_loaded = health.model_loaded,
        cache_size = health.cache_size,
        "Recognition service is reachable"
    );
    println!(
        "status: {} (model loaded: {}, cached predictions: {})",
        health.status, health.model_loaded, health.cache_size
    );
    Ok(())
}
