//! The `clear-cache` subcommand.

use clap::Args;

use crate::{cmd::ServerOpts, prelude::*};

/// Options for the `clear-cache` subcommand.
#[derive(Debug, Clone, Args)]
pub struct ClearCacheOpts {
    #[clap(flatten)]
    server: ServerOpts,
}

/// Run the `clear-cache` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_clear_cache(opts: &ClearCacheOpts) -> Result<()> {
    let client = opts.server.client()?;
    let response = client.clear_cache().await?;
    if response.success {
        println!(
            "{}",
            response.message.unwrap_or_else(|| "Cache cleared.".to_owned())
        );
        Ok(())
    } else {
        Err(anyhow!(
            "recognition service failed to clear its cache: {}",
            response
                .message
                .unwrap_or_else(|| "no details provided".to_owned())
        ))
    }
}
