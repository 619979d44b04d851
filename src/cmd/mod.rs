//! Command-line entry points.

use std::{env, time::Duration};

use clap::Args;

use crate::{
    client::{self, RecognitionClient},
    prelude::*,
};

pub mod clear_cache;
pub mod health;
pub mod recognize;

/// Environment variable naming the recognition service's base URL.
pub const SERVER_URL_VAR: &str = "SCRAWL_SERVER_URL";

/// Common options for subcommands that talk to the recognition service.
#[derive(Debug, Clone, Args)]
pub struct ServerOpts {
    /// Base URL of the recognition service. Defaults to $SCRAWL_SERVER_URL,
    /// or http://localhost:5000.
    #[clap(long)]
    server_url: Option<String>,

    /// Abort requests after this many seconds. No timeout is applied
    /// unless set.
    #[clap(long)]
    timeout: Option<u64>,
}

impl ServerOpts {
    /// The base URL to use: the flag, then the environment, then the default.
    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .or_else(|| env::var(SERVER_URL_VAR).ok())
            .unwrap_or_else(|| client::DEFAULT_SERVER_URL.to_owned())
    }

    /// Build a client for the configured service.
    pub fn client(&self) -> Result<RecognitionClient> {
        RecognitionClient::new(&self.server_url(), self.timeout.map(Duration::from_secs))
    }
}
