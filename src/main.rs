use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod client;
mod cmd;
mod output;
mod prelude;
mod ui;
mod validate;
mod workflow;

/// Recognize handwritten text in images using a remote recognition service.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
Environment Variables:
  - SCRAWL_SERVER_URL (optional): Base URL of the recognition service.
    Defaults to http://localhost:5000.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Recognize the handwriting in one or more images.
    Recognize(cmd::recognize::RecognizeOpts),
    /// Check whether the recognition service is up.
    Health(cmd::health::HealthOpts),
    /// Ask the recognition service to clear its prediction cache.
    ClearCache(cmd::clear_cache::ClearCacheOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Recognize(opts) => opts.using_stdout_for_output(),
            Cmd::Health(_) | Cmd::ClearCache(_) => true,
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bars if recognized text is going to stdout.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Recognize(opts) => cmd::recognize::cmd_recognize(ui, opts).await,
        Cmd::Health(opts) => cmd::health::cmd_health(opts).await,
        Cmd::ClearCache(opts) => cmd::clear_cache::cmd_clear_cache(opts).await,
    }
}
