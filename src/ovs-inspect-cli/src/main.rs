mod cli;
mod commands;
mod config;
mod dispatch;
mod target;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "ovs_inspect=debug,ovs_inspect_cli=debug",
        _ => "ovs_inspect=trace,ovs_inspect_cli=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dispatch::dispatch(cli)
}
