mod cli;

use anyhow::Result;
use cli::Verbosity;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = cli::parse(&args)?;
    init_tracing(invocation.verbosity());
    cli::run(invocation)
}

fn init_tracing(verbosity: Verbosity) {
    let filter = match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose(1) => "info,loadsmith=debug",
        Verbosity::Verbose(_) => "debug,loadsmith=trace",
    };

    let env_filter = EnvFilter::try_from_env("LOADSMITH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
