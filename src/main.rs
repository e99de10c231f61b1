use std::process;

use clap::Parser;
use diffscribe::generate::GenerateError;
use diffscribe::Cli;

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only the commit message.
    // RUST_LOG overrides the "warn" default.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {e}");

        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("  Caused by: {err}");
            source = err.source();
        }

        let code = e
            .downcast_ref::<GenerateError>()
            .map_or(1, GenerateError::exit_code);
        process::exit(code);
    }
}
