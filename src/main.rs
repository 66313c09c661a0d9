mod cli;
mod demo;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = demo::run(cli.command).await {
        tracing::error!(error = %e, "demo failed");
        eprintln!("locationhub: {e}");
        std::process::exit(1);
    }
}
