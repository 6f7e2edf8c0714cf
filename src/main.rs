mod cli;
mod config;
mod model;
mod providers;
mod sync;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

// One request in flight at a time; the sync never needs more than one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{e:#}\n");
            cli::print_help();
            std::process::exit(2);
        }
    };

    cli::run(invocation).await
}
