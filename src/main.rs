use clap::Parser;
use locals::{Config, KeyValueMirror, logging, shell};
use tokio::io::BufReader;
use tracing::info;

/// Interactive shell over an in-memory key-value mirror
#[derive(Debug, Parser)]
#[command(name = "locals", version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log level, overrides the configured one
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).map_err(|e| anyhow::anyhow!("{}", e))?,
        None => Config::default(),
    };

    // Initialize logging
    logging::init(&config.log, args.log_level.as_deref())?;

    info!("Starting locals shell");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let host = config.host.build();
    let session = config.session.build();
    let mut mirror = KeyValueMirror::open(host, &session, &config.mirror)?;

    shell::run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), &mut mirror).await?;

    Ok(())
}
