use audio_cutter_lib::cli::{self, Cli};
use audio_cutter_lib::CutterConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = CutterConfig::load_or_default(args.config.as_deref())?;

    // Initialize tracing with environment filter support
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    cli::run(args, config).await
}
