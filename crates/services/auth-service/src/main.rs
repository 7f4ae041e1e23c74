//! Auth Service - account lifecycle and Account service synchronization.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_service_lib::cli::{Cli, Commands};
use auth_service_lib::config::AuthServiceConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve(args) => {
            auth_service_lib::run(args.host, args.port).await?;
        }
        Commands::Sweep => {
            let report = auth_service_lib::run_sweep_once(AuthServiceConfig::from_env()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Relay => {
            let report = auth_service_lib::run_relay_once(AuthServiceConfig::from_env()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Migrate(args) => {
            auth_service_lib::run_migrations(AuthServiceConfig::from_env(), args.action).await?;
        }
    }

    Ok(())
}
