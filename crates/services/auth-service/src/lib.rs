//! Auth Service Library
//!
//! Owns the active and dormant user stores and keeps the Account service in
//! step with them: registrations and dormancy transitions are pushed over
//! HTTP to an instance found through service discovery, failed pushes are
//! retried from a local outbox, and expired dormant accounts are purged on a
//! schedule.

pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod http;
pub mod infra;
pub mod jobs;
pub mod repository;
pub mod service;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::cli::MigrateAction;
use crate::client::{AccountClient, AccountNotifier};
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthServiceConfig, RegistrySource};
use crate::discovery::{build_selector, EurekaRegistry, ServiceRegistry, StaticRegistry};
use crate::http::{create_router, AppState};
use crate::infra::Database;
use crate::jobs::{DormancySweeper, OutboxRelay, RelayReport};
use crate::repository::{
    DormantRepository, DormantStore, OutboxRepository, OutboxStore, UserRepository, UserStore,
};
use crate::service::{LifecycleManager, PurgeReport, UserLifecycle};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fully wired service graph.
pub struct Components {
    pub lifecycle: Arc<LifecycleManager>,
    pub sweeper: DormancySweeper,
    pub relay: OutboxRelay,
}

/// Registry described by configuration.
pub fn build_registry(
    source: &RegistrySource,
    service_name: &str,
    http: reqwest::Client,
) -> Arc<dyn ServiceRegistry> {
    match source {
        RegistrySource::Eureka { url } => Arc::new(EurekaRegistry::new(url, http)),
        RegistrySource::Static { instances } => Arc::new(
            StaticRegistry::new().with_service(service_name, instances.iter().cloned()),
        ),
    }
}

/// Wire repositories, the Account client, the lifecycle manager and both
/// background jobs on top of `db`.
pub fn assemble(config: &AuthServiceConfig, db: &Database) -> Result<Components, BoxError> {
    let http = AccountClient::http_client(&config.http)?;
    let registry = build_registry(&config.registry, &config.account_service_name, http.clone());
    let selector = build_selector(config.selection, config.health_aware);
    info!(
        service = %config.account_service_name,
        strategy = selector.name(),
        health_aware = config.health_aware,
        "Account service discovery configured"
    );

    let notifier: Arc<dyn AccountNotifier> = Arc::new(AccountClient::new(
        registry,
        selector,
        http,
        config.account_service_name.clone(),
    ));
    let users: Arc<dyn UserRepository> = Arc::new(UserStore::new(db.connection()));
    let dormant: Arc<dyn DormantRepository> = Arc::new(DormantStore::new(db.connection()));
    let outbox: Arc<dyn OutboxRepository> = Arc::new(OutboxStore::new(db.connection()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let lifecycle = Arc::new(LifecycleManager::new(
        users.clone(),
        dormant.clone(),
        outbox.clone(),
        notifier.clone(),
        clock.clone(),
        config.dormancy_retention_days,
    ));
    let sweeper = DormancySweeper::new(lifecycle.clone(), config.sweep_interval());
    let relay = OutboxRelay::new(
        outbox,
        notifier,
        users,
        dormant,
        clock,
        config.outbox_retry.clone(),
        config.outbox_batch_size,
        config.outbox_poll_interval(),
    );

    Ok(Components {
        lifecycle,
        sweeper,
        relay,
    })
}

async fn connect(config: &AuthServiceConfig) -> Result<Database, BoxError> {
    config.validate()?;
    Ok(Database::connect(&config.database).await?)
}

/// Run the HTTP server, the dormancy sweeper and the outbox relay until Ctrl+C.
pub async fn run_server_with_config(config: AuthServiceConfig) -> Result<(), BoxError> {
    let db = connect(&config).await?;
    let Components {
        lifecycle,
        sweeper,
        relay,
    } = assemble(&config, &db)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = sweeper.start(shutdown_rx.clone());
    let relay_handle = relay.start(shutdown_rx);

    let lifecycle: Arc<dyn UserLifecycle> = lifecycle;
    let app = create_router(AppState::new(lifecycle, Some(db)));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Auth service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    for handle in [sweeper_handle, relay_handle] {
        if let Err(e) = handle.await {
            error!(error = %e, "Background job ended abnormally");
        }
    }

    info!("Auth service stopped");
    Ok(())
}

/// Load configuration from the environment, apply CLI overrides and serve.
pub async fn run(host: Option<String>, port: Option<u16>) -> Result<(), BoxError> {
    let mut config = AuthServiceConfig::from_env();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    run_server_with_config(config).await
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
}

/// One-shot purge of expired dormant accounts.
pub async fn run_sweep_once(config: AuthServiceConfig) -> Result<PurgeReport, BoxError> {
    let db = connect(&config).await?;
    let components = assemble(&config, &db)?;
    Ok(components.sweeper.run_once().await?)
}

/// One-shot outbox drain.
pub async fn run_relay_once(config: AuthServiceConfig) -> Result<RelayReport, BoxError> {
    let db = connect(&config).await?;
    let components = assemble(&config, &db)?;
    Ok(components.relay.run_once().await?)
}

/// Apply a migration action without auto-migrating on connect.
pub async fn run_migrations(
    config: AuthServiceConfig,
    action: MigrateAction,
) -> Result<(), BoxError> {
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            info!("Running pending migrations...");
            db.run_migrations().await?;
            info!("Migrations completed successfully");
        }
        MigrateAction::Down => {
            info!("Rolling back last migration...");
            db.rollback_migration().await?;
            info!("Rollback completed successfully");
        }
        MigrateAction::Status => {
            for migration in db.migration_status().await? {
                let status = if migration.applied { "applied" } else { "pending" };
                println!("{}: {}", migration.name, status);
            }
        }
        MigrateAction::Fresh => {
            tracing::warn!("Resetting database and running all migrations...");
            db.fresh_migrations().await?;
            info!("Fresh migrations completed successfully");
        }
    }

    Ok(())
}
