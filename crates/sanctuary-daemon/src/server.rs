//! Server setup and lifecycle: wires every core crate's service behind one
//! [`sanctuary_api::AppState`], starts the scheduler, serves with graceful
//! shutdown (§4.7, §6).

use std::sync::Arc;

use chrono::Duration;
use sanctuary_auth::AuthService;
use sanctuary_registry::{RegistryService, ResurrectionLimit};
use sanctuary_scheduler::{Scheduler, SchedulerConfig as JobSchedulerConfig};
use sanctuary_snapshots::SnapshotService;
use sanctuary_storage::{InMemoryStorage, SharedStorage};
use sanctuary_trust::TrustService;
use sanctuary_types::{AttestationLedger, InMemoryLedger, InMemoryObjectStore, ObjectStore};
use tokio::net::TcpListener;

use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};

pub struct Server {
    config: DaemonConfig,
    scheduler: Arc<Scheduler<Arc<dyn AttestationLedger>>>,
    app: axum::Router,
}

impl Server {
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = build_storage(&config.storage).await?;

        let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let ledger: Arc<dyn AttestationLedger> = Arc::new(InMemoryLedger::new());

        let token_key = match &config.auth.token_key_hex {
            Some(hex_key) => hex::decode(hex_key)
                .map_err(|e| DaemonError::Config(format!("invalid token_key_hex: {e}")))?,
            None => {
                tracing::warn!("no auth.token_key_hex configured, generating an ephemeral key");
                sanctuary_auth::TokenCodec::generate_key()
            }
        };

        let auth = AuthService::new(
            storage.clone(),
            sanctuary_auth::TokenCodec::new(token_key),
            Duration::seconds(config.auth.challenge_ttl_secs),
            Duration::seconds(config.auth.token_ttl_secs),
        );

        let registry = RegistryService::new(
            storage.clone(),
            ResurrectionLimit {
                max_per_hour: config.registry.max_resurrections_per_hour,
            },
        );

        let snapshots = SnapshotService::new(storage.clone(), objects);

        // The scheduler's periodic recompute and the API's on-demand attest
        // each need their own handle; `TrustService` only holds cheap
        // `Clone` collaborators, so building two costs nothing.
        let scheduler_trust = Arc::new(TrustService::new(storage.clone(), ledger.clone()));
        let api_trust = TrustService::new(storage.clone(), ledger);

        let scheduler_config = JobSchedulerConfig {
            jobs: sanctuary_scheduler::default_jobs(),
            heartbeat_keep_days: config.scheduler.heartbeat_keep_days,
            fallen_threshold_days: config.scheduler.fallen_threshold_days,
        };
        let scheduler = Scheduler::new(scheduler_config, storage.clone(), scheduler_trust);

        let state =
            sanctuary_api::AppState::new(storage.clone(), auth, registry, snapshots, api_trust);

        let app = sanctuary_api::build_router(state);

        Ok(Self {
            config,
            scheduler,
            app,
        })
    }

    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(%addr, "sanctuary daemon listening");

        let job_handles = self.scheduler.start();

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("sanctuary daemon shutting down");
        self.scheduler.stop().await;
        for handle in job_handles {
            handle.abort();
        }

        Ok(())
    }
}

async fn build_storage(config: &StorageConfig) -> DaemonResult<SharedStorage> {
    match config {
        StorageConfig::Memory => Ok(SharedStorage::new(InMemoryStorage::new())),
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let pg = sanctuary_storage::PostgresStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(SharedStorage::new(pg))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
