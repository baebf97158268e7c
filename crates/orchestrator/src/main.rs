//! Graphium orchestrator daemon.
//!
//! Builds the process-wide singletons (document store, runtime client
//! pool, event bus, scheduler, audit logger), spawns the background
//! workers, and tears everything down on ctrl-c. Request-facing surfaces
//! (HTTP, CLI) live outside this crate and drive the library API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use orchestrator::audit::{run_audit_loop, AuditLogger, IntegrityAuditor};
use orchestrator::config::{LogFormat, OrchestratorConfig};
use orchestrator::events::EventBus;
use orchestrator::runtime::RuntimePool;
use orchestrator::scheduler::ActionScheduler;
use orchestrator::stacks::StackService;
use orchestrator::store::{DocumentStore, MemoryStore, TypedStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = OrchestratorConfig::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    init_tracing(&config);

    info!("Starting Graphium Orchestrator v{}", env!("CARGO_PKG_VERSION"));

    // Process-wide singletons, built once here and torn down at the end.
    let raw_store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let store = TypedStore::new(raw_store.clone());
    let pool = Arc::new(RuntimePool::new());
    let events = Arc::new(EventBus::new());

    // The stack service is driven by the request-facing surfaces; the
    // daemon wires it up and keeps the event stream visible in the logs.
    let _stacks = StackService::new(pool.clone(), store.clone(), events.clone());
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!(event_type = %event.event_type, payload = %event.payload, "Graph event");
        }
    });

    let (shutdown_tx, _) = tokio::sync::watch::channel(false);

    let scheduler = Arc::new(ActionScheduler::with_interval(
        store.clone(),
        Duration::from_secs(config.scheduler.tick_interval_secs),
    ));
    if config.scheduler.enabled {
        scheduler.start().await;
    }

    let mut audit_worker = None;
    let audit_logger = if config.audit.enabled {
        let logger = Arc::new(
            AuditLogger::new(&config.audit.directory).context("Failed to open audit log")?,
        );
        let auditor = IntegrityAuditor::new(raw_store.clone());
        let interval = Duration::from_secs(config.audit.scan_interval_secs);
        let rx = shutdown_tx.subscribe();
        let worker_logger = logger.clone();
        audit_worker = Some(tokio::spawn(async move {
            run_audit_loop(auditor, worker_logger, interval, rx).await;
        }));
        Some(logger)
    } else {
        None
    };

    info!("Orchestrator running; press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    scheduler.stop().await;
    if let Some(worker) = audit_worker {
        let _ = worker.await;
    }
    if let Some(logger) = audit_logger {
        let _ = logger.close();
    }
    pool.close_all().await;

    info!("Orchestrator stopped");
    Ok(())
}

fn init_tracing(config: &OrchestratorConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
