//! MIB Agent - Standalone metrics agent.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mib_agent::{load_catalog, new_shared_stats, Args, ProcessMetricSource, RefreshTask};
use mib_core::{
    start_processor, DefaultNamespaceServer, LifecycleController, LifecycleSignal, ObjectRegistry,
    SignalOutcome,
};

/// Pending lifecycle signals the processor will buffer.
const LIFECYCLE_BUFFER_SIZE: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mib_agent=info,mib_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting MIB agent");

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.into_config()?;

    tracing::info!(
        server_name = %config.server_name,
        server_address = %config.server_address,
        context = %config.context,
        refresh_interval_secs = ?config.refresh_interval.map(|d| d.as_secs()),
        catalog = ?config.catalog_path,
        "configuration loaded"
    );

    let catalog = Arc::new(load_catalog(config.catalog_path.as_deref())?);

    let stats = new_shared_stats();
    stats.record_log(format!("{} agent started", config.server_name));
    let source = Arc::new(ProcessMetricSource::new(
        config.server_name.clone(),
        config.server_address.clone(),
        stats.clone(),
    ));

    let registry = Arc::new(ObjectRegistry::new(catalog, source));
    registry.on_teardown(|registry| {
        tracing::info!(objects = registry.object_count(), "MIB registry torn down");
    });

    let server = Arc::new(DefaultNamespaceServer::new());
    let controller = Arc::new(LifecycleController::new(registry.clone()));
    let (lifecycle, processor) = start_processor(controller, LIFECYCLE_BUFFER_SIZE);

    let outcome = lifecycle
        .send(LifecycleSignal::Init {
            server: server.clone(),
            context: config.context.clone(),
        })
        .await?;
    if let SignalOutcome::Initialized(report) = outcome {
        if !report.is_complete() {
            tracing::warn!(
                duplicates = report.duplicates.len(),
                "MIB initialized with duplicate identifiers"
            );
        }
    }

    let refresh_task = config
        .refresh_interval
        .map(|interval| RefreshTask::start(lifecycle.clone(), interval));

    // Wait for shutdown signal
    tracing::info!(objects = server.len(), "agent ready");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
    }
    tracing::info!("received shutdown signal");

    if let Some(task) = refresh_task {
        task.shutdown().await;
    }

    if config.dump_snapshot {
        let snapshot = serde_json::to_string_pretty(&registry.snapshot())?;
        tracing::info!(snapshot = %snapshot, "final MIB snapshot");
    }

    lifecycle.send(LifecycleSignal::Teardown).await?;
    if let Err(e) = processor.await {
        tracing::warn!(error = %e, "Lifecycle processor panicked");
    }
    tracing::info!("agent shutdown complete");

    Ok(())
}
