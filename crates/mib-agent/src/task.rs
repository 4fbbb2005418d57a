//! Background refresh task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mib_core::{Error as RegistryError, LifecycleHandle, LifecycleSignal, SignalOutcome};

/// Handle for a periodic refresh task.
///
/// Each tick sends a `Refresh` signal through the lifecycle processor.
/// Failures are logged and the next tick runs as scheduled; the task exits
/// on its own once the registry has been torn down or the processor is gone.
pub struct RefreshTask {
    handle: JoinHandle<()>,
    stop_flag: Arc<AtomicBool>,
    failures: Arc<AtomicU64>,
}

impl RefreshTask {
    /// Start refreshing every `interval`.
    pub fn start(lifecycle: LifecycleHandle, interval: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicU64::new(0));
        let stop_flag_clone = stop_flag.clone();
        let failures_clone = failures.clone();

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Background refresh task started");

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick

            loop {
                ticker.tick().await;

                if stop_flag_clone.load(Ordering::SeqCst) {
                    info!("Background refresh task stopping");
                    break;
                }

                match lifecycle.send(LifecycleSignal::Refresh).await {
                    Ok(SignalOutcome::Refreshed(updated)) => {
                        debug!(updated, "MIB refreshed");
                    }
                    Ok(outcome) => debug!(outcome = ?outcome, "unexpected refresh outcome"),
                    Err(RegistryError::Terminated) | Err(RegistryError::ControllerStopped) => {
                        info!("Lifecycle finished, refresh task exiting");
                        break;
                    }
                    Err(e) => {
                        failures_clone.fetch_add(1, Ordering::Relaxed);
                        error!(error = %e, "MIB refresh failed");
                    }
                }
            }
        });

        Self {
            handle,
            stop_flag,
            failures,
        }
    }

    /// Signal the task to stop at its next tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Refresh cycles that failed so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Check if the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit.
    ///
    /// Returns false if the task panicked.
    pub async fn shutdown(self) -> bool {
        self.stop();
        match self.handle.await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Refresh task panicked");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ProcessMetricSource;
    use crate::stats::ServerStats;
    use mib_core::{
        start_processor, Context, DefaultNamespaceServer, IdentifierCatalog, LifecycleController,
        MetricKind, NamespaceServer, ObjectRegistry, Value,
    };

    struct Harness {
        stats: Arc<ServerStats>,
        server: Arc<DefaultNamespaceServer>,
        lifecycle: LifecycleHandle,
        processor: JoinHandle<()>,
    }

    fn setup() -> Harness {
        let stats = Arc::new(ServerStats::new());
        let source = Arc::new(ProcessMetricSource::new("test", "127.0.0.1:161", stats.clone()));
        let registry = Arc::new(ObjectRegistry::new(
            Arc::new(IdentifierCatalog::standard()),
            source,
        ));
        let controller = Arc::new(LifecycleController::new(registry));
        let (lifecycle, processor) = start_processor(controller, 16);
        Harness {
            stats,
            server: Arc::new(DefaultNamespaceServer::new()),
            lifecycle,
            processor,
        }
    }

    async fn init(harness: &Harness) {
        harness
            .lifecycle
            .send(LifecycleSignal::Init {
                server: harness.server.clone(),
                context: Context::default(),
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_picks_up_new_values() {
        let harness = setup();
        init(&harness).await;

        let requests = IdentifierCatalog::standard()
            .get(MetricKind::TotalRequests)
            .clone();
        harness.stats.record_request();
        harness.stats.record_request();

        let task = RefreshTask::start(harness.lifecycle.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        let object = harness
            .server
            .resolve(&requests, &Context::default())
            .unwrap();
        assert_eq!(object.value(), Value::Integer(2));
        assert_eq!(task.failures(), 0);

        assert!(task.shutdown().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_counted_not_fatal() {
        let harness = setup();

        // Never initialized: every tick fails with NotInitialized.
        let task = RefreshTask::start(harness.lifecycle.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert!(task.failures() >= 2);
        assert!(!task.is_finished());

        assert!(task.shutdown().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exits_after_teardown() {
        let harness = setup();
        init(&harness).await;

        let task = RefreshTask::start(harness.lifecycle.clone(), Duration::from_secs(1));
        harness
            .lifecycle
            .send(LifecycleSignal::Teardown)
            .await
            .unwrap();
        harness.processor.await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(task.is_finished());
        assert!(harness.server.is_empty());
        assert_eq!(task.failures(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_reports_panicked_task() {
        let task = RefreshTask {
            handle: tokio::spawn(async { panic!("refresh loop failed") }),
            stop_flag: Arc::new(AtomicBool::new(false)),
            failures: Arc::new(AtomicU64::new(0)),
        };

        assert!(!task.shutdown().await);
    }
}
