//! Lifecycle signals and the controller that applies them to a registry.
//!
//! Signals are normally delivered through a [`LifecycleProcessor`] task:
//! callers hold a [`LifecycleHandle`], and the processor applies one signal
//! at a time until teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::oid::Context;
use crate::registry::{InitReport, ObjectRegistry, SharedNamespaceServer};

/// Event driving a registry through its lifecycle.
pub enum LifecycleSignal {
    /// Bind and register. Delivered at most once.
    Init {
        server: SharedNamespaceServer,
        context: Context,
    },
    /// Re-sample every metric.
    Refresh,
    /// Unregister and stop. Terminal.
    Teardown,
}

impl LifecycleSignal {
    /// Signal name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleSignal::Init { .. } => "init",
            LifecycleSignal::Refresh => "refresh",
            LifecycleSignal::Teardown => "teardown",
        }
    }
}

impl fmt::Debug for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleSignal::Init { context, .. } => f
                .debug_struct("Init")
                .field("context", context)
                .finish_non_exhaustive(),
            LifecycleSignal::Refresh => f.write_str("Refresh"),
            LifecycleSignal::Teardown => f.write_str("Teardown"),
        }
    }
}

/// What a dispatched signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Initialized(InitReport),
    Refreshed(usize),
    TornDown,
}

/// Applies lifecycle signals to one registry, enforcing delivery order.
pub struct LifecycleController {
    registry: Arc<ObjectRegistry>,
    initialized: AtomicBool,
}

impl LifecycleController {
    /// Create a controller for a registry.
    pub fn new(registry: Arc<ObjectRegistry>) -> Self {
        Self {
            registry,
            initialized: AtomicBool::new(false),
        }
    }

    /// The controlled registry.
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Apply one signal.
    ///
    /// A second `Init` fails with `AlreadyInitialized`; anything after
    /// `Teardown` fails with `Terminated`. `Refresh` before `Init` surfaces
    /// the registry's `NotInitialized`.
    pub fn dispatch(&self, signal: LifecycleSignal) -> Result<SignalOutcome, Error> {
        if self.registry.is_terminated() {
            return Err(Error::Terminated);
        }

        match signal {
            LifecycleSignal::Init { server, context } => {
                if self
                    .initialized
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return Err(Error::AlreadyInitialized);
                }
                let report = self.registry.initialize(server, context)?;
                info!(
                    registered = report.registered,
                    duplicates = report.duplicates.len(),
                    "MIB initialized"
                );
                Ok(SignalOutcome::Initialized(report))
            }
            LifecycleSignal::Refresh => {
                self.registry.refresh_values().map(SignalOutcome::Refreshed)
            }
            LifecycleSignal::Teardown => {
                self.registry.terminate();
                Ok(SignalOutcome::TornDown)
            }
        }
    }
}

/// A signal in flight, with an optional slot for its outcome.
#[derive(Debug)]
pub struct LifecycleRequest {
    signal: LifecycleSignal,
    reply: Option<oneshot::Sender<Result<SignalOutcome, Error>>>,
}

impl LifecycleRequest {
    /// A request whose outcome is only logged.
    pub fn notify(signal: LifecycleSignal) -> Self {
        Self {
            signal,
            reply: None,
        }
    }

    /// The carried signal.
    pub fn signal(&self) -> &LifecycleSignal {
        &self.signal
    }
}

/// Lifecycle channel sender.
pub type LifecycleSender = mpsc::Sender<LifecycleRequest>;

/// Lifecycle channel receiver.
pub type LifecycleReceiver = mpsc::Receiver<LifecycleRequest>;

/// Create a lifecycle channel with the given buffer size.
pub fn channel(buffer_size: usize) -> (LifecycleSender, LifecycleReceiver) {
    mpsc::channel(buffer_size)
}

/// Applies signals from a channel to a controller, one at a time.
pub struct LifecycleProcessor {
    rx: LifecycleReceiver,
    controller: Arc<LifecycleController>,
}

impl LifecycleProcessor {
    /// Create a processor reading from `rx`.
    pub fn new(rx: LifecycleReceiver, controller: Arc<LifecycleController>) -> Self {
        Self { rx, controller }
    }

    /// Process signals until teardown or until every sender is dropped.
    ///
    /// Failures are logged and the loop moves on to the next signal.
    pub async fn run(mut self) {
        info!("lifecycle processor started");

        while let Some(request) = self.rx.recv().await {
            let name = request.signal.name();
            let result = self.controller.dispatch(request.signal);

            match &result {
                Ok(outcome) => {
                    debug!(signal = name, outcome = ?outcome, "lifecycle signal applied")
                }
                Err(e) => error!(signal = name, error = %e, "lifecycle signal failed"),
            }
            let torn_down = matches!(result, Ok(SignalOutcome::TornDown));

            if let Some(reply) = request.reply {
                if reply.send(result).is_err() {
                    debug!(signal = name, "lifecycle reply dropped by caller");
                }
            }

            if torn_down {
                info!("lifecycle processor stopped (teardown)");
                return;
            }
        }

        info!("lifecycle processor stopped (channel closed)");
    }
}

/// Cloneable handle for submitting signals to a running processor.
#[derive(Clone)]
pub struct LifecycleHandle {
    tx: LifecycleSender,
}

impl LifecycleHandle {
    /// Create a handle around a sender.
    pub fn new(tx: LifecycleSender) -> Self {
        Self { tx }
    }

    /// Submit a signal without waiting for its outcome.
    ///
    /// Fails immediately if the channel is full or closed.
    pub fn try_notify(
        &self,
        signal: LifecycleSignal,
    ) -> Result<(), mpsc::error::TrySendError<LifecycleRequest>> {
        self.tx.try_send(LifecycleRequest::notify(signal))
    }

    /// Submit a signal and wait for the processor to apply it.
    ///
    /// Fails with `ControllerStopped` once the processor has exited.
    pub async fn send(&self, signal: LifecycleSignal) -> Result<SignalOutcome, Error> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(LifecycleRequest {
                signal,
                reply: Some(reply),
            })
            .await
            .map_err(|_| Error::ControllerStopped)?;
        outcome.await.map_err(|_| Error::ControllerStopped)?
    }

    /// Check if the processor has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Get a reference to the sender.
    pub fn sender(&self) -> &LifecycleSender {
        &self.tx
    }
}

/// Spawn a processor for `controller` and return a handle to it.
pub fn start_processor(
    controller: Arc<LifecycleController>,
    buffer_size: usize,
) -> (LifecycleHandle, JoinHandle<()>) {
    let (tx, rx) = channel(buffer_size);
    let processor = LifecycleProcessor::new(rx, controller);

    let task = tokio::spawn(async move {
        processor.run().await;
    });

    (LifecycleHandle::new(tx), task)
}
