//! Object registry: owns the managed objects for one server binding.
//!
//! The registry samples every catalog metric from its [`MetricSource`],
//! wraps each value in a managed object, and registers the batch into a
//! shared [`NamespaceServer`] under a context. Periodic refreshes push new
//! values into the already-registered objects, so identifiers handed out to
//! readers keep resolving to the same instances.
//!
//! ## Locking
//!
//! ```text
//! state (Mutex)      objects + phase; held for every registry operation
//! object (RwLock)    per-object value; readers never touch the registry lock
//! ```
//!
//! Metric sampling happens before the registry lock is taken, and teardown
//! listeners run after it is released.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::catalog::IdentifierCatalog;
use crate::error::Error;
use crate::object::{ManagedObject, ManagedObjectFactory, ObjectSnapshot};
use crate::oid::{Context, Oid};
use crate::server::NamespaceServer;
use crate::source::MetricSource;
use crate::value::Value;

/// Shared namespace server handle.
pub type SharedNamespaceServer = Arc<dyn NamespaceServer>;

/// Callback run once when a registry is torn down.
pub type TeardownListener = Arc<dyn Fn(&ObjectRegistry) + Send + Sync>;

/// Batch registration against an explicit server and context.
pub trait ManagedObjectGroup {
    /// Register every owned object.
    ///
    /// Keeps going past collisions; fails afterwards with
    /// `DuplicateRegistration` naming every colliding identifier.
    fn register_objects(
        &self,
        server: &dyn NamespaceServer,
        context: &Context,
    ) -> Result<(), Error>;

    /// Unregister every owned object. Never fails.
    fn unregister_objects(&self, server: &dyn NamespaceServer, context: &Context);
}

/// Result of [`ObjectRegistry::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Objects newly registered.
    pub registered: usize,
    /// Identifiers that were already present in the context.
    pub duplicates: Vec<Oid>,
}

impl InitReport {
    /// Check if every object was registered.
    pub fn is_complete(&self) -> bool {
        self.duplicates.is_empty()
    }
}

#[derive(Clone)]
struct Binding {
    server: SharedNamespaceServer,
    context: Context,
}

enum Phase {
    Uninitialized,
    Active(Binding),
    /// Keeps the last binding so `unregister_all` still works.
    Terminated(Option<Binding>),
}

struct RegistryState {
    objects: Vec<Arc<ManagedObject>>,
    phase: Phase,
}

impl RegistryState {
    fn active_binding(&self) -> Result<&Binding, Error> {
        match &self.phase {
            Phase::Active(binding) => Ok(binding),
            Phase::Uninitialized => Err(Error::NotInitialized),
            Phase::Terminated(_) => Err(Error::Terminated),
        }
    }

    /// Resolve through the binding, accepting only an object this state owns.
    fn resolve_owned(
        &self,
        binding: &Binding,
        identifier: &Oid,
    ) -> Result<Arc<ManagedObject>, Error> {
        let object = binding
            .server
            .resolve(identifier, &binding.context)
            .ok_or_else(|| Error::ObjectNotRegistered {
                identifier: identifier.clone(),
                context: binding.context.clone(),
            })?;
        if !self.objects.iter().any(|owned| Arc::ptr_eq(owned, &object)) {
            return Err(Error::NotOwned {
                identifier: identifier.clone(),
                context: binding.context.clone(),
            });
        }
        Ok(object)
    }

    fn last_binding(&self) -> Option<&Binding> {
        match &self.phase {
            Phase::Active(binding) | Phase::Terminated(Some(binding)) => Some(binding),
            Phase::Uninitialized | Phase::Terminated(None) => None,
        }
    }
}

/// Counts from one pass of [`register_batch`].
struct BatchOutcome {
    registered: usize,
    duplicates: Vec<Oid>,
}

impl BatchOutcome {
    fn into_result(self, context: &Context) -> Result<usize, Error> {
        if self.duplicates.is_empty() {
            Ok(self.registered)
        } else {
            Err(Error::DuplicateRegistration {
                context: context.clone(),
                identifiers: self.duplicates,
            })
        }
    }
}

/// Registers objects in order, continuing past collisions.
///
/// Any server error other than `DuplicateRegistration` aborts the batch.
fn register_batch(
    objects: &[Arc<ManagedObject>],
    server: &dyn NamespaceServer,
    context: &Context,
) -> Result<BatchOutcome, Error> {
    let mut outcome = BatchOutcome {
        registered: 0,
        duplicates: Vec::new(),
    };

    for object in objects {
        match server.register(object.clone(), context) {
            Ok(()) => outcome.registered += 1,
            Err(Error::DuplicateRegistration { identifiers, .. }) => {
                debug!(
                    context = %context,
                    identifier = %object.identifier(),
                    "identifier already registered"
                );
                outcome.duplicates.extend(identifiers);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}

fn unregister_batch(
    objects: &[Arc<ManagedObject>],
    server: &dyn NamespaceServer,
    context: &Context,
) {
    for object in objects {
        server.unregister(object, context);
    }
}

/// Owns and drives the managed objects for one server binding.
pub struct ObjectRegistry {
    catalog: Arc<IdentifierCatalog>,
    source: Arc<dyn MetricSource>,
    state: Mutex<RegistryState>,
    teardown_listeners: RwLock<Vec<TeardownListener>>,
}

impl ObjectRegistry {
    /// Create an unbound registry.
    pub fn new(catalog: Arc<IdentifierCatalog>, source: Arc<dyn MetricSource>) -> Self {
        Self {
            catalog,
            source,
            state: Mutex::new(RegistryState {
                objects: Vec::new(),
                phase: Phase::Uninitialized,
            }),
            teardown_listeners: RwLock::new(Vec::new()),
        }
    }

    fn sample_all(&self) -> Vec<(Oid, Value)> {
        self.catalog
            .iter()
            .map(|(kind, oid)| (oid.clone(), kind.sample(self.source.as_ref())))
            .collect()
    }

    /// Bind to a server and context, create one object per catalog metric,
    /// and register every owned object.
    ///
    /// Collisions are logged and tolerated: the registry stays active with
    /// whatever did register, and the report lists the rest.
    pub fn initialize(
        &self,
        server: SharedNamespaceServer,
        context: Context,
    ) -> Result<InitReport, Error> {
        let samples = self.sample_all();

        let mut state = self.state.lock();
        if let Phase::Terminated(_) = state.phase {
            return Err(Error::Terminated);
        }

        let binding = Binding { server, context };
        state.phase = Phase::Active(binding.clone());

        debug!(context = %binding.context, "registering MIB objects");
        state.objects.extend(
            samples
                .into_iter()
                .map(|(oid, value)| ManagedObjectFactory::read_write(oid, value)),
        );

        let outcome = register_batch(
            &state.objects,
            binding.server.as_ref(),
            &binding.context,
        )?;
        if !outcome.duplicates.is_empty() {
            let rendered: Vec<String> = outcome.duplicates.iter().map(|o| o.to_string()).collect();
            warn!(
                context = %binding.context,
                duplicates = outcome.duplicates.len(),
                identifiers = ?rendered,
                "duplicate MIB registrations ignored"
            );
        }
        let report = InitReport {
            registered: outcome.registered,
            duplicates: outcome.duplicates,
        };

        debug!(
            context = %binding.context,
            registered = report.registered,
            "MIB objects registered"
        );
        Ok(report)
    }

    /// Append an object to the owned set. Collisions surface at registration.
    pub fn add_managed_object(&self, object: Arc<ManagedObject>) {
        self.state.lock().objects.push(object);
    }

    /// Remove an object by identity. Returns whether it was owned.
    pub fn remove_managed_object(&self, object: &Arc<ManagedObject>) -> bool {
        let mut state = self.state.lock();
        match state.objects.iter().position(|o| Arc::ptr_eq(o, object)) {
            Some(index) => {
                state.objects.remove(index);
                true
            }
            None => false,
        }
    }

    /// Register every owned object into the bound server and context.
    ///
    /// Not atomic: objects before and after a collision are still
    /// registered, and the error lists only the colliding identifiers.
    pub fn register_all(&self) -> Result<(), Error> {
        let state = self.state.lock();
        let binding = state.active_binding()?;
        register_batch(&state.objects, binding.server.as_ref(), &binding.context)?
            .into_result(&binding.context)
            .map(|_| ())
    }

    /// Unregister every owned object from the bound server and context.
    ///
    /// Idempotent. Only fails if the registry was never bound.
    pub fn unregister_all(&self) -> Result<(), Error> {
        let state = self.state.lock();
        let binding = state.last_binding().ok_or(Error::NotInitialized)?;
        unregister_batch(&state.objects, binding.server.as_ref(), &binding.context);
        debug!(
            context = %binding.context,
            objects = state.objects.len(),
            "MIB objects unregistered"
        );
        Ok(())
    }

    /// Re-sample every catalog metric and push the values into the
    /// registered objects.
    ///
    /// Every identifier is resolved before anything is written. A missing
    /// object fails the whole cycle with `ObjectNotRegistered`, and an object
    /// owned by someone else fails it with `NotOwned`; either way all values
    /// stay untouched. Returns the number of objects updated.
    pub fn refresh_values(&self) -> Result<usize, Error> {
        self.state.lock().active_binding().map(|_| ())?;

        let samples = self.sample_all();

        let state = self.state.lock();
        let binding = state.active_binding()?;

        let resolved = samples
            .into_iter()
            .map(|(identifier, value)| {
                let object = state.resolve_owned(binding, &identifier)?;
                Ok((object, value))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        for (object, value) in &resolved {
            object.set_value(value.clone());
        }

        trace!(context = %binding.context, updated = resolved.len(), "MIB values refreshed");
        Ok(resolved.len())
    }

    /// Resolve an identifier through the bound server and context.
    pub fn find_managed_object(
        &self,
        identifier: &Oid,
    ) -> Result<Option<Arc<ManagedObject>>, Error> {
        let state = self.state.lock();
        let binding = state.active_binding()?;
        Ok(binding.server.resolve(identifier, &binding.context))
    }

    /// Resolve an identifier and replace its value in place.
    ///
    /// Only objects this registry owns can be written. Returns the previous
    /// value.
    pub fn set_value(&self, identifier: &Oid, value: Value) -> Result<Value, Error> {
        let state = self.state.lock();
        let binding = state.active_binding()?;
        let object = state.resolve_owned(binding, identifier)?;
        Ok(object.set_value(value))
    }

    /// Replace the server and context binding without registering anything.
    pub fn rebind(&self, server: SharedNamespaceServer, context: Context) -> Result<(), Error> {
        let mut state = self.state.lock();
        if let Phase::Terminated(_) = state.phase {
            return Err(Error::Terminated);
        }
        state.phase = Phase::Active(Binding { server, context });
        Ok(())
    }

    /// Register a callback to run on teardown.
    pub fn on_teardown<F>(&self, listener: F)
    where
        F: Fn(&ObjectRegistry) + Send + Sync + 'static,
    {
        self.teardown_listeners.write().push(Arc::new(listener));
    }

    /// Unregister everything, enter the terminal phase, and notify teardown
    /// listeners.
    ///
    /// Only the first call does anything; returns whether this was it.
    pub fn terminate(&self) -> bool {
        {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.phase, Phase::Terminated(None));
            match previous {
                Phase::Terminated(binding) => {
                    state.phase = Phase::Terminated(binding);
                    return false;
                }
                Phase::Active(binding) => {
                    unregister_batch(&state.objects, binding.server.as_ref(), &binding.context);
                    info!(
                        context = %binding.context,
                        objects = state.objects.len(),
                        "MIB terminated"
                    );
                    state.phase = Phase::Terminated(Some(binding));
                }
                Phase::Uninitialized => {
                    debug!("MIB terminated before initialization");
                }
            }
        }

        let listeners = self.teardown_listeners.read().clone();
        for listener in listeners {
            listener(self);
        }
        true
    }

    /// Check if the registry is bound and not terminated.
    pub fn is_active(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Active(_))
    }

    /// Check if the registry has been torn down.
    pub fn is_terminated(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Terminated(_))
    }

    /// Bound context, if any.
    pub fn context(&self) -> Option<Context> {
        self.state.lock().last_binding().map(|b| b.context.clone())
    }

    /// Bound server, if any.
    pub fn server(&self) -> Option<SharedNamespaceServer> {
        self.state.lock().last_binding().map(|b| b.server.clone())
    }

    /// Number of owned objects.
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Owned objects, in insertion order.
    pub fn objects(&self) -> Vec<Arc<ManagedObject>> {
        self.state.lock().objects.clone()
    }

    /// Snapshot of every owned object.
    pub fn snapshot(&self) -> Vec<ObjectSnapshot> {
        self.objects().iter().map(|o| o.snapshot()).collect()
    }

    /// Identifier catalog.
    pub fn catalog(&self) -> &IdentifierCatalog {
        &self.catalog
    }

    /// Metric source.
    pub fn source(&self) -> &Arc<dyn MetricSource> {
        &self.source
    }
}

impl ManagedObjectGroup for ObjectRegistry {
    fn register_objects(
        &self,
        server: &dyn NamespaceServer,
        context: &Context,
    ) -> Result<(), Error> {
        let state = self.state.lock();
        if let Phase::Terminated(_) = state.phase {
            return Err(Error::Terminated);
        }
        register_batch(&state.objects, server, context)?
            .into_result(context)
            .map(|_| ())
    }

    fn unregister_objects(&self, server: &dyn NamespaceServer, context: &Context) {
        let state = self.state.lock();
        unregister_batch(&state.objects, server, context);
    }
}

impl Drop for ObjectRegistry {
    fn drop(&mut self) {
        self.terminate();
    }
}
