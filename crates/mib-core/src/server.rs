//! Namespace server: the shared table external readers resolve against.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::Error;
use crate::object::ManagedObject;
use crate::oid::{Context, Oid};

/// Table resolving `(identifier, context)` to managed objects.
///
/// Registration hands the server a shared reference; ownership of the
/// object's lifecycle stays with whoever created it.
pub trait NamespaceServer: Send + Sync {
    /// Register an object under a context.
    ///
    /// Fails with `DuplicateRegistration` if the identifier is already
    /// present in that context.
    fn register(&self, object: Arc<ManagedObject>, context: &Context) -> Result<(), Error>;

    /// Unregister an object from a context. Absent objects are ignored.
    fn unregister(&self, object: &Arc<ManagedObject>, context: &Context);

    /// Resolve an identifier within a context.
    fn resolve(&self, identifier: &Oid, context: &Context) -> Option<Arc<ManagedObject>>;
}

/// In-memory namespace server shared by any number of registries.
#[derive(Default)]
pub struct DefaultNamespaceServer {
    objects: DashMap<(Context, Oid), Arc<ManagedObject>>,
}

impl DefaultNamespaceServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total registrations across all contexts.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Contexts with at least one registration, sorted.
    pub fn contexts(&self) -> Vec<Context> {
        self.objects
            .iter()
            .map(|entry| entry.key().0.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Objects registered in a context, in identifier order.
    pub fn walk(&self, context: &Context) -> Vec<Arc<ManagedObject>> {
        let mut objects: Vec<Arc<ManagedObject>> = self
            .objects
            .iter()
            .filter(|entry| &entry.key().0 == context)
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        objects
    }
}

impl NamespaceServer for DefaultNamespaceServer {
    fn register(&self, object: Arc<ManagedObject>, context: &Context) -> Result<(), Error> {
        let key = (context.clone(), object.identifier().clone());
        match self.objects.entry(key) {
            Entry::Occupied(_) => Err(Error::DuplicateRegistration {
                context: context.clone(),
                identifiers: vec![object.identifier().clone()],
            }),
            Entry::Vacant(slot) => {
                slot.insert(object);
                Ok(())
            }
        }
    }

    fn unregister(&self, object: &Arc<ManagedObject>, context: &Context) {
        let key = (context.clone(), object.identifier().clone());
        self.objects
            .remove_if(&key, |_, registered| Arc::ptr_eq(registered, object));
    }

    fn resolve(&self, identifier: &Oid, context: &Context) -> Option<Arc<ManagedObject>> {
        let key = (context.clone(), identifier.clone());
        self.objects.get(&key).map(|entry| entry.value().clone())
    }
}
