//! Integration tests for the object registry.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;

use mib_core::{
    Context, DefaultNamespaceServer, Error, IdentifierCatalog, ManagedObjectFactory, MetricKind,
    MetricSource, NamespaceServer, ObjectRegistry, Oid, Value,
};

/// Metric source whose answers tests can change between calls.
struct StubSource {
    uptime: RwLock<String>,
    sessions: AtomicI64,
    requests: AtomicI64,
}

impl StubSource {
    fn new() -> Self {
        Self {
            uptime: RwLock::new("120s".to_string()),
            sessions: AtomicI64::new(3),
            requests: AtomicI64::new(100),
        }
    }

    fn set_uptime(&self, uptime: &str) {
        *self.uptime.write() = uptime.to_string();
    }
}

impl MetricSource for StubSource {
    fn server_name(&self) -> String {
        "stub-server".to_string()
    }

    fn server_address(&self) -> String {
        "10.0.0.7:4848".to_string()
    }

    fn uptime(&self) -> String {
        self.uptime.read().clone()
    }

    fn active_sessions(&self) -> i64 {
        self.sessions.load(Ordering::SeqCst)
    }

    fn used_memory(&self) -> i64 {
        512 * 1024 * 1024
    }

    fn available_memory(&self) -> i64 {
        1024 * 1024 * 1024
    }

    fn cpu_time_ms(&self) -> i64 {
        4_200
    }

    fn active_transactions(&self) -> i64 {
        2
    }

    fn committed_transactions(&self) -> i64 {
        40
    }

    fn rolled_back_transactions(&self) -> i64 {
        1
    }

    fn active_threads(&self) -> i64 {
        16
    }

    fn total_requests(&self) -> i64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn log(&self) -> Vec<u8> {
        b"INFO server started".to_vec()
    }
}

struct TestContext {
    source: Arc<StubSource>,
    catalog: Arc<IdentifierCatalog>,
    server: Arc<DefaultNamespaceServer>,
    registry: ObjectRegistry,
}

impl TestContext {
    fn new() -> Self {
        let source = Arc::new(StubSource::new());
        let catalog = Arc::new(IdentifierCatalog::standard());
        let server = Arc::new(DefaultNamespaceServer::new());
        let registry = ObjectRegistry::new(catalog.clone(), source.clone());
        Self {
            source,
            catalog,
            server,
            registry,
        }
    }

    fn initialize(&self) {
        let report = self
            .registry
            .initialize(self.server.clone(), Context::default())
            .unwrap();
        assert!(report.is_complete());
    }

    fn oid(&self, kind: MetricKind) -> Oid {
        self.catalog.get(kind).clone()
    }
}

fn oid(s: &str) -> Oid {
    s.parse().unwrap()
}

#[test]
fn test_register_all_partial_success_on_collision() {
    let ctx = TestContext::new();
    ctx.registry
        .rebind(ctx.server.clone(), Context::default())
        .unwrap();

    // Something else already owns 1.3.6.1.99.2 in this context.
    let foreign = ManagedObjectFactory::read_only(oid("1.3.6.1.99.2"), "foreign");
    ctx.server.register(foreign.clone(), &Context::default()).unwrap();

    let owned: Vec<_> = ["1.3.6.1.99.1", "1.3.6.1.99.2", "1.3.6.1.99.3"]
        .iter()
        .map(|s| ManagedObjectFactory::read_write(oid(s), "mine"))
        .collect();
    for object in &owned {
        ctx.registry.add_managed_object(object.clone());
    }

    let err = ctx.registry.register_all().unwrap_err();
    assert_eq!(
        err,
        Error::DuplicateRegistration {
            context: Context::default(),
            identifiers: vec![oid("1.3.6.1.99.2")],
        }
    );

    // Objects on either side of the collision are registered.
    for object in [&owned[0], &owned[2]] {
        let found = ctx
            .registry
            .find_managed_object(object.identifier())
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&found, object));
    }

    // The colliding identifier still resolves to the original owner.
    let found = ctx
        .registry
        .find_managed_object(&oid("1.3.6.1.99.2"))
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&found, &foreign));
}

#[test]
fn test_initialize_tolerates_duplicates() {
    let ctx = TestContext::new();
    let uptime = ctx.oid(MetricKind::ServerUptime);

    let squatter = ManagedObjectFactory::read_only(uptime.clone(), "squatter");
    ctx.server.register(squatter.clone(), &Context::default()).unwrap();

    let report = ctx
        .registry
        .initialize(ctx.server.clone(), Context::default())
        .unwrap();

    assert_eq!(report.duplicates, vec![uptime.clone()]);
    assert_eq!(report.registered, MetricKind::ALL.len() - 1);
    assert!(ctx.registry.is_active());
    assert_eq!(ctx.registry.object_count(), MetricKind::ALL.len());

    let sessions = ctx.oid(MetricKind::ActiveSessions);
    let found = ctx.registry.find_managed_object(&sessions).unwrap().unwrap();
    assert_eq!(found.value(), Value::Integer(3));
}

#[test]
fn test_refresh_leaves_foreign_object_alone() {
    let ctx = TestContext::new();
    let uptime = ctx.oid(MetricKind::ServerUptime);
    let sessions = ctx.oid(MetricKind::ActiveSessions);

    let squatter = ManagedObjectFactory::read_only(uptime.clone(), "squatter");
    ctx.server.register(squatter.clone(), &Context::default()).unwrap();

    let report = ctx
        .registry
        .initialize(ctx.server.clone(), Context::default())
        .unwrap();
    assert_eq!(report.duplicates, vec![uptime.clone()]);

    ctx.source.set_uptime("180s");
    ctx.source.sessions.store(42, Ordering::SeqCst);
    let not_owned = Error::NotOwned {
        identifier: uptime.clone(),
        context: Context::default(),
    };
    assert_eq!(ctx.registry.refresh_values(), Err(not_owned.clone()));

    // The other owner's object keeps its value, and the failed cycle wrote
    // nothing to objects this registry does own.
    assert_eq!(squatter.value(), Value::from("squatter"));
    let object = ctx.registry.find_managed_object(&sessions).unwrap().unwrap();
    assert_eq!(object.value(), Value::Integer(3));

    assert_eq!(
        ctx.registry.set_value(&uptime, Value::from("overwritten")),
        Err(not_owned)
    );
    assert_eq!(squatter.value(), Value::from("squatter"));
}

#[test]
fn test_initialize_twice_collides_with_itself() {
    let ctx = TestContext::new();
    ctx.initialize();

    let report = ctx
        .registry
        .initialize(ctx.server.clone(), Context::default())
        .unwrap();

    // The first batch is already registered and the second batch shares
    // its identifiers, so every owned object collides.
    assert_eq!(report.registered, 0);
    assert_eq!(ctx.registry.object_count(), 2 * MetricKind::ALL.len());
    assert_eq!(report.duplicates.len(), 2 * MetricKind::ALL.len());
    assert_eq!(ctx.server.len(), MetricKind::ALL.len());
}

#[test]
fn test_unregister_all_removes_everything() {
    let ctx = TestContext::new();
    ctx.initialize();

    ctx.registry.unregister_all().unwrap();

    for (_, identifier) in ctx.catalog.iter() {
        assert!(ctx.registry.find_managed_object(identifier).unwrap().is_none());
    }
    assert!(ctx.server.is_empty());
}

#[test]
fn test_unregister_all_is_idempotent() {
    let ctx = TestContext::new();
    ctx.initialize();

    ctx.registry.unregister_all().unwrap();
    let after_first = ctx.server.len();
    let owned_first = ctx.registry.object_count();

    ctx.registry.unregister_all().unwrap();
    assert_eq!(ctx.server.len(), after_first);
    assert_eq!(ctx.registry.object_count(), owned_first);
}

#[test]
fn test_refresh_tracks_source() {
    let ctx = TestContext::new();
    ctx.initialize();

    ctx.source.sessions.store(11, Ordering::SeqCst);
    ctx.source.requests.store(2_500, Ordering::SeqCst);

    let updated = ctx.registry.refresh_values().unwrap();
    assert_eq!(updated, MetricKind::ALL.len());

    for (kind, identifier) in ctx.catalog.iter() {
        let object = ctx.registry.find_managed_object(identifier).unwrap().unwrap();
        assert_eq!(object.value(), kind.sample(&*ctx.source), "{}", kind);
    }
}

#[test]
fn test_refresh_before_initialize_mutates_nothing() {
    let ctx = TestContext::new();
    let probe = ManagedObjectFactory::read_write(ctx.oid(MetricKind::ServerUptime), "untouched");
    ctx.registry.add_managed_object(probe.clone());

    assert_eq!(ctx.registry.refresh_values(), Err(Error::NotInitialized));
    assert_eq!(probe.value(), Value::from("untouched"));
    assert!(ctx.server.is_empty());
}

#[test]
fn test_set_value_then_find() {
    let ctx = TestContext::new();
    ctx.initialize();
    let name = ctx.oid(MetricKind::ServerName);

    let previous = ctx.registry.set_value(&name, Value::from("renamed")).unwrap();
    assert_eq!(previous, Value::from("stub-server"));

    let object = ctx.registry.find_managed_object(&name).unwrap().unwrap();
    assert_eq!(object.value(), Value::from("renamed"));

    let missing = oid("1.3.6.1.4.1.1.1");
    assert_eq!(
        ctx.registry.set_value(&missing, Value::Integer(1)),
        Err(Error::ObjectNotRegistered {
            identifier: missing.clone(),
            context: Context::default(),
        })
    );
}

#[test]
fn test_uptime_refresh_preserves_identity() {
    let ctx = TestContext::new();
    ctx.initialize();
    let uptime = ctx.oid(MetricKind::ServerUptime);

    let before = ctx.registry.find_managed_object(&uptime).unwrap().unwrap();
    assert_eq!(before.value(), Value::from("120s"));

    ctx.source.set_uptime("180s");
    ctx.registry.refresh_values().unwrap();

    let after = ctx.registry.find_managed_object(&uptime).unwrap().unwrap();
    assert_eq!(after.value(), Value::from("180s"));
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn test_refresh_fails_when_object_missing() {
    let ctx = TestContext::new();
    ctx.initialize();

    let uptime = ctx.oid(MetricKind::ServerUptime);
    let sessions = ctx.oid(MetricKind::ActiveSessions);
    let object = ctx.registry.find_managed_object(&uptime).unwrap().unwrap();
    ctx.server.unregister(&object, &Context::default());

    ctx.source.sessions.store(99, Ordering::SeqCst);
    let err = ctx.registry.refresh_values().unwrap_err();
    assert_eq!(
        err,
        Error::ObjectNotRegistered {
            identifier: uptime,
            context: Context::default(),
        }
    );

    // Nothing was written, including metrics that did resolve.
    let object = ctx.registry.find_managed_object(&sessions).unwrap().unwrap();
    assert_eq!(object.value(), Value::Integer(3));
}

#[test]
fn test_contexts_isolate_registries() {
    let server = Arc::new(DefaultNamespaceServer::new());
    let catalog = Arc::new(IdentifierCatalog::standard());
    let first = ObjectRegistry::new(catalog.clone(), Arc::new(StubSource::new()));
    let second = ObjectRegistry::new(catalog.clone(), Arc::new(StubSource::new()));

    assert!(first
        .initialize(server.clone(), Context::from("node-a"))
        .unwrap()
        .is_complete());
    assert!(second
        .initialize(server.clone(), Context::from("node-b"))
        .unwrap()
        .is_complete());
    assert_eq!(server.len(), 2 * MetricKind::ALL.len());

    first.terminate();
    assert_eq!(server.len(), MetricKind::ALL.len());
    assert_eq!(server.contexts(), vec![Context::from("node-b")]);
    assert!(second.refresh_values().is_ok());
}

#[test]
fn test_concurrent_refresh_and_unregister() {
    let ctx = Arc::new(TestContext::new());
    ctx.initialize();

    let unregistered = Arc::new(AtomicBool::new(false));

    let refresher = {
        let ctx = ctx.clone();
        let unregistered = unregistered.clone();
        thread::spawn(move || {
            let mut failures_after_unregister = 0;
            for i in 0..2_000 {
                ctx.source.requests.store(i, Ordering::SeqCst);
                // Read the flag before refreshing: if the unregister had
                // already completed, this refresh must fail.
                let done = unregistered.load(Ordering::SeqCst);
                match ctx.registry.refresh_values() {
                    Ok(count) => {
                        assert!(!done, "refresh succeeded after unregister");
                        assert_eq!(count, MetricKind::ALL.len());
                    }
                    Err(Error::ObjectNotRegistered { .. }) => failures_after_unregister += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            failures_after_unregister
        })
    };

    let unregisterer = {
        let ctx = ctx.clone();
        let unregistered = unregistered.clone();
        thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(1));
            ctx.registry.unregister_all().unwrap();
            unregistered.store(true, Ordering::SeqCst);
        })
    };

    unregisterer.join().unwrap();
    refresher.join().unwrap();

    // After the unregister completed, every refresh fails.
    for _ in 0..10 {
        assert!(matches!(
            ctx.registry.refresh_values(),
            Err(Error::ObjectNotRegistered { .. })
        ));
    }
    assert!(ctx.server.is_empty());
}
