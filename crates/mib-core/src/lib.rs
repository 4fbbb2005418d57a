//! MIB Core - Managed-object registry for live server metrics.
//!
//! This crate maps well-known server metrics onto typed managed objects
//! under a hierarchical numeric namespace, registers them into a shared
//! namespace server, and keeps their values fresh.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use mib_core::{Context, DefaultNamespaceServer, IdentifierCatalog, ObjectRegistry};
//!
//! let registry = ObjectRegistry::new(Arc::new(IdentifierCatalog::standard()), source);
//! let server = Arc::new(DefaultNamespaceServer::new());
//!
//! registry.initialize(server, Context::default())?;
//! registry.refresh_values()?;
//! registry.terminate();
//! ```

pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod object;
pub mod oid;
pub mod registry;
pub mod server;
pub mod source;
pub mod value;

pub use catalog::{CatalogEntry, IdentifierCatalog, MetricKind};
pub use error::{Error, Result};
pub use lifecycle::{
    start_processor, LifecycleController, LifecycleHandle, LifecycleProcessor, LifecycleReceiver,
    LifecycleRequest, LifecycleSender, LifecycleSignal, SignalOutcome,
};
pub use object::{AccessMode, ManagedObject, ManagedObjectFactory, ObjectSnapshot};
pub use oid::{Context, Oid};
pub use registry::{
    InitReport, ManagedObjectGroup, ObjectRegistry, SharedNamespaceServer, TeardownListener,
};
pub use server::{DefaultNamespaceServer, NamespaceServer};
pub use source::MetricSource;
pub use value::Value;
