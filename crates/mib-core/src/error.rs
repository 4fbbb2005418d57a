//! Core error types.

use thiserror::Error;

use crate::catalog::MetricKind;
use crate::oid::{Context, Oid};

/// Registry and namespace errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// One or more identifiers were already registered in the context.
    #[error("duplicate registration in context '{context}': {}", join_oids(.identifiers))]
    DuplicateRegistration {
        /// Context the registration was attempted in.
        context: Context,
        /// Identifiers that collided.
        identifiers: Vec<Oid>,
    },

    /// Identifier did not resolve to a managed object.
    #[error("no managed object registered for {identifier} in context '{context}'")]
    ObjectNotRegistered {
        /// Identifier that was looked up.
        identifier: Oid,
        /// Context the lookup ran in.
        context: Context,
    },

    /// Identifier resolves to an object this registry does not own.
    #[error("managed object {identifier} in context '{context}' belongs to another owner")]
    NotOwned {
        /// Identifier that was looked up.
        identifier: Oid,
        /// Context the lookup ran in.
        context: Context,
    },

    /// Lifecycle processor is no longer accepting signals.
    #[error("lifecycle processor has stopped")]
    ControllerStopped,

    /// Operation requires a bound namespace server.
    #[error("registry is not initialized")]
    NotInitialized,

    /// Registry has been torn down.
    #[error("registry has been terminated")]
    Terminated,

    /// Init signal delivered more than once.
    #[error("registry is already initialized")]
    AlreadyInitialized,

    /// Malformed dotted identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Catalog has no identifier for a metric.
    #[error("catalog has no identifier for metric '{0}'")]
    MissingIdentifier(MetricKind),

    /// Catalog maps two metrics to the same identifier.
    #[error("catalog maps more than one metric to {0}")]
    DuplicateIdentifier(Oid),

    /// External write to a read-only object.
    #[error("managed object {0} is read-only")]
    NotWritable(Oid),
}

fn join_oids(oids: &[Oid]) -> String {
    oids.iter()
        .map(|oid| oid.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
