//! Managed objects and the factory that builds them.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::oid::Oid;
use crate::value::Value;

/// Access mode advertised to external managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Readable only.
    ReadOnly,
    /// Readable and writable.
    ReadWrite,
}

impl AccessMode {
    /// Whether external writes are permitted.
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// A single externally addressable scalar.
///
/// The identifier and access mode are fixed at construction. The value is
/// replaced in place, so every holder of the `Arc` observes updates.
#[derive(Debug)]
pub struct ManagedObject {
    identifier: Oid,
    access: AccessMode,
    value: RwLock<Value>,
}

impl ManagedObject {
    /// Identifier.
    pub fn identifier(&self) -> &Oid {
        &self.identifier
    }

    /// Access mode.
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Current value.
    pub fn value(&self) -> Value {
        self.value.read().clone()
    }

    /// Replace the value, returning the previous one.
    ///
    /// Ignores the access mode; this is the owner's update path.
    pub fn set_value(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.value.write(), value)
    }

    /// Write on behalf of an external manager.
    pub fn write(&self, value: Value) -> Result<Value, Error> {
        if !self.access.is_writable() {
            return Err(Error::NotWritable(self.identifier.clone()));
        }
        Ok(self.set_value(value))
    }

    /// Point-in-time copy for diagnostics.
    pub fn snapshot(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            identifier: self.identifier.clone(),
            value: self.value(),
            access: self.access,
        }
    }
}

/// Serializable copy of a managed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub identifier: Oid,
    pub value: Value,
    pub access: AccessMode,
}

/// Builds managed objects ready for registration.
pub struct ManagedObjectFactory;

impl ManagedObjectFactory {
    /// Create an object with the given access mode.
    pub fn create(
        identifier: Oid,
        value: impl Into<Value>,
        access: AccessMode,
    ) -> Arc<ManagedObject> {
        Arc::new(ManagedObject {
            identifier,
            access,
            value: RwLock::new(value.into()),
        })
    }

    /// Create a read-only object.
    pub fn read_only(identifier: Oid, value: impl Into<Value>) -> Arc<ManagedObject> {
        Self::create(identifier, value, AccessMode::ReadOnly)
    }

    /// Create a read-write object.
    pub fn read_write(identifier: Oid, value: impl Into<Value>) -> Arc<ManagedObject> {
        Self::create(identifier, value, AccessMode::ReadWrite)
    }

    /// Create an object from a dotted identifier string.
    pub fn parse(
        identifier: &str,
        value: impl Into<Value>,
        access: AccessMode,
    ) -> Result<Arc<ManagedObject>, Error> {
        Ok(Self::create(identifier.parse()?, value, access))
    }
}
