//! Hierarchical numeric identifiers and namespace contexts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Hierarchical numeric path, e.g. `1.3.6.1.4.1.53864.1.3`.
///
/// Ordering is arc by arc, so sorting a set of identifiers yields the
/// lexicographic order used when walking a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    /// Build an identifier from its arcs.
    pub fn from_arcs(arcs: impl Into<Vec<u32>>) -> Result<Self, Error> {
        let arcs = arcs.into();
        Self::validate(&arcs).map_err(|reason| {
            Error::InvalidIdentifier(format!("{} ({})", render(&arcs), reason))
        })?;
        Ok(Self { arcs })
    }

    pub(crate) fn new_unchecked(arcs: Vec<u32>) -> Self {
        debug_assert!(Self::validate(&arcs).is_ok());
        Self { arcs }
    }

    fn validate(arcs: &[u32]) -> Result<(), &'static str> {
        if arcs.len() < 2 {
            return Err("at least two arcs required");
        }
        if arcs[0] > 2 {
            return Err("first arc must be 0, 1 or 2");
        }
        Ok(())
    }

    /// The identifier's arcs.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Always false; a valid identifier has at least two arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Derive a sub-identifier by appending one arc.
    pub fn child(&self, arc: u32) -> Self {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Self { arcs }
    }

    /// Check whether `prefix` is an ancestor of (or equal to) this identifier.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }
}

fn render(arcs: &[u32]) -> String {
    arcs.iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::InvalidIdentifier("empty identifier".to_string()));
        }

        let arcs = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::InvalidIdentifier(format!(
                        "'{}': arc '{}' is not a decimal number",
                        s, part
                    )));
                }
                part.parse::<u32>().map_err(|_| {
                    Error::InvalidIdentifier(format!("'{}': arc '{}' out of range", s, part))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::validate(&arcs)
            .map_err(|reason| Error::InvalidIdentifier(format!("'{}': {}", s, reason)))?;

        Ok(Self { arcs })
    }
}

impl TryFrom<String> for Oid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.to_string()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.arcs))
    }
}

/// Namespace partition that identifiers are registered under.
///
/// The empty name is the default context.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(String);

impl Context {
    /// Create a named context.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The default (unnamed) context.
    pub fn default_context() -> Self {
        Self(String::new())
    }

    /// Context name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Check if this is the default context.
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Context {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Context {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
