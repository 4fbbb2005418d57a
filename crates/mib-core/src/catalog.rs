//! Identifier catalog mapping logical metrics to numeric identifiers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::oid::Oid;
use crate::source::MetricSource;
use crate::value::Value;

/// Enterprise subtree the standard catalog lives under.
pub const ENTERPRISE_PREFIX: &[u32] = &[1, 3, 6, 1, 4, 1, 53864, 1];

/// Well-known server metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    ServerName,
    ServerAddress,
    ServerUptime,
    ActiveSessions,
    UsedMemory,
    AvailableMemory,
    CpuTime,
    ActiveTransactions,
    CommittedTransactions,
    RolledBackTransactions,
    ActiveThreads,
    TotalRequests,
    ServerLog,
}

impl MetricKind {
    /// Every metric, in catalog order.
    pub const ALL: [MetricKind; 13] = [
        MetricKind::ServerName,
        MetricKind::ServerAddress,
        MetricKind::ServerUptime,
        MetricKind::ActiveSessions,
        MetricKind::UsedMemory,
        MetricKind::AvailableMemory,
        MetricKind::CpuTime,
        MetricKind::ActiveTransactions,
        MetricKind::CommittedTransactions,
        MetricKind::RolledBackTransactions,
        MetricKind::ActiveThreads,
        MetricKind::TotalRequests,
        MetricKind::ServerLog,
    ];

    /// Stable logical name.
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::ServerName => "server-name",
            MetricKind::ServerAddress => "server-address",
            MetricKind::ServerUptime => "server-uptime",
            MetricKind::ActiveSessions => "active-sessions",
            MetricKind::UsedMemory => "used-memory",
            MetricKind::AvailableMemory => "available-memory",
            MetricKind::CpuTime => "cpu-time",
            MetricKind::ActiveTransactions => "active-transactions",
            MetricKind::CommittedTransactions => "committed-transactions",
            MetricKind::RolledBackTransactions => "rolled-back-transactions",
            MetricKind::ActiveThreads => "active-threads",
            MetricKind::TotalRequests => "total-requests",
            MetricKind::ServerLog => "server-log",
        }
    }

    /// Read this metric's current value from a source.
    pub fn sample(self, source: &dyn MetricSource) -> Value {
        match self {
            MetricKind::ServerName => Value::Text(source.server_name()),
            MetricKind::ServerAddress => Value::Text(source.server_address()),
            MetricKind::ServerUptime => Value::Text(source.uptime()),
            MetricKind::ActiveSessions => Value::Integer(source.active_sessions()),
            MetricKind::UsedMemory => Value::Integer(source.used_memory()),
            MetricKind::AvailableMemory => Value::Integer(source.available_memory()),
            MetricKind::CpuTime => Value::Integer(source.cpu_time_ms()),
            MetricKind::ActiveTransactions => Value::Integer(source.active_transactions()),
            MetricKind::CommittedTransactions => Value::Integer(source.committed_transactions()),
            MetricKind::RolledBackTransactions => {
                Value::Integer(source.rolled_back_transactions())
            }
            MetricKind::ActiveThreads => Value::Integer(source.active_threads()),
            MetricKind::TotalRequests => Value::Integer(source.total_requests()),
            MetricKind::ServerLog => Value::Bytes(source.log()),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// One catalog mapping, as stored in catalog files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub metric: MetricKind,
    pub identifier: Oid,
}

/// Read-only mapping from every metric to its identifier.
///
/// Construction verifies the mapping is total and injective, so lookups
/// cannot fail afterwards.
#[derive(Debug, Clone)]
pub struct IdentifierCatalog {
    identifiers: HashMap<MetricKind, Oid>,
}

impl IdentifierCatalog {
    /// The built-in catalog: metric `n` (1-based, catalog order) maps to
    /// `ENTERPRISE_PREFIX.n.0`.
    pub fn standard() -> Self {
        let prefix = Oid::new_unchecked(ENTERPRISE_PREFIX.to_vec());
        let identifiers = MetricKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| (*kind, prefix.child(i as u32 + 1).child(0)))
            .collect();
        Self { identifiers }
    }

    /// Build a catalog from explicit entries.
    ///
    /// Fails if any metric is unmapped or two metrics share an identifier.
    /// A metric listed twice keeps its last identifier.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self, Error> {
        let identifiers: HashMap<MetricKind, Oid> = entries
            .into_iter()
            .map(|entry| (entry.metric, entry.identifier))
            .collect();

        for kind in MetricKind::ALL {
            if !identifiers.contains_key(&kind) {
                return Err(Error::MissingIdentifier(kind));
            }
        }

        {
            let mut seen = HashSet::new();
            for kind in MetricKind::ALL {
                let oid = &identifiers[&kind];
                if !seen.insert(oid) {
                    return Err(Error::DuplicateIdentifier(oid.clone()));
                }
            }
        }

        Ok(Self { identifiers })
    }

    /// Identifier for a metric.
    pub fn get(&self, kind: MetricKind) -> &Oid {
        &self.identifiers[&kind]
    }

    /// Reverse lookup.
    pub fn kind_of(&self, identifier: &Oid) -> Option<MetricKind> {
        self.iter()
            .find(|(_, oid)| *oid == identifier)
            .map(|(kind, _)| kind)
    }

    /// Entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &Oid)> + '_ {
        MetricKind::ALL
            .iter()
            .map(move |kind| (*kind, &self.identifiers[kind]))
    }

    /// Entries in catalog order, in file form.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.iter()
            .map(|(metric, identifier)| CatalogEntry {
                metric,
                identifier: identifier.clone(),
            })
            .collect()
    }

    /// Number of mapped metrics.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl Default for IdentifierCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
