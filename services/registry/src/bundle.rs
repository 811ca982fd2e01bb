//! Bundles: the modules which publish and consume services.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::id::ServiceId;
use crate::record::ServiceRecord;

/// Stable identifier of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(u64);

impl BundleId {
    /// The privileged system bundle.
    pub const SYSTEM: BundleId = BundleId(0);

    /// Create a bundle identifier.
    pub const fn new(id: u64) -> Self {
        BundleId(id)
    }

    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether this identifies the system bundle.
    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

impl FromStr for BundleId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(BundleId)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug)]
struct InUse {
    record: ServiceRecord,
    count: usize,
}

struct BundleInner {
    id: BundleId,
    symbolic_name: String,
    registered: Mutex<Vec<ServiceRecord>>,
    in_use: Mutex<BTreeMap<ServiceId, InUse>>,
}

/// Handle to a bundle, as seen by the registry.
///
/// Tracks the services the bundle has registered and the services it is
/// currently using. Cloning is cheap; clones share the same ledgers.
#[derive(Clone)]
pub struct Bundle {
    inner: Arc<BundleInner>,
}

impl Bundle {
    /// Create a bundle handle.
    pub fn new(id: BundleId, symbolic_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BundleInner {
                id,
                symbolic_name: symbolic_name.into(),
                registered: Mutex::new(Vec::new()),
                in_use: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// A handle for the system bundle.
    pub fn system() -> Self {
        Self::new(BundleId::SYSTEM, "system.bundle")
    }

    /// The bundle identifier.
    pub fn id(&self) -> BundleId {
        self.inner.id
    }

    /// The bundle's symbolic name.
    pub fn symbolic_name(&self) -> &str {
        &self.inner.symbolic_name
    }

    /// Whether this is the system bundle, which bypasses assignability checks.
    pub fn is_system(&self) -> bool {
        self.inner.id.is_system()
    }

    /// Services currently registered by this bundle, in registration order.
    pub fn registered_services(&self) -> Vec<ServiceRecord> {
        self.inner.registered.lock().clone()
    }

    /// Services this bundle currently holds at least one usage of.
    pub fn services_in_use(&self) -> Vec<ServiceRecord> {
        self.inner
            .in_use
            .lock()
            .values()
            .map(|usage| usage.record.clone())
            .collect()
    }

    /// Outstanding usages of the given service held by this bundle.
    pub fn use_count(&self, service: ServiceId) -> usize {
        self.inner
            .in_use
            .lock()
            .get(&service)
            .map_or(0, |usage| usage.count)
    }

    pub(crate) fn add_registered_service(&self, record: &ServiceRecord) {
        self.inner.registered.lock().push(record.clone());
    }

    pub(crate) fn remove_registered_service(&self, record: &ServiceRecord) {
        self.inner
            .registered
            .lock()
            .retain(|r| r.id() != record.id());
    }

    pub(crate) fn add_service_in_use(&self, record: &ServiceRecord) -> usize {
        let mut in_use = self.inner.in_use.lock();
        let usage = in_use.entry(record.id()).or_insert_with(|| InUse {
            record: record.clone(),
            count: 0,
        });
        usage.count += 1;
        usage.count
    }

    /// Returns the remaining count, or `None` if the service was not in use.
    pub(crate) fn remove_service_in_use(&self, service: ServiceId) -> Option<usize> {
        let mut in_use = self.inner.in_use.lock();
        let usage = in_use.get_mut(&service)?;
        usage.count -= 1;
        let count = usage.count;
        if count == 0 {
            in_use.remove(&service);
        }
        Some(count)
    }
}

impl PartialEq for Bundle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Bundle {}

impl Hash for Bundle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("id", &self.inner.id)
            .field("symbolic_name", &self.inner.symbolic_name)
            .finish()
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.inner.symbolic_name, self.inner.id)
    }
}
