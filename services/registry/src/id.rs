//! Service identifiers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Identifier of a registered service.
///
/// Assigned once at registration, unique for the lifetime of the registry
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ServiceId(u64);

impl ServiceId {
    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ServiceId> for u64 {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

/// Issues strictly increasing service identifiers, starting at 1.
#[derive(Debug, Default)]
pub(crate) struct IdentityGenerator {
    last: AtomicU64,
}

impl IdentityGenerator {
    pub(crate) fn next(&self) -> ServiceId {
        ServiceId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let ids = IdentityGenerator::default();
        assert_eq!(ids.next().get(), 1);
        assert_eq!(ids.next().get(), 2);
        assert!(ids.next() < ids.next());
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let ids = IdentityGenerator::default();
        let mut issued: Vec<u64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..250).map(|_| ids.next().get()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        issued.sort_unstable();
        issued.dedup();
        assert_eq!(issued.len(), 1000);
        assert_eq!(issued.first(), Some(&1));
        assert_eq!(issued.last(), Some(&1000));
    }
}
