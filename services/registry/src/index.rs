//! The registry index: capability names to published services.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::comparator;
use crate::name::ServiceName;
use crate::record::ServiceRecord;

/// Concurrent multi-key index of services.
///
/// Each bucket is copy-on-write: readers clone the bucket's `Arc` while
/// holding the shard lock only briefly, writers replace the contents in
/// place. Empty buckets are removed.
#[derive(Debug, Default)]
pub(crate) struct RegistryIndex {
    buckets: DashMap<ServiceName, Arc<Vec<ServiceRecord>>>,
}

impl RegistryIndex {
    /// Publish `record` under each of `names`.
    pub(crate) fn publish(&self, names: &[ServiceName], record: &ServiceRecord) {
        for name in names {
            let mut bucket = self.buckets.entry(name.clone()).or_default();
            Arc::make_mut(bucket.value_mut()).push(record.clone());
            tracing::trace!(%name, service = %record.id(), "Published service");
        }
    }

    /// Remove `record` from the bucket for `name`, dropping the bucket if it
    /// is left empty.
    pub(crate) fn withdraw(&self, name: &ServiceName, record: &ServiceRecord) {
        if let Entry::Occupied(mut entry) = self.buckets.entry(name.clone()) {
            Arc::make_mut(entry.get_mut()).retain(|r| r.id() != record.id());
            if entry.get().is_empty() {
                entry.remove();
                tracing::trace!(%name, "Removed empty bucket");
            }
        }
    }

    /// The services currently published under `name`, in precedence order.
    /// `None` when no bucket exists.
    pub(crate) fn snapshot(&self, name: &ServiceName) -> Option<Vec<ServiceRecord>> {
        let bucket = self.buckets.get(name).map(|b| Arc::clone(b.value()))?;
        let mut records = Vec::clone(&bucket);
        comparator::sort(&mut records);
        Some(records)
    }

    /// Every name with at least one published service.
    pub(crate) fn names(&self) -> Vec<ServiceName> {
        let mut names: Vec<_> = self.buckets.iter().map(|b| b.key().clone()).collect();
        names.sort();
        names
    }

    pub(crate) fn contains(&self, name: &ServiceName) -> bool {
        self.buckets.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use filter::Properties;

    use super::*;
    use crate::bundle::{Bundle, BundleId};
    use crate::id::IdentityGenerator;
    use crate::value::ServiceValue;

    fn record(ids: &IdentityGenerator, names: &[ServiceName], ranking: i64) -> ServiceRecord {
        ServiceRecord::new(
            ids.next(),
            names.to_vec(),
            Bundle::new(BundleId::new(1), "owner"),
            ServiceValue::object(()),
            Properties::new().with("service.ranking", ranking),
        )
    }

    #[test]
    fn publish_and_withdraw() {
        let ids = IdentityGenerator::default();
        let greeter = ServiceName::service("Greeter");
        let logger = ServiceName::service("Logger");
        let names = [greeter.clone(), logger.clone()];

        let a = record(&ids, &names, 0);
        let b = record(&ids, &names[..1], 5);

        let index = RegistryIndex::default();
        index.publish(&names, &a);
        index.publish(&names[..1], &b);

        assert_eq!(index.snapshot(&greeter).unwrap(), vec![b.clone(), a.clone()]);
        assert_eq!(index.snapshot(&logger).unwrap(), vec![a.clone()]);
        assert_eq!(index.names(), vec![greeter.clone(), logger.clone()]);

        index.withdraw(&logger, &a);
        assert!(!index.contains(&logger));
        assert!(index.snapshot(&logger).is_none());

        index.withdraw(&logger, &a);
        index.withdraw(&greeter, &a);
        index.withdraw(&greeter, &b);
        assert!(index.names().is_empty());
    }

    #[test]
    fn snapshots_are_isolated() {
        let ids = IdentityGenerator::default();
        let name = ServiceName::service("Greeter");
        let index = RegistryIndex::default();
        let first = record(&ids, std::slice::from_ref(&name), 0);
        index.publish(std::slice::from_ref(&name), &first);

        let snapshot = index.snapshot(&name).unwrap();
        index.publish(
            std::slice::from_ref(&name),
            &record(&ids, std::slice::from_ref(&name), 0),
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(index.snapshot(&name).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_publish() {
        let ids = IdentityGenerator::default();
        let name = ServiceName::service("Greeter");
        let index = RegistryIndex::default();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let r = record(&ids, std::slice::from_ref(&name), 0);
                        index.publish(std::slice::from_ref(&name), &r);
                    }
                });
            }
        });
        assert_eq!(index.snapshot(&name).unwrap().len(), 200);
    }
}
