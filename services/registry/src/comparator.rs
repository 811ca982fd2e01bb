//! Service ordering
//!
//! Services are ordered by ranking, highest first. Among services with equal
//! ranking the one registered first (lowest id) comes first.

use std::cmp::{Ordering, Reverse};

use crate::record::ServiceRecord;

/// Compare two services by precedence. `Ordering::Less` means `a` is
/// preferred over `b`.
pub fn compare(a: &ServiceRecord, b: &ServiceRecord) -> Ordering {
    b.ranking()
        .cmp(&a.ranking())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Sort services in precedence order.
pub(crate) fn sort(records: &mut [ServiceRecord]) {
    records.sort_by_cached_key(|record| (Reverse(record.ranking()), record.id()));
}

#[cfg(test)]
mod tests {
    use filter::Properties;

    use super::*;
    use crate::bundle::{Bundle, BundleId};
    use crate::id::IdentityGenerator;
    use crate::name::ServiceName;
    use crate::value::ServiceValue;

    fn records(rankings: &[i64]) -> Vec<ServiceRecord> {
        let ids = IdentityGenerator::default();
        let owner = Bundle::new(BundleId::new(1), "owner");
        rankings
            .iter()
            .map(|ranking| {
                ServiceRecord::new(
                    ids.next(),
                    vec![ServiceName::service("com.acme.Greeter")],
                    owner.clone(),
                    ServiceValue::object(()),
                    Properties::new().with("service.ranking", *ranking),
                )
            })
            .collect()
    }

    #[test]
    fn ranking_then_age() {
        let mut services = records(&[0, 10, 10, -3]);
        sort(&mut services);
        let order: Vec<u64> = services.iter().map(|s| s.id().get()).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn compare_agrees_with_sort() {
        let mut services = records(&[5, 1, 5, 7, 0, 1]);
        let mut by_compare = services.clone();
        by_compare.sort_by(compare);
        sort(&mut services);
        assert_eq!(services, by_compare);
        assert!(services.windows(2).all(|w| compare(&w[0], &w[1]) == Ordering::Less));
    }
}
