//! Candidate resolution for service lookups.

use std::collections::HashSet;

use filter::Filter;

use crate::assignable::Assignability;
use crate::bundle::Bundle;
use crate::comparator;
use crate::config::RegistryConfig;
use crate::index::RegistryIndex;
use crate::name::ServiceName;
use crate::record::ServiceRecord;

/// A lookup request, before find hooks are applied.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Query<'a> {
    pub(crate) name: Option<&'a str>,
    pub(crate) filter: Option<&'a Filter>,
    pub(crate) check_assignable: bool,
}

impl<'a> Query<'a> {
    pub(crate) fn named(name: &'a str) -> Self {
        Self {
            name: Some(name),
            filter: None,
            check_assignable: true,
        }
    }
}

fn bucket_names(
    index: &RegistryIndex,
    config: &RegistryConfig,
    name: Option<&str>,
) -> Vec<ServiceName> {
    let Some(class) = name else {
        return index.names();
    };

    let primary = ServiceName::service(class);
    if index.contains(&primary) {
        return vec![primary];
    }

    let legacy = ServiceName::legacy(class);
    if config.legacy_fallback && index.contains(&legacy) {
        return vec![legacy];
    }

    Vec::new()
}

/// Matching services in precedence order, de-duplicated by id.
pub(crate) fn resolve(
    index: &RegistryIndex,
    config: &RegistryConfig,
    assignability: &dyn Assignability,
    consumer: &Bundle,
    query: &Query<'_>,
) -> Vec<ServiceRecord> {
    let check_assignable = query.check_assignable && !consumer.is_system();

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in bucket_names(index, config, query.name) {
        for record in index.snapshot(&name).unwrap_or_default() {
            if seen.contains(&record.id()) {
                continue;
            }

            if let Some(filter) = query.filter {
                if !filter.matches(&record.properties()) {
                    continue;
                }
            }

            if let Some(class) = query.name {
                if check_assignable
                    && !record.is_factory()
                    && !assignability.is_assignable_to(consumer, class, &record)
                {
                    tracing::trace!(
                        %consumer,
                        service = %record.id(),
                        class,
                        "Service not assignable"
                    );
                    continue;
                }
            }

            seen.insert(record.id());
            result.push(record);
        }
    }

    comparator::sort(&mut result);
    result
}

#[cfg(test)]
mod tests {
    use filter::Properties;

    use super::*;
    use crate::assignable::AssignAll;
    use crate::bundle::BundleId;
    use crate::id::IdentityGenerator;
    use crate::value::{ServiceFactory, ServiceObject, ServiceValue};

    #[derive(Debug)]
    struct RejectAll;

    impl Assignability for RejectAll {
        fn is_assignable_to(&self, _: &Bundle, _: &str, _: &ServiceRecord) -> bool {
            false
        }
    }

    #[derive(Debug)]
    struct NullFactory;

    impl ServiceFactory for NullFactory {
        fn get_service(&self, _: &Bundle, _: &ServiceRecord) -> Option<ServiceObject> {
            None
        }
    }

    struct Fixture {
        ids: IdentityGenerator,
        index: RegistryIndex,
        owner: Bundle,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ids: IdentityGenerator::default(),
                index: RegistryIndex::default(),
                owner: Bundle::new(BundleId::new(1), "owner"),
            }
        }

        fn publish(
            &self,
            names: &[ServiceName],
            value: ServiceValue,
            properties: Properties,
        ) -> ServiceRecord {
            let record = ServiceRecord::new(
                self.ids.next(),
                names.to_vec(),
                self.owner.clone(),
                value,
                properties,
            );
            self.index.publish(names, &record);
            record
        }
    }

    fn consumer() -> Bundle {
        Bundle::new(BundleId::new(9), "consumer")
    }

    #[test]
    fn wildcard_deduplicates() {
        let fixture = Fixture::new();
        let both = [ServiceName::service("A"), ServiceName::service("B")];
        let shared = fixture.publish(&both, ServiceValue::object(()), Properties::new());
        let only_a = fixture.publish(&both[..1], ServiceValue::object(()), Properties::new());

        let query = Query {
            name: None,
            filter: None,
            check_assignable: true,
        };
        let config = RegistryConfig::default();
        let found = resolve(&fixture.index, &config, &AssignAll, &consumer(), &query);
        assert_eq!(found, vec![shared, only_a]);
    }

    #[test]
    fn filter_selects_properties() {
        let fixture = Fixture::new();
        let name = [ServiceName::service("Paint")];
        let red = fixture.publish(
            &name,
            ServiceValue::object(()),
            Properties::new().with("color", "red"),
        );
        fixture.publish(
            &name,
            ServiceValue::object(()),
            Properties::new().with("color", "blue"),
        );

        let filter: Filter = "(color=red)".parse().unwrap();
        let query = Query {
            filter: Some(&filter),
            ..Query::named("Paint")
        };
        let config = RegistryConfig::default();
        let found = resolve(&fixture.index, &config, &AssignAll, &consumer(), &query);
        assert_eq!(found, vec![red]);
    }

    #[test]
    fn assignability_is_skipped_for_factories_and_system() {
        let fixture = Fixture::new();
        let name = [ServiceName::service("Greeter")];
        fixture.publish(&name, ServiceValue::object(()), Properties::new());
        let factory = fixture.publish(&name, ServiceValue::factory(NullFactory), Properties::new());

        let config = RegistryConfig::default();
        let query = Query::named("Greeter");
        let found = resolve(&fixture.index, &config, &RejectAll, &consumer(), &query);
        assert_eq!(found, vec![factory]);

        let found = resolve(&fixture.index, &config, &RejectAll, &Bundle::system(), &query);
        assert_eq!(found.len(), 2);

        let unchecked = Query {
            check_assignable: false,
            ..query
        };
        let found = resolve(&fixture.index, &config, &RejectAll, &consumer(), &unchecked);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn legacy_bucket_only_when_primary_absent() {
        let fixture = Fixture::new();
        let legacy = fixture.publish(
            &[ServiceName::legacy("Clock")],
            ServiceValue::object(()),
            Properties::new(),
        );

        let config = RegistryConfig::default();
        let query = Query::named("Clock");
        let found = resolve(&fixture.index, &config, &AssignAll, &consumer(), &query);
        assert_eq!(found, vec![legacy.clone()]);

        let disabled = RegistryConfig {
            legacy_fallback: false,
            ..RegistryConfig::default()
        };
        assert!(resolve(&fixture.index, &disabled, &AssignAll, &consumer(), &query).is_empty());

        let primary = fixture.publish(
            &[ServiceName::service("Clock")],
            ServiceValue::object(()),
            Properties::new(),
        );
        let found = resolve(&fixture.index, &config, &AssignAll, &consumer(), &query);
        assert_eq!(found, vec![primary.clone()]);

        let wildcard = Query {
            name: None,
            filter: None,
            check_assignable: false,
        };
        let found = resolve(&fixture.index, &config, &AssignAll, &consumer(), &wildcard);
        assert_eq!(found, vec![legacy, primary]);
    }
}
