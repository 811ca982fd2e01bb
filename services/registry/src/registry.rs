//! The service registry

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use filter::{Filter, Properties};

use crate::api::RegistryBuilder;
use crate::assignable::Assignability;
use crate::bundle::Bundle;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::events::{EventSink, ServiceEventKind};
use crate::hooks::{self, FindHook, ListenerChange, ListenerInfo};
use crate::id::IdentityGenerator;
use crate::index::RegistryIndex;
use crate::lookup::{self, Query};
use crate::name::{FIND_HOOK, LISTENER_HOOK, ServiceName};
use crate::record::ServiceRecord;
use crate::value::{ServiceObject, ServiceValue};

#[derive(Debug)]
struct RegistryInner {
    ids: IdentityGenerator,
    index: RegistryIndex,
    events: Arc<dyn EventSink>,
    assignability: Arc<dyn Assignability>,
    config: RegistryConfig,
}

/// A dynamic service registry.
///
/// Bundles publish services under one or more names, other bundles look them
/// up by name and property filter and take usages of them. Cloning the
/// registry yields another handle to the same registry.
///
/// There is no registry-wide lock: each name's bucket is updated atomically
/// and each service serializes its own usage accounting and teardown.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// A registry with default configuration, logging events and accepting
    /// every service as assignable.
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    /// Start configuring a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn from_parts(
        config: RegistryConfig,
        events: Arc<dyn EventSink>,
        assignability: Arc<dyn Assignability>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                ids: IdentityGenerator::default(),
                index: RegistryIndex::default(),
                events,
                assignability,
                config,
            }),
        }
    }

    /// The registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Every name with at least one published service.
    pub fn service_names(&self) -> Vec<ServiceName> {
        self.inner.index.names()
    }

    /// Publish a service under `names` on behalf of `owner`.
    ///
    /// Names are validated before anything is published; duplicates are
    /// collapsed. Fires a REGISTERED event once the service is visible.
    #[tracing::instrument(level = "debug", skip_all, fields(owner = %owner))]
    pub fn register<S>(
        &self,
        owner: &Bundle,
        names: &[S],
        value: ServiceValue,
        properties: Properties,
    ) -> RegistryResult<ServiceRecord>
    where
        S: AsRef<str>,
    {
        if names.is_empty() {
            return Err(RegistryError::EmptyNames);
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(names.len());
        for name in names {
            let class = validate(name.as_ref())?;
            if seen.insert(class) {
                validated.push(ServiceName::service(class));
            }
        }

        Ok(self.publish(owner, validated, value, properties))
    }

    /// Publish a service in the legacy namespace.
    ///
    /// Legacy services are found by name only when no bundle publishes a
    /// service under the same name, and by wildcard lookups.
    #[tracing::instrument(
        level = "debug",
        skip(self, owner, value, properties),
        fields(owner = %owner)
    )]
    pub fn register_legacy(
        &self,
        owner: &Bundle,
        name: &str,
        value: ServiceValue,
        properties: Properties,
    ) -> RegistryResult<ServiceRecord> {
        let class = validate(name)?;
        Ok(self.publish(owner, vec![ServiceName::legacy(class)], value, properties))
    }

    fn publish(
        &self,
        owner: &Bundle,
        names: Vec<ServiceName>,
        value: ServiceValue,
        properties: Properties,
    ) -> ServiceRecord {
        // Listener hooks are told about the listeners active before they appeared.
        let listeners = match &value {
            ServiceValue::ListenerHook(_) => self.inner.events.listener_infos(),
            _ => Vec::new(),
        };

        let id = self.inner.ids.next();
        let record = ServiceRecord::new(id, names, owner.clone(), value, properties);
        tracing::debug!(service = %record.id(), names = ?record.names(), "Register service");

        {
            // Teardown waits until REGISTERED has been delivered.
            let _lifecycle = record.lifecycle();
            owner.add_registered_service(&record);
            self.inner.index.publish(record.names(), &record);

            if let ServiceValue::ListenerHook(hook) = record.value() {
                hooks::notify_listener_hook(
                    &record,
                    hook.as_ref(),
                    &listeners,
                    ListenerChange::Added,
                );
            }

            self.fire(owner, ServiceEventKind::Registered, &record);
        }
        record
    }

    /// Services published under `name` (or every service when `name` is
    /// `None`) which match `filter` and are assignable to `consumer`.
    pub fn get_service_references(
        &self,
        consumer: &Bundle,
        name: Option<&str>,
        filter: Option<&str>,
    ) -> RegistryResult<Vec<ServiceRecord>> {
        self.lookup(consumer, name, filter, true)
    }

    /// Like [`get_service_references`](Self::get_service_references), without
    /// the assignability check.
    pub fn get_all_service_references(
        &self,
        consumer: &Bundle,
        name: Option<&str>,
        filter: Option<&str>,
    ) -> RegistryResult<Vec<ServiceRecord>> {
        self.lookup(consumer, name, filter, false)
    }

    /// Look up services with a filter in text form.
    ///
    /// Results are ordered by ranking (highest first) and then by id, contain
    /// no duplicates, and have been passed through the registered find hooks.
    #[tracing::instrument(level = "trace", skip(self, consumer), fields(consumer = %consumer))]
    pub fn lookup(
        &self,
        consumer: &Bundle,
        name: Option<&str>,
        filter: Option<&str>,
        check_assignable: bool,
    ) -> RegistryResult<Vec<ServiceRecord>> {
        let parsed = filter.map(Filter::parse).transpose()?;
        let query = Query {
            name,
            filter: parsed.as_ref(),
            check_assignable,
        };
        Ok(self.run(consumer, &query, filter))
    }

    /// Look up services with an already parsed filter.
    pub fn find(
        &self,
        consumer: &Bundle,
        name: Option<&str>,
        filter: Option<&Filter>,
        check_assignable: bool,
    ) -> Vec<ServiceRecord> {
        let text = filter.map(Filter::to_string);
        let query = Query {
            name,
            filter,
            check_assignable,
        };
        self.run(consumer, &query, text.as_deref())
    }

    /// The preferred service published under `name`: highest ranking, and
    /// the oldest among equally ranked services.
    #[tracing::instrument(level = "trace", skip(self, consumer), fields(consumer = %consumer))]
    pub fn get_service_reference(
        &self,
        consumer: &Bundle,
        name: &str,
    ) -> RegistryResult<Option<ServiceRecord>> {
        let class = validate(name)?;
        let query = Query::named(class);
        let candidates = self.resolve(consumer, &query);
        let result = self.filter_find(consumer, Some(class), None, false, candidates);
        Ok(result.into_iter().next())
    }

    fn run(
        &self,
        consumer: &Bundle,
        query: &Query<'_>,
        filter: Option<&str>,
    ) -> Vec<ServiceRecord> {
        let candidates = self.resolve(consumer, query);
        let result = self.filter_find(
            consumer,
            query.name,
            filter,
            !query.check_assignable,
            candidates,
        );
        tracing::trace!(found = result.len(), "Lookup complete");
        result
    }

    fn resolve(&self, consumer: &Bundle, query: &Query<'_>) -> Vec<ServiceRecord> {
        lookup::resolve(
            &self.inner.index,
            &self.inner.config,
            self.inner.assignability.as_ref(),
            consumer,
            query,
        )
    }

    fn filter_find(
        &self,
        consumer: &Bundle,
        name: Option<&str>,
        filter: Option<&str>,
        all_services: bool,
        candidates: Vec<ServiceRecord>,
    ) -> Vec<ServiceRecord> {
        if name.is_some_and(|class| self.inner.config.is_hook_name(class)) {
            return candidates;
        }

        let hooks = self.find_hooks(consumer);
        if hooks.is_empty() {
            return candidates;
        }

        hooks::filter_find(&hooks, consumer, name, filter, all_services, candidates)
    }

    /// Registered find hooks, highest precedence first. Found without
    /// running the find hooks themselves.
    fn find_hooks(&self, consumer: &Bundle) -> Vec<(ServiceRecord, Arc<dyn FindHook>)> {
        self.resolve(consumer, &Query::named(FIND_HOOK))
            .into_iter()
            .filter(ServiceRecord::is_registered)
            .filter_map(|record| match record.value() {
                ServiceValue::FindHook(hook) => {
                    let hook = Arc::clone(hook);
                    Some((record, hook))
                }
                _ => {
                    tracing::warn!(
                        service = %record.id(),
                        "Service published as a find hook is not one"
                    );
                    None
                }
            })
            .collect()
    }

    /// Take a usage of `record` for `consumer` and return its value.
    ///
    /// Returns `None` once the service has begun unregistering, or when its
    /// factory produced no value.
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(consumer = %consumer, service = %record.id())
    )]
    pub fn get_service(&self, consumer: &Bundle, record: &ServiceRecord) -> Option<ServiceObject> {
        record.acquire(consumer)
    }

    /// Take a usage of `record` and downcast its value to `T`.
    ///
    /// A value of another type is released again and `None` is returned.
    pub fn get_service_as<T>(&self, consumer: &Bundle, record: &ServiceRecord) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let service = self.get_service(consumer, record)?;
        match service.downcast::<T>() {
            Ok(service) => Some(service),
            Err(_) => {
                tracing::warn!(
                    service = %record.id(),
                    expected = std::any::type_name::<T>(),
                    "Service value has an unexpected type"
                );
                self.unget_service(consumer, record);
                None
            }
        }
    }

    /// Give back one usage of `record` held by `consumer`.
    ///
    /// Returns `false` if `consumer` held no usage.
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(consumer = %consumer, service = %record.id())
    )]
    pub fn unget_service(&self, consumer: &Bundle, record: &ServiceRecord) -> bool {
        record.release(consumer)
    }

    /// Replace the properties of a registered service and fire MODIFIED.
    #[tracing::instrument(level = "debug", skip_all, fields(service = %record.id()))]
    pub fn set_properties(
        &self,
        record: &ServiceRecord,
        properties: Properties,
    ) -> RegistryResult<()> {
        let _lifecycle = record.lifecycle();
        if !record.update_properties(properties) {
            return Err(RegistryError::Unregistered(record.id()));
        }

        self.fire(record.owner(), ServiceEventKind::Modified, record);
        Ok(())
    }

    /// Unregister a service.
    ///
    /// Only the first call has any effect. Fires UNREGISTERING, withdraws the
    /// service from every name, releases every consumer's usages and detaches
    /// the service from its owner.
    ///
    /// Calls from other threads block until that teardown has finished. A
    /// call made from an UNREGISTERING listener returns immediately.
    #[tracing::instrument(level = "debug", skip_all, fields(service = %record.id()))]
    pub fn unregister(&self, record: &ServiceRecord) {
        let _lifecycle = record.lifecycle();
        if !record.begin_unregister() {
            tracing::trace!("Service already unregistering");
            return;
        }

        let owner = record.owner();
        tracing::debug!(%owner, names = ?record.names(), "Unregister service");
        self.fire(owner, ServiceEventKind::Unregistering, record);

        for name in record.names() {
            self.inner.index.withdraw(name, record);
        }

        for bundle in record.using_bundles() {
            while record.release(&bundle) {}
        }

        owner.remove_registered_service(record);
        record.finish_unregister();
    }

    /// Unregister every service registered by `bundle`.
    #[tracing::instrument(level = "debug", skip_all, fields(bundle = %bundle))]
    pub fn unregister_services(&self, bundle: &Bundle) {
        for record in bundle.registered_services() {
            self.unregister(&record);
        }
    }

    /// Release every usage held by `bundle`.
    #[tracing::instrument(level = "debug", skip_all, fields(bundle = %bundle))]
    pub fn release_services(&self, bundle: &Bundle) {
        for record in bundle.services_in_use() {
            while record.release(bundle) {}
        }
    }

    /// Tell listener hooks that service listeners were added.
    pub fn notify_listeners_added(&self, listeners: &[ListenerInfo]) {
        self.notify_listener_hooks(listeners, ListenerChange::Added);
    }

    /// Tell listener hooks that service listeners were removed.
    pub fn notify_listeners_removed(&self, listeners: &[ListenerInfo]) {
        self.notify_listener_hooks(listeners, ListenerChange::Removed);
    }

    fn notify_listener_hooks(&self, listeners: &[ListenerInfo], change: ListenerChange) {
        if listeners.is_empty() {
            return;
        }

        let query = Query {
            check_assignable: false,
            ..Query::named(LISTENER_HOOK)
        };
        for record in self.resolve(&Bundle::system(), &query) {
            if let ServiceValue::ListenerHook(hook) = record.value() {
                hooks::notify_listener_hook(&record, hook.as_ref(), listeners, change);
            }
        }
    }

    fn fire(&self, owner: &Bundle, kind: ServiceEventKind, record: &ServiceRecord) {
        hooks::guarded("event sink", || {
            self.inner.events.service_changed(owner, kind, record)
        });
    }
}

fn validate(name: &str) -> RegistryResult<&str> {
    if name.trim().is_empty() {
        return Err(RegistryError::BlankName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::bundle::BundleId;
    use crate::record::ServiceState;

    static_assertions::assert_impl_all!(ServiceRegistry: Send, Sync, Clone);

    #[derive(Debug, Default)]
    struct Recorder {
        events: Mutex<Vec<(ServiceEventKind, u64)>>,
    }

    impl EventSink for Arc<Recorder> {
        fn service_changed(&self, _: &Bundle, kind: ServiceEventKind, record: &ServiceRecord) {
            self.events.lock().push((kind, record.id().get()));
        }
    }

    fn bundle(id: u64) -> Bundle {
        Bundle::new(BundleId::new(id), format!("bundle-{id}"))
    }

    #[test]
    fn register_rejects_bad_names() {
        let registry = ServiceRegistry::new();
        let owner = bundle(1);
        let empty: [&str; 0] = [];
        assert!(matches!(
            registry.register(&owner, &empty, ServiceValue::object(()), Properties::new()),
            Err(RegistryError::EmptyNames)
        ));
        assert!(matches!(
            registry.register(&owner, &["A", "  "], ServiceValue::object(()), Properties::new()),
            Err(RegistryError::BlankName)
        ));
        assert!(registry.service_names().is_empty());
        assert!(owner.registered_services().is_empty());
    }

    #[test]
    fn duplicate_names_collapse() {
        let registry = ServiceRegistry::new();
        let record = registry
            .register(&bundle(1), &["A", "B", "A"], ServiceValue::object(()), Properties::new())
            .unwrap();
        assert_eq!(
            record.names(),
            &[ServiceName::service("A"), ServiceName::service("B")]
        );
    }

    #[test]
    fn events_fire_once() {
        let recorder = Arc::new(Recorder::default());
        let registry = ServiceRegistry::builder().events(recorder.clone()).build();
        let record = registry
            .register(&bundle(1), &["A"], ServiceValue::object(()), Properties::new())
            .unwrap();
        registry
            .set_properties(&record, Properties::new().with("color", "red"))
            .unwrap();
        registry.unregister(&record);
        registry.unregister(&record);

        let id = record.id().get();
        assert_eq!(
            *recorder.events.lock(),
            vec![
                (ServiceEventKind::Registered, id),
                (ServiceEventKind::Modified, id),
                (ServiceEventKind::Unregistering, id),
            ]
        );
        assert!(matches!(
            registry.set_properties(&record, Properties::new()),
            Err(RegistryError::Unregistered(_))
        ));
        assert_eq!(record.state(), ServiceState::Unregistered);
    }

    #[test]
    fn best_match_prefers_rank_then_age() {
        let registry = ServiceRegistry::new();
        let owner = bundle(1);
        let register = |ranking: i64| {
            registry
                .register(
                    &owner,
                    &["Greeter"],
                    ServiceValue::object(()),
                    Properties::new().with("service.ranking", ranking),
                )
                .unwrap()
        };
        register(1);
        let oldest_top = register(7);
        register(7);

        let best = registry
            .get_service_reference(&bundle(2), "Greeter")
            .unwrap()
            .unwrap();
        assert_eq!(best, oldest_top);
        assert!(matches!(
            registry.get_service_reference(&bundle(2), ""),
            Err(RegistryError::BlankName)
        ));
        assert!(registry.get_service_reference(&bundle(2), "Missing").unwrap().is_none());
    }

    #[test]
    fn typed_acquire() {
        let registry = ServiceRegistry::new();
        let consumer = bundle(2);
        let record = registry
            .register(
                &bundle(1),
                &["Greeter"],
                ServiceValue::object(String::from("hi")),
                Properties::new(),
            )
            .unwrap();

        assert!(registry.get_service_as::<u32>(&consumer, &record).is_none());
        assert_eq!(record.use_count(consumer.id()), 0);

        let value = registry.get_service_as::<String>(&consumer, &record).unwrap();
        assert_eq!(value.as_str(), "hi");
        assert!(registry.unget_service(&consumer, &record));
        assert!(!registry.unget_service(&consumer, &record));
    }

    #[test]
    fn bundle_cleanup() {
        let registry = ServiceRegistry::new();
        let producer = bundle(1);
        let consumer = bundle(2);
        let a = registry
            .register(&producer, &["A"], ServiceValue::object(()), Properties::new())
            .unwrap();
        let b = registry
            .register(&producer, &["B"], ServiceValue::object(()), Properties::new())
            .unwrap();

        registry.get_service(&consumer, &a).unwrap();
        registry.get_service(&consumer, &a).unwrap();
        registry.get_service(&consumer, &b).unwrap();

        registry.release_services(&consumer);
        assert!(consumer.services_in_use().is_empty());
        assert!(a.using_bundles().is_empty());

        registry.unregister_services(&producer);
        assert!(producer.registered_services().is_empty());
        assert!(!a.is_registered());
        assert!(!b.is_registered());
        assert!(registry.service_names().is_empty());
    }

    #[test]
    fn parsed_and_text_filters_agree() {
        let registry = ServiceRegistry::new();
        registry
            .register(
                &bundle(1),
                &["Paint"],
                ServiceValue::object(()),
                Properties::new().with("color", "red"),
            )
            .unwrap();
        registry
            .register(
                &bundle(1),
                &["Paint"],
                ServiceValue::object(()),
                Properties::new().with("color", "blue"),
            )
            .unwrap();

        let consumer = bundle(2);
        let filter: Filter = "(color=red)".parse().unwrap();
        let parsed = registry.find(&consumer, Some("Paint"), Some(&filter), true);
        let text = registry
            .get_service_references(&consumer, Some("Paint"), Some("(color=red)"))
            .unwrap();
        assert_eq!(parsed, text);
        assert_eq!(parsed.len(), 1);

        assert!(matches!(
            registry.get_service_references(&consumer, Some("Paint"), Some("(color=red")),
            Err(RegistryError::Filter(_))
        ));
    }
}
